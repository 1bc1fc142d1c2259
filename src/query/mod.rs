use crate::entity::validation::validate_location;
use crate::entity::{
    EntityId, EntityKind, EntityRef, Sensor, SensorKind, SensorStatus, Timestamp,
    TrafficDirection, ValidationError, ZoneType,
};
use crate::error::{PlanError, Result};
use crate::geometry::{planar_distance, Coordinate, GeometryKernel};
use crate::store::EntityStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;


/// Numeric attribute usable in range predicates
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    /// Zone area or building floor area
    Area,
    /// Building floor area times floor count
    TotalArea,
    Height,
    Floors,
    Width,
    Length,
    TrafficFlow,
    ReadingCount,
    LatestValue,
}

impl Attribute {
    /// Attribute value for an entity; `None` when it does not apply
    pub fn value_of(&self, entity: EntityRef<'_>) -> Option<f64> {
        match (self, entity) {
            (Attribute::Area, EntityRef::Zone(z)) => Some(z.area),
            (Attribute::Area, EntityRef::Building(b)) => Some(b.floor_area()),
            (Attribute::TotalArea, EntityRef::Building(b)) => Some(b.total_area()),
            (Attribute::Height, EntityRef::Building(b)) => Some(b.height),
            (Attribute::Floors, EntityRef::Building(b)) => Some(f64::from(b.floors)),
            (Attribute::Width, EntityRef::Road(r)) => Some(r.width),
            (Attribute::Length, EntityRef::Road(r)) => Some(r.length()),
            (Attribute::TrafficFlow, EntityRef::Road(r)) => Some(r.traffic_flow),
            (Attribute::ReadingCount, EntityRef::Sensor(s)) => Some(s.readings.len() as f64),
            (Attribute::LatestValue, EntityRef::Sensor(s)) => s.last_reading().map(|r| r.value),
            _ => None,
        }
    }
}

/// Composable filter over entities
///
/// Attribute comparisons that do not apply to an entity's kind evaluate to
/// false (so `!p` matches them).
#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    Always,
    /// Zone type, or building use tag
    TypeIs(ZoneType),
    SensorKindIs(SensorKind),
    StatusIs(SensorStatus),
    DirectionIs(TrafficDirection),
    /// Inclusive numeric range; an open side is `None`
    Range {
        attribute: Attribute,
        min: Option<f64>,
        max: Option<f64>,
    },
    /// Associated with this zone
    InZone(EntityId),
    /// Associated with any zone of this type
    InZoneOfType(ZoneType),
    /// Reference point within `radius` of `center`
    Near { center: Coordinate, radius: f64 },
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn between(attribute: Attribute, min: f64, max: f64) -> Self {
        Predicate::Range {
            attribute,
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn at_least(attribute: Attribute, min: f64) -> Self {
        Predicate::Range {
            attribute,
            min: Some(min),
            max: None,
        }
    }

    pub fn at_most(attribute: Attribute, max: f64) -> Self {
        Predicate::Range {
            attribute,
            min: None,
            max: Some(max),
        }
    }

    pub fn and(self, other: Predicate) -> Self {
        match self {
            Predicate::All(mut clauses) => {
                clauses.push(other);
                Predicate::All(clauses)
            }
            Predicate::Always => other,
            first => Predicate::All(vec![first, other]),
        }
    }

    pub fn or(self, other: Predicate) -> Self {
        match self {
            Predicate::Any(mut clauses) => {
                clauses.push(other);
                Predicate::Any(clauses)
            }
            first => Predicate::Any(vec![first, other]),
        }
    }

    /// Check every clause's parameters before any entity is evaluated
    ///
    /// Rules:
    /// - Near: center inside the kernel bounds, radius finite and non-negative
    /// - Range: bounds are not NaN
    pub fn validate(&self, kernel: &GeometryKernel) -> Result<(), ValidationError> {
        match self {
            Predicate::Near { center, radius } => {
                validate_location(kernel, "center", *center)?;
                if !radius.is_finite() || *radius < 0.0 {
                    return Err(ValidationError::InvalidNumber {
                        field: "radius",
                        value: *radius,
                        expected: "finite and non-negative",
                    });
                }
                Ok(())
            }
            Predicate::Range { min, max, .. } => {
                for (field, bound) in [("min", min), ("max", max)] {
                    if let Some(value) = bound.filter(|v| v.is_nan()) {
                        return Err(ValidationError::InvalidNumber {
                            field,
                            value,
                            expected: "a number",
                        });
                    }
                }
                Ok(())
            }
            Predicate::All(clauses) | Predicate::Any(clauses) => {
                clauses.iter().try_for_each(|p| p.validate(kernel))
            }
            Predicate::Not(inner) => inner.validate(kernel),
            _ => Ok(()),
        }
    }

    /// Evaluate against one entity; parameters are assumed valid
    pub fn matches(&self, entity: EntityRef<'_>, store: &EntityStore) -> bool {
        match self {
            Predicate::Always => true,
            Predicate::TypeIs(zone_type) => match entity {
                EntityRef::Zone(z) => z.zone_type == *zone_type,
                EntityRef::Building(b) => b.usage == *zone_type,
                _ => false,
            },
            Predicate::SensorKindIs(kind) => entity.as_sensor().is_some_and(|s| s.kind == *kind),
            Predicate::StatusIs(status) => {
                entity.as_sensor().is_some_and(|s| s.status == *status)
            }
            Predicate::DirectionIs(direction) => entity
                .as_road()
                .is_some_and(|r| r.traffic_direction == *direction),
            Predicate::Range {
                attribute,
                min,
                max,
            } => attribute.value_of(entity).is_some_and(|v| {
                min.map_or(true, |lo| v >= lo) && max.map_or(true, |hi| v <= hi)
            }),
            Predicate::InZone(zone_id) => store.index().is_in_zone(&entity.id(), zone_id),
            Predicate::InZoneOfType(zone_type) => store
                .index()
                .zones_for(&entity.id())
                .iter()
                .filter_map(|zone_id| store.zone(zone_id).ok())
                .any(|zone| zone.zone_type == *zone_type),
            Predicate::Near { center, radius } => distance_to(entity, *center) <= *radius,
            Predicate::All(clauses) => clauses.iter().all(|p| p.matches(entity, store)),
            Predicate::Any(clauses) => clauses.iter().any(|p| p.matches(entity, store)),
            Predicate::Not(inner) => !inner.matches(entity, store),
        }
    }
}

impl std::ops::Not for Predicate {
    type Output = Predicate;

    fn not(self) -> Self::Output {
        Predicate::Not(Box::new(self))
    }
}

/// Distance from `center` to the entity's reference point (nearest vertex for roads)
///
/// Stored points are already inside the kernel bounds, and `center` is checked
/// by `Predicate::validate`.
fn distance_to(entity: EntityRef<'_>, center: Coordinate) -> f64 {
    match entity {
        EntityRef::Zone(z) => planar_distance(center, z.boundary.centroid()),
        EntityRef::Building(b) => planar_distance(center, b.reference_point()),
        EntityRef::Sensor(s) => planar_distance(center, s.location),
        EntityRef::Road(r) => r
            .path
            .iter()
            .map(|p| planar_distance(center, *p))
            .fold(f64::INFINITY, f64::min),
    }
}

/// Lazily evaluated filter result
///
/// Holds only the store reference and the predicate; each call to `iter`
/// walks the store again in insertion order.
#[derive(Clone, Debug)]
pub struct Selection<'a> {
    store: &'a EntityStore,
    kind: EntityKind,
    predicate: Predicate,
}

impl<'a> Selection<'a> {
    pub fn iter(&self) -> impl Iterator<Item = EntityRef<'a>> + '_ {
        let store = self.store;
        store
            .iter_kind(self.kind)
            .filter(move |entity| self.predicate.matches(*entity, store))
    }

    pub fn ids(&self) -> Vec<EntityId> {
        self.iter().map(|e| e.id()).collect()
    }

    pub fn count(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

/// Which sensors an aggregate draws readings from; unset fields match all
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SensorSelector {
    pub kind: Option<SensorKind>,
    pub zone: Option<EntityId>,
    pub status: Option<SensorStatus>,
    pub sensors: Option<BTreeSet<EntityId>>,
}

impl SensorSelector {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn sensor(id: EntityId) -> Self {
        Self {
            sensors: Some(BTreeSet::from([id])),
            ..Self::default()
        }
    }

    pub fn of_kind(mut self, kind: SensorKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn in_zone(mut self, zone_id: EntityId) -> Self {
        self.zone = Some(zone_id);
        self
    }

    pub fn with_status(mut self, status: SensorStatus) -> Self {
        self.status = Some(status);
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Statistic {
    Sum,
    Mean,
    Min,
    Max,
    Count,
}

/// Inclusive timestamp range
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl TimeWindow {
    pub fn new(start: Timestamp, end: Timestamp) -> Result<Self> {
        if start > end {
            return Err(ValidationError::InvalidTimeWindow { start, end }.into());
        }
        Ok(Self { start, end })
    }

    pub fn all() -> Self {
        Self {
            start: Timestamp::MIN,
            end: Timestamp::MAX,
        }
    }

    /// The `span` units ending at `end`, e.g. the last hour
    pub fn trailing(end: Timestamp, span: Timestamp) -> Result<Self> {
        if span < 0 {
            return Err(ValidationError::InvalidTimeWindow {
                start: end.saturating_sub(span),
                end,
            }
            .into());
        }
        Self::new(end.saturating_sub(span), end)
    }

    pub fn contains(&self, timestamp: Timestamp) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }
}

/// All statistics over one set of readings
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReadingSummary {
    pub count: usize,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
}

impl ReadingSummary {
    pub fn mean(&self) -> f64 {
        self.sum / self.count as f64
    }

    pub fn get(&self, statistic: Statistic) -> f64 {
        match statistic {
            Statistic::Sum => self.sum,
            Statistic::Mean => self.mean(),
            Statistic::Min => self.min,
            Statistic::Max => self.max,
            Statistic::Count => self.count as f64,
        }
    }
}

/// Read-only filter and aggregation requests over one store
#[derive(Clone, Copy, Debug)]
pub struct QueryEngine<'a> {
    store: &'a EntityStore,
}

impl<'a> QueryEngine<'a> {
    pub fn new(store: &'a EntityStore) -> Self {
        Self { store }
    }

    /// Entities of `kind` matching `predicate`, in insertion order
    ///
    /// Fails with `Validation` when a clause carries an invalid parameter,
    /// such as a `Near` center outside the kernel bounds.
    pub fn filter(&self, kind: EntityKind, predicate: Predicate) -> Result<Selection<'a>> {
        predicate.validate(self.store.kernel())?;
        Ok(Selection {
            store: self.store,
            kind,
            predicate,
        })
    }

    pub fn buildings_by_type(&self, zone_type: ZoneType) -> Selection<'a> {
        self.unchecked(EntityKind::Building, Predicate::TypeIs(zone_type))
    }

    pub fn sensors_by_kind(&self, kind: SensorKind) -> Selection<'a> {
        self.unchecked(EntityKind::Sensor, Predicate::SensorKindIs(kind))
    }

    // Only for predicates without parameters to validate
    fn unchecked(&self, kind: EntityKind, predicate: Predicate) -> Selection<'a> {
        Selection {
            store: self.store,
            kind,
            predicate,
        }
    }

    /// Sensors matched by a selector, in insertion order
    ///
    /// Fails with `NotFound` when the selector names an unknown zone or sensor.
    pub fn select_sensors(&self, selector: &SensorSelector) -> Result<Vec<&'a Sensor>> {
        if let Some(zone_id) = &selector.zone {
            self.store.zone(zone_id)?;
        }
        if let Some(ids) = &selector.sensors {
            for id in ids {
                self.store.sensor(id)?;
            }
        }

        let index = self.store.index();
        Ok(self
            .store
            .sensors()
            .filter(|s| selector.kind.map_or(true, |k| s.kind == k))
            .filter(|s| selector.status.map_or(true, |st| s.status == st))
            .filter(|s| {
                selector
                    .zone
                    .as_ref()
                    .map_or(true, |zone_id| index.is_in_zone(&s.id, zone_id))
            })
            .filter(|s| {
                selector
                    .sensors
                    .as_ref()
                    .map_or(true, |ids| ids.contains(&s.id))
            })
            .collect())
    }

    /// Count, sum, min and max of the selected readings inside the window
    pub fn summarize(&self, selector: &SensorSelector, window: TimeWindow) -> Result<ReadingSummary> {
        let sensors = self.select_sensors(selector)?;
        if sensors.is_empty() {
            return Err(PlanError::EmptySelection);
        }

        let mut summary = ReadingSummary {
            count: 0,
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        };
        for reading in sensors
            .iter()
            .flat_map(|s| s.readings_between(window.start, window.end))
        {
            summary.count += 1;
            summary.sum += reading.value;
            summary.min = summary.min.min(reading.value);
            summary.max = summary.max.max(reading.value);
        }

        if summary.count == 0 {
            return Err(PlanError::EmptySelection);
        }
        Ok(summary)
    }

    /// One statistic over the selected readings inside the window
    ///
    /// Fails with `EmptySelection` when no sensor or no reading matches,
    /// including for `Count` and `Sum`.
    pub fn aggregate(
        &self,
        selector: &SensorSelector,
        statistic: Statistic,
        window: TimeWindow,
    ) -> Result<f64> {
        self.summarize(selector, window).map(|s| s.get(statistic))
    }
}
