use crate::entity::validation::{
    validate_building, validate_footprint, validate_location, validate_reading_value,
    validate_road, validate_traffic_flow, validate_zone,
};
use crate::entity::{
    Building, BuildingSpec, EntityId, EntityKind, EntityRef, FootprintSpec, Reading, Road,
    RoadSpec, Sensor, SensorSpec, SensorStatus, Timestamp, ValidationError, Zone, ZoneSpec,
};
use crate::error::{PlanError, Result};
use crate::geometry::{Coordinate, GeometryKernel};
use crate::index::{Located, RelationshipIndex};
use crate::query::QueryEngine;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info};

#[cfg(test)]
mod tests;

/// Primary entities of one urban plan plus their derived zone associations
///
/// Every mutation validates before touching state, so a failed call leaves
/// the store exactly as it was. Geometry is the source of truth; the
/// relationship index is updated incrementally after each geometry change
/// and can be rebuilt from scratch at any time.
#[derive(Clone, Debug)]
pub struct EntityStore {
    kernel: GeometryKernel,

    zones: HashMap<EntityId, Zone>,
    buildings: HashMap<EntityId, Building>,
    roads: HashMap<EntityId, Road>,
    sensors: HashMap<EntityId, Sensor>,

    /// Insertion sequence -> entity, for deterministic iteration
    order: BTreeMap<u64, (EntityKind, EntityId)>,
    sequence_of: HashMap<EntityId, u64>,
    next_sequence: u64,

    index: RelationshipIndex,
}

/// Buildings and sensors as point-located entities
fn located<'a>(
    buildings: &'a HashMap<EntityId, Building>,
    sensors: &'a HashMap<EntityId, Sensor>,
) -> impl Iterator<Item = Located> + 'a {
    buildings
        .values()
        .map(|b| Located {
            kind: EntityKind::Building,
            id: b.id,
            point: b.reference_point(),
        })
        .chain(sensors.values().map(|s| Located {
            kind: EntityKind::Sensor,
            id: s.id,
            point: s.location,
        }))
}

impl EntityStore {
    pub fn new(kernel: GeometryKernel) -> Self {
        Self {
            kernel,
            zones: HashMap::new(),
            buildings: HashMap::new(),
            roads: HashMap::new(),
            sensors: HashMap::new(),
            order: BTreeMap::new(),
            sequence_of: HashMap::new(),
            next_sequence: 0,
            index: RelationshipIndex::new(),
        }
    }

    pub fn kernel(&self) -> &GeometryKernel {
        &self.kernel
    }

    pub fn index(&self) -> &RelationshipIndex {
        &self.index
    }

    /// Read-only query interface over this store
    pub fn query(&self) -> QueryEngine<'_> {
        QueryEngine::new(self)
    }

    fn track(&mut self, kind: EntityKind, id: EntityId) {
        let seq = self.next_sequence;
        self.next_sequence += 1;
        self.order.insert(seq, (kind, id));
        self.sequence_of.insert(id, seq);
    }

    fn untrack(&mut self, id: &EntityId) {
        if let Some(seq) = self.sequence_of.remove(id) {
            self.order.remove(&seq);
        }
    }

    /// Add a zone and associate every building and sensor it contains
    pub fn add_zone(&mut self, spec: ZoneSpec) -> Result<EntityId> {
        let boundary = validate_zone(&self.kernel, &spec)?;
        let zone = Zone {
            id: EntityId::new(),
            name: spec.name,
            zone_type: spec.zone_type,
            area: boundary.area(),
            boundary,
            attributes: spec.attributes,
        };
        Ok(self.insert_zone(zone))
    }

    /// Insert an already-validated zone
    pub(crate) fn insert_zone(&mut self, zone: Zone) -> EntityId {
        let id = zone.id;
        let associations = self.index.survey(
            &self.kernel,
            &zone,
            located(&self.buildings, &self.sensors),
        );

        debug!(
            zone_id = %id,
            zone_type = %zone.zone_type,
            area = zone.area,
            associations,
            "Zone added"
        );

        self.zones.insert(id, zone);
        self.track(EntityKind::Zone, id);
        id
    }

    /// Add a building and associate it with every zone containing its reference point
    pub fn add_building(&mut self, spec: BuildingSpec) -> Result<EntityId> {
        let footprint = validate_building(&self.kernel, &spec)?;
        let building = Building {
            id: EntityId::new(),
            name: spec.name,
            footprint,
            height: spec.height,
            floors: spec.floors,
            usage: spec.usage,
            attributes: spec.attributes,
        };
        Ok(self.insert_building(building))
    }

    pub(crate) fn insert_building(&mut self, building: Building) -> EntityId {
        let id = building.id;
        let associations = self.index.place(
            &self.kernel,
            Located {
                kind: EntityKind::Building,
                id,
                point: building.reference_point(),
            },
            self.zones.values(),
        );

        debug!(building_id = %id, usage = %building.usage, associations, "Building added");

        self.buildings.insert(id, building);
        self.track(EntityKind::Building, id);
        id
    }

    /// Add a road; roads are not associated with zones
    pub fn add_road(&mut self, spec: RoadSpec) -> Result<EntityId> {
        validate_road(&self.kernel, &spec)?;
        let road = Road {
            id: EntityId::new(),
            name: spec.name,
            path: spec.path,
            width: spec.width,
            traffic_direction: spec.traffic_direction,
            traffic_flow: spec.traffic_flow,
            attributes: spec.attributes,
        };
        Ok(self.insert_road(road))
    }

    pub(crate) fn insert_road(&mut self, road: Road) -> EntityId {
        let id = road.id;
        debug!(road_id = %id, points = road.path.len(), "Road added");
        self.roads.insert(id, road);
        self.track(EntityKind::Road, id);
        id
    }

    /// Add a sensor with an empty reading log
    pub fn add_sensor(&mut self, spec: SensorSpec) -> Result<EntityId> {
        let location = validate_location(&self.kernel, "location", spec.location)?;
        let sensor = Sensor {
            id: EntityId::new(),
            kind: spec.kind,
            location,
            status: spec.status,
            readings: Vec::new(),
            attributes: spec.attributes,
        };
        Ok(self.insert_sensor(sensor))
    }

    pub(crate) fn insert_sensor(&mut self, sensor: Sensor) -> EntityId {
        let id = sensor.id;
        let associations = self.index.place(
            &self.kernel,
            Located {
                kind: EntityKind::Sensor,
                id,
                point: sensor.location,
            },
            self.zones.values(),
        );

        debug!(sensor_id = %id, kind = %sensor.kind, associations, "Sensor added");

        self.sensors.insert(id, sensor);
        self.track(EntityKind::Sensor, id);
        id
    }

    /// Remove any entity and its associations
    ///
    /// Removing a zone leaves its buildings and sensors in place, unassociated.
    pub fn remove(&mut self, id: &EntityId) -> Result<EntityKind> {
        let kind = self.kind_of(id).ok_or(PlanError::NotFound(*id))?;

        let dropped = match kind {
            EntityKind::Zone => {
                self.zones.remove(id);
                self.index.forget_zone(id)
            }
            EntityKind::Building => {
                self.buildings.remove(id);
                self.index.forget_entity(id)
            }
            EntityKind::Road => {
                self.roads.remove(id);
                0
            }
            EntityKind::Sensor => {
                self.sensors.remove(id);
                self.index.forget_entity(id)
            }
        };
        self.untrack(id);

        info!(entity_id = %id, kind = %kind, associations = dropped, "Entity removed");
        Ok(kind)
    }

    fn kind_of(&self, id: &EntityId) -> Option<EntityKind> {
        let seq = self.sequence_of.get(id)?;
        self.order.get(seq).map(|(kind, _)| *kind)
    }

    fn lookup(&self, kind: EntityKind, id: &EntityId) -> Option<EntityRef<'_>> {
        match kind {
            EntityKind::Zone => self.zones.get(id).map(EntityRef::Zone),
            EntityKind::Building => self.buildings.get(id).map(EntityRef::Building),
            EntityKind::Road => self.roads.get(id).map(EntityRef::Road),
            EntityKind::Sensor => self.sensors.get(id).map(EntityRef::Sensor),
        }
    }

    pub fn get(&self, id: &EntityId) -> Result<EntityRef<'_>> {
        self.kind_of(id)
            .and_then(|kind| self.lookup(kind, id))
            .ok_or(PlanError::NotFound(*id))
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.sequence_of.contains_key(id)
    }

    pub fn zone(&self, id: &EntityId) -> Result<&Zone> {
        self.zones.get(id).ok_or(PlanError::NotFound(*id))
    }

    pub fn building(&self, id: &EntityId) -> Result<&Building> {
        self.buildings.get(id).ok_or(PlanError::NotFound(*id))
    }

    pub fn road(&self, id: &EntityId) -> Result<&Road> {
        self.roads.get(id).ok_or(PlanError::NotFound(*id))
    }

    pub fn sensor(&self, id: &EntityId) -> Result<&Sensor> {
        self.sensors.get(id).ok_or(PlanError::NotFound(*id))
    }

    /// Append a reading to a sensor's log
    ///
    /// Timestamps must be non-decreasing per sensor; an earlier timestamp is
    /// rejected and the log left untouched.
    pub fn record_reading(
        &mut self,
        sensor_id: &EntityId,
        timestamp: Timestamp,
        value: f64,
    ) -> Result<()> {
        let sensor = self
            .sensors
            .get_mut(sensor_id)
            .ok_or(PlanError::NotFound(*sensor_id))?;

        if let Some(last) = sensor.last_reading() {
            if timestamp < last.timestamp {
                return Err(PlanError::InvalidReading {
                    sensor_id: *sensor_id,
                    timestamp,
                    last: last.timestamp,
                });
            }
        }
        validate_reading_value(value)?;

        sensor.readings.push(Reading { timestamp, value });
        debug!(sensor_id = %sensor_id, timestamp, value, "Reading recorded");
        Ok(())
    }

    /// Replace a zone boundary; re-derives its area and associations
    pub fn set_zone_boundary(&mut self, zone_id: &EntityId, boundary: Vec<Coordinate>) -> Result<()> {
        if !self.zones.contains_key(zone_id) {
            return Err(PlanError::NotFound(*zone_id));
        }
        let boundary = self
            .kernel
            .polygon(boundary)
            .map_err(|source| ValidationError::Geometry {
                field: "boundary",
                source,
            })?;

        let Some(zone) = self.zones.get_mut(zone_id) else {
            return Err(PlanError::NotFound(*zone_id));
        };
        zone.area = boundary.area();
        zone.boundary = boundary;

        let zone = &self.zones[zone_id];
        let associations = self.index.survey(
            &self.kernel,
            zone,
            located(&self.buildings, &self.sensors),
        );

        debug!(zone_id = %zone_id, area = zone.area, associations, "Zone boundary replaced");
        Ok(())
    }

    /// Replace a building footprint; re-derives its associations
    pub fn relocate_building(&mut self, building_id: &EntityId, footprint: FootprintSpec) -> Result<()> {
        if !self.buildings.contains_key(building_id) {
            return Err(PlanError::NotFound(*building_id));
        }
        let footprint = validate_footprint(&self.kernel, &footprint)?;
        let point = footprint.reference_point();

        if let Some(building) = self.buildings.get_mut(building_id) {
            building.footprint = footprint;
        }

        let associations = self.index.place(
            &self.kernel,
            Located {
                kind: EntityKind::Building,
                id: *building_id,
                point,
            },
            self.zones.values(),
        );

        debug!(building_id = %building_id, associations, "Building relocated");
        Ok(())
    }

    /// Move a sensor; re-derives its associations
    pub fn relocate_sensor(&mut self, sensor_id: &EntityId, location: Coordinate) -> Result<()> {
        let location = validate_location(&self.kernel, "location", location)?;
        let sensor = self
            .sensors
            .get_mut(sensor_id)
            .ok_or(PlanError::NotFound(*sensor_id))?;
        sensor.location = location;

        let associations = self.index.place(
            &self.kernel,
            Located {
                kind: EntityKind::Sensor,
                id: *sensor_id,
                point: location,
            },
            self.zones.values(),
        );

        debug!(sensor_id = %sensor_id, associations, "Sensor relocated");
        Ok(())
    }

    pub fn set_traffic_flow(&mut self, road_id: &EntityId, traffic_flow: f64) -> Result<()> {
        let road = self
            .roads
            .get_mut(road_id)
            .ok_or(PlanError::NotFound(*road_id))?;
        validate_traffic_flow(traffic_flow)?;
        road.traffic_flow = traffic_flow;
        debug!(road_id = %road_id, traffic_flow, "Traffic flow updated");
        Ok(())
    }

    pub fn set_sensor_status(&mut self, sensor_id: &EntityId, status: SensorStatus) -> Result<()> {
        let sensor = self
            .sensors
            .get_mut(sensor_id)
            .ok_or(PlanError::NotFound(*sensor_id))?;
        sensor.status = status;
        debug!(sensor_id = %sensor_id, status = %status, "Sensor status updated");
        Ok(())
    }

    /// Zones containing a building or sensor (empty for zones and roads)
    pub fn zones_for(&self, entity_id: &EntityId) -> Result<BTreeSet<EntityId>> {
        if !self.contains(entity_id) {
            return Err(PlanError::NotFound(*entity_id));
        }
        Ok(self.index.zones_for(entity_id))
    }

    pub fn entities_in_zone(&self, zone_id: &EntityId, kind: EntityKind) -> Result<BTreeSet<EntityId>> {
        if !self.zones.contains_key(zone_id) {
            return Err(PlanError::NotFound(*zone_id));
        }
        Ok(self.index.entities_in_zone(zone_id, kind))
    }

    /// Index recomputed from geometry alone
    pub fn full_rebuild(&self) -> RelationshipIndex {
        RelationshipIndex::rebuild(
            &self.kernel,
            self.zones.values(),
            located(&self.buildings, &self.sensors),
        )
    }

    /// Discard the incremental index and recompute it from geometry
    pub fn rebuild_index(&mut self) -> usize {
        self.index = self.full_rebuild();
        info!(associations = self.index.len(), "Relationship index rebuilt");
        self.index.len()
    }

    /// Whether the incremental index agrees with a full rebuild
    pub fn index_consistent(&self) -> bool {
        self.index == self.full_rebuild()
    }

    /// All entities in insertion order
    pub fn iter(&self) -> impl Iterator<Item = EntityRef<'_>> + '_ {
        self.order
            .values()
            .filter_map(|(kind, id)| self.lookup(*kind, id))
    }

    /// Entities of one kind in insertion order
    pub fn iter_kind(&self, kind: EntityKind) -> impl Iterator<Item = EntityRef<'_>> + '_ {
        self.order
            .values()
            .filter(move |(k, _)| *k == kind)
            .filter_map(|(kind, id)| self.lookup(*kind, id))
    }

    pub fn zones(&self) -> impl Iterator<Item = &Zone> + '_ {
        self.iter_kind(EntityKind::Zone).filter_map(|e| e.as_zone())
    }

    pub fn buildings(&self) -> impl Iterator<Item = &Building> + '_ {
        self.iter_kind(EntityKind::Building)
            .filter_map(|e| e.as_building())
    }

    pub fn roads(&self) -> impl Iterator<Item = &Road> + '_ {
        self.iter_kind(EntityKind::Road).filter_map(|e| e.as_road())
    }

    pub fn sensors(&self) -> impl Iterator<Item = &Sensor> + '_ {
        self.iter_kind(EntityKind::Sensor).filter_map(|e| e.as_sensor())
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Zone => self.zones.len(),
            EntityKind::Building => self.buildings.len(),
            EntityKind::Road => self.roads.len(),
            EntityKind::Sensor => self.sensors.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new(GeometryKernel::default())
    }
}
