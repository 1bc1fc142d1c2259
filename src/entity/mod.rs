use crate::geometry::{planar_distance, Coordinate, Polygon};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub mod validation;

pub use validation::ValidationError;


/// Free-form descriptive attributes (year built, speed limit, ...)
pub type Attributes = BTreeMap<String, serde_json::Value>;

/// Reading timestamp in caller-defined units (Unix seconds in the demo)
pub type Timestamp = i64;

/// Unique identity of a zone, building, road or sensor (UUIDv7)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(Uuid);

impl EntityId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for EntityId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for EntityId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Parse a closed set of snake_case names, e.g. "mixed_use"
macro_rules! named_variants {
    ($ty:ident, $field:literal, { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $name),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok($ty::$variant),)+
                    other => Err(ValidationError::UnknownVariant {
                        field: $field,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Zone,
    Building,
    Road,
    Sensor,
}

named_variants!(EntityKind, "entity_kind", {
    Zone => "zone",
    Building => "building",
    Road => "road",
    Sensor => "sensor",
});

/// Land-use category of a zone, also used to tag building use
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneType {
    Residential,
    Commercial,
    Industrial,
    Recreational,
    MixedUse,
    SpecialPurpose,
}

named_variants!(ZoneType, "zone_type", {
    Residential => "residential",
    Commercial => "commercial",
    Industrial => "industrial",
    Recreational => "recreational",
    MixedUse => "mixed_use",
    SpecialPurpose => "special_purpose",
});

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Traffic,
    AirQuality,
    Noise,
    Weather,
    Pedestrian,
    WaterLevel,
    EnergyUsage,
}

named_variants!(SensorKind, "sensor_kind", {
    Traffic => "traffic",
    AirQuality => "air_quality",
    Noise => "noise",
    Weather => "weather",
    Pedestrian => "pedestrian",
    WaterLevel => "water_level",
    EnergyUsage => "energy_usage",
});

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorStatus {
    #[default]
    Online,
    Offline,
    Maintenance,
}

named_variants!(SensorStatus, "sensor_status", {
    Online => "online",
    Offline => "offline",
    Maintenance => "maintenance",
});

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficDirection {
    OneWay,
    #[default]
    TwoWay,
}

named_variants!(TrafficDirection, "traffic_direction", {
    OneWay => "one_way",
    TwoWay => "two_way",
});

/// Polygonal land-use region
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: EntityId,
    pub name: String,
    pub zone_type: ZoneType,
    pub boundary: Polygon,
    /// Derived from `boundary`; recomputed whenever the boundary is replaced
    pub area: f64,
    #[serde(default)]
    pub attributes: Attributes,
}

/// Building footprint: a single point or an outline polygon
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Footprint {
    Point(Coordinate),
    Outline(Polygon),
}

impl Footprint {
    /// Point used for zone association
    pub fn reference_point(&self) -> Coordinate {
        match self {
            Footprint::Point(c) => *c,
            Footprint::Outline(polygon) => polygon.centroid(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Building {
    pub id: EntityId,
    pub name: String,
    pub footprint: Footprint,
    /// Meters
    pub height: f64,
    pub floors: u32,
    pub usage: ZoneType,
    #[serde(default)]
    pub attributes: Attributes,
}

impl Building {
    pub fn reference_point(&self) -> Coordinate {
        self.footprint.reference_point()
    }

    /// Ground footprint area; zero for a point footprint
    pub fn floor_area(&self) -> f64 {
        match &self.footprint {
            Footprint::Point(_) => 0.0,
            Footprint::Outline(polygon) => polygon.area(),
        }
    }

    /// Floor area summed across all floors
    pub fn total_area(&self) -> f64 {
        self.floor_area() * f64::from(self.floors)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Road {
    pub id: EntityId,
    pub name: String,
    pub path: Vec<Coordinate>,
    /// Meters
    pub width: f64,
    #[serde(default)]
    pub traffic_direction: TrafficDirection,
    /// Current traffic-flow metric (vehicles per interval, caller-defined)
    pub traffic_flow: f64,
    #[serde(default)]
    pub attributes: Attributes,
}

impl Road {
    /// Sum of segment lengths along the path
    pub fn length(&self) -> f64 {
        self.path
            .windows(2)
            .map(|pair| planar_distance(pair[0], pair[1]))
            .sum()
    }
}

/// One timestamped sensor value
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub timestamp: Timestamp,
    pub value: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sensor {
    pub id: EntityId,
    pub kind: SensorKind,
    pub location: Coordinate,
    #[serde(default)]
    pub status: SensorStatus,
    /// Append-only, ordered by timestamp
    #[serde(default)]
    pub readings: Vec<Reading>,
    #[serde(default)]
    pub attributes: Attributes,
}

impl Sensor {
    pub fn last_reading(&self) -> Option<&Reading> {
        self.readings.last()
    }

    /// Readings with `start <= timestamp <= end`
    pub fn readings_between(&self, start: Timestamp, end: Timestamp) -> &[Reading] {
        let lo = self.readings.partition_point(|r| r.timestamp < start);
        let hi = self.readings.partition_point(|r| r.timestamp <= end);
        if lo >= hi {
            &[]
        } else {
            &self.readings[lo..hi]
        }
    }
}

/// Borrowed view of any stored entity
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EntityRef<'a> {
    Zone(&'a Zone),
    Building(&'a Building),
    Road(&'a Road),
    Sensor(&'a Sensor),
}

impl<'a> EntityRef<'a> {
    pub fn id(&self) -> EntityId {
        match self {
            EntityRef::Zone(z) => z.id,
            EntityRef::Building(b) => b.id,
            EntityRef::Road(r) => r.id,
            EntityRef::Sensor(s) => s.id,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            EntityRef::Zone(_) => EntityKind::Zone,
            EntityRef::Building(_) => EntityKind::Building,
            EntityRef::Road(_) => EntityKind::Road,
            EntityRef::Sensor(_) => EntityKind::Sensor,
        }
    }

    pub fn attributes(&self) -> &'a Attributes {
        match self {
            EntityRef::Zone(z) => &z.attributes,
            EntityRef::Building(b) => &b.attributes,
            EntityRef::Road(r) => &r.attributes,
            EntityRef::Sensor(s) => &s.attributes,
        }
    }

    pub fn as_zone(&self) -> Option<&'a Zone> {
        match self {
            EntityRef::Zone(z) => Some(z),
            _ => None,
        }
    }

    pub fn as_building(&self) -> Option<&'a Building> {
        match self {
            EntityRef::Building(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_road(&self) -> Option<&'a Road> {
        match self {
            EntityRef::Road(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_sensor(&self) -> Option<&'a Sensor> {
        match self {
            EntityRef::Sensor(s) => Some(s),
            _ => None,
        }
    }
}

/// Input for `EntityStore::add_zone`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ZoneSpec {
    pub name: String,
    pub zone_type: ZoneType,
    pub boundary: Vec<Coordinate>,
    #[serde(default)]
    pub attributes: Attributes,
}

impl ZoneSpec {
    pub fn new(name: impl Into<String>, zone_type: ZoneType, boundary: Vec<Coordinate>) -> Self {
        Self {
            name: name.into(),
            zone_type,
            boundary,
            attributes: Attributes::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}

/// Unvalidated building footprint
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FootprintSpec {
    Point(Coordinate),
    Outline(Vec<Coordinate>),
}

/// Input for `EntityStore::add_building`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BuildingSpec {
    pub name: String,
    pub usage: ZoneType,
    pub footprint: FootprintSpec,
    pub height: f64,
    pub floors: u32,
    #[serde(default)]
    pub attributes: Attributes,
}

impl BuildingSpec {
    pub fn new(
        name: impl Into<String>,
        usage: ZoneType,
        footprint: FootprintSpec,
        height: f64,
        floors: u32,
    ) -> Self {
        Self {
            name: name.into(),
            usage,
            footprint,
            height,
            floors,
            attributes: Attributes::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}

/// Input for `EntityStore::add_road`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoadSpec {
    pub name: String,
    pub path: Vec<Coordinate>,
    pub width: f64,
    #[serde(default)]
    pub traffic_direction: TrafficDirection,
    #[serde(default)]
    pub traffic_flow: f64,
    #[serde(default)]
    pub attributes: Attributes,
}

impl RoadSpec {
    pub fn new(
        name: impl Into<String>,
        path: Vec<Coordinate>,
        width: f64,
        traffic_direction: TrafficDirection,
    ) -> Self {
        Self {
            name: name.into(),
            path,
            width,
            traffic_direction,
            traffic_flow: 0.0,
            attributes: Attributes::new(),
        }
    }

    pub fn with_traffic_flow(mut self, traffic_flow: f64) -> Self {
        self.traffic_flow = traffic_flow;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}

/// Input for `EntityStore::add_sensor`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SensorSpec {
    pub kind: SensorKind,
    pub location: Coordinate,
    #[serde(default)]
    pub status: SensorStatus,
    #[serde(default)]
    pub attributes: Attributes,
}

impl SensorSpec {
    pub fn new(kind: SensorKind, location: Coordinate) -> Self {
        Self {
            kind,
            location,
            status: SensorStatus::Online,
            attributes: Attributes::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}
