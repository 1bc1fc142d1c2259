// Planar geometry primitives and validation
pub mod geometry;

// Entity model: zones, buildings, roads, sensors
pub mod entity;

// Crate-level error type
pub mod error;

// Derived zone associations
pub mod index;

// Entity storage and mutations
pub mod store;

// Read-only filters and aggregates
pub mod query;

// Persistence output and recovery
pub mod snapshot;

// Independent plans and the plan registry
pub mod plan;

// TOML configuration
pub mod config;

pub use entity::{
    Building, BuildingSpec, EntityId, EntityKind, EntityRef, FootprintSpec, Reading, Road,
    RoadSpec, Sensor, SensorKind, SensorSpec, SensorStatus, Timestamp, TrafficDirection,
    ValidationError, Zone, ZoneSpec, ZoneType,
};
pub use error::{PlanError, Result};
pub use geometry::{Coordinate, CoordinateBounds, GeometryError, GeometryKernel, Polygon};
pub use plan::{Plan, PlanMetadata, PlanRegistry};
pub use query::{
    Attribute, Predicate, QueryEngine, ReadingSummary, Selection, SensorSelector, Statistic,
    TimeWindow,
};
pub use snapshot::PlanSnapshot;
pub use store::EntityStore;
