use super::{PlanSnapshot, SnapshotEntity};
use crate::entity::validation::{
    validate_building, validate_location, validate_reading_value, validate_road, validate_zone,
};
use crate::entity::{
    Building, BuildingSpec, Footprint, FootprintSpec, Road, RoadSpec, Sensor, ValidationError,
    Zone, ZoneSpec,
};
use crate::error::{PlanError, Result};
use crate::geometry::GeometryKernel;
use crate::store::EntityStore;
use tracing::{info, warn};

impl EntityStore {
    /// Rebuild a store from a snapshot
    ///
    /// Every entity is re-validated against `kernel`, ids and insertion order
    /// are kept, and the relationship index is derived from geometry. Stored
    /// associations that disagree with geometry are discarded.
    pub fn from_snapshot(kernel: GeometryKernel, snapshot: &PlanSnapshot) -> Result<Self> {
        let mut store = EntityStore::new(kernel);

        for entity in &snapshot.entities {
            let id = entity.id();
            if store.contains(&id) {
                return Err(ValidationError::DuplicateId(id).into());
            }

            match entity {
                SnapshotEntity::Zone(zone) => {
                    let zone = restore_zone(store.kernel(), zone)?;
                    store.insert_zone(zone);
                }
                SnapshotEntity::Building(building) => {
                    let building = restore_building(store.kernel(), building)?;
                    store.insert_building(building);
                }
                SnapshotEntity::Road(road) => {
                    restore_road(store.kernel(), road)?;
                    store.insert_road(road.clone());
                }
                SnapshotEntity::Sensor(sensor) => {
                    restore_sensor(store.kernel(), sensor)?;
                    store.insert_sensor(sensor.clone());
                }
            }
        }

        let derived = store.index().associations();
        if !snapshot.associations.is_empty() && snapshot.associations != derived {
            warn!(
                stored = snapshot.associations.len(),
                derived = derived.len(),
                "Stored associations disagree with geometry, using derived index"
            );
        }

        info!(
            entities = store.len(),
            associations = derived.len(),
            "Store restored from snapshot"
        );
        Ok(store)
    }
}

fn restore_zone(kernel: &GeometryKernel, zone: &Zone) -> Result<Zone> {
    let spec = ZoneSpec {
        name: zone.name.clone(),
        zone_type: zone.zone_type,
        boundary: zone.boundary.vertices().to_vec(),
        attributes: zone.attributes.clone(),
    };
    let boundary = validate_zone(kernel, &spec)?;

    Ok(Zone {
        id: zone.id,
        name: spec.name,
        zone_type: spec.zone_type,
        area: boundary.area(),
        boundary,
        attributes: spec.attributes,
    })
}

fn restore_building(kernel: &GeometryKernel, building: &Building) -> Result<Building> {
    let footprint = match &building.footprint {
        Footprint::Point(c) => FootprintSpec::Point(*c),
        Footprint::Outline(polygon) => FootprintSpec::Outline(polygon.vertices().to_vec()),
    };
    let spec = BuildingSpec {
        name: building.name.clone(),
        usage: building.usage,
        footprint,
        height: building.height,
        floors: building.floors,
        attributes: building.attributes.clone(),
    };
    let footprint = validate_building(kernel, &spec)?;

    Ok(Building {
        footprint,
        ..building.clone()
    })
}

fn restore_road(kernel: &GeometryKernel, road: &Road) -> Result<()> {
    let spec = RoadSpec {
        name: road.name.clone(),
        path: road.path.clone(),
        width: road.width,
        traffic_direction: road.traffic_direction,
        traffic_flow: road.traffic_flow,
        attributes: road.attributes.clone(),
    };
    validate_road(kernel, &spec)?;
    Ok(())
}

fn restore_sensor(kernel: &GeometryKernel, sensor: &Sensor) -> Result<()> {
    validate_location(kernel, "location", sensor.location)?;

    for (i, reading) in sensor.readings.iter().enumerate() {
        validate_reading_value(reading.value)?;
        if let Some(previous) = i.checked_sub(1).map(|p| sensor.readings[p]) {
            if reading.timestamp < previous.timestamp {
                return Err(PlanError::InvalidReading {
                    sensor_id: sensor.id,
                    timestamp: reading.timestamp,
                    last: previous.timestamp,
                });
            }
        }
    }
    Ok(())
}
