use super::*;
use crate::entity::{SensorKind, TrafficDirection, ZoneType};
use crate::geometry::{CoordinateBounds, GeometryError};
use serde_json::json;

fn square(min: f64, max: f64) -> Vec<Coordinate> {
    vec![
        Coordinate::new(min, min),
        Coordinate::new(max, min),
        Coordinate::new(max, max),
        Coordinate::new(min, max),
    ]
}

fn point_building(name: &str, lat: f64, lon: f64) -> BuildingSpec {
    BuildingSpec::new(
        name,
        ZoneType::Residential,
        FootprintSpec::Point(Coordinate::new(lat, lon)),
        12.0,
        4,
    )
}

#[test]
fn test_square_zone_scenario() {
    let mut store = EntityStore::default();
    let zone = store
        .add_zone(ZoneSpec::new("Square", ZoneType::Residential, square(0.0, 10.0)))
        .unwrap();
    let building = store.add_building(point_building("Home", 5.0, 5.0)).unwrap();

    assert_eq!(store.zones_for(&building).unwrap(), BTreeSet::from([zone]));
    let area = store.zone(&zone).unwrap().area;
    assert!((area - 100.0).abs() < 1e-9);
    assert!(store.index_consistent());
}

#[test]
fn test_zone_added_after_entities_picks_them_up() {
    let mut store = EntityStore::default();
    let building = store.add_building(point_building("Early", 5.0, 5.0)).unwrap();
    let sensor = store
        .add_sensor(SensorSpec::new(SensorKind::Noise, Coordinate::new(1.0, 1.0)))
        .unwrap();
    assert!(store.zones_for(&building).unwrap().is_empty());

    let zone = store
        .add_zone(ZoneSpec::new("Late", ZoneType::MixedUse, square(0.0, 10.0)))
        .unwrap();

    assert_eq!(
        store.entities_in_zone(&zone, EntityKind::Building).unwrap(),
        BTreeSet::from([building])
    );
    assert_eq!(
        store.entities_in_zone(&zone, EntityKind::Sensor).unwrap(),
        BTreeSet::from([sensor])
    );
}

#[test]
fn test_add_zone_validation_leaves_store_unchanged() {
    let mut store = EntityStore::default();
    store.add_building(point_building("Home", 5.0, 5.0)).unwrap();

    let result = store.add_zone(ZoneSpec::new(
        "Broken",
        ZoneType::Industrial,
        vec![Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 1.0)],
    ));
    assert!(matches!(
        result,
        Err(PlanError::Validation(ValidationError::Geometry {
            field: "boundary",
            source: GeometryError::DegeneratePolygon { .. },
        }))
    ));
    assert_eq!(store.len(), 1);
    assert_eq!(store.count(EntityKind::Zone), 0);
    assert!(store.index().is_empty());
}

#[test]
fn test_add_rejects_out_of_range_coordinates() {
    let kernel = GeometryKernel::new(
        CoordinateBounds {
            min_latitude: 0.0,
            max_latitude: 50.0,
            min_longitude: 0.0,
            max_longitude: 50.0,
        },
        1e-9,
    );
    let mut store = EntityStore::new(kernel);

    let result = store.add_sensor(SensorSpec::new(SensorKind::Weather, Coordinate::new(60.0, 1.0)));
    assert!(matches!(
        result,
        Err(PlanError::Validation(ValidationError::Geometry {
            field: "location",
            source: GeometryError::InvalidCoordinate { .. },
        }))
    ));

    let result = store.add_road(RoadSpec::new(
        "Off map",
        vec![Coordinate::new(1.0, 1.0), Coordinate::new(1.0, 51.0)],
        5.0,
        TrafficDirection::OneWay,
    ));
    assert!(result.is_err());
    assert!(store.is_empty());
}

#[test]
fn test_remove_zone_keeps_building() {
    let mut store = EntityStore::default();
    let zone = store
        .add_zone(ZoneSpec::new("Square", ZoneType::Residential, square(0.0, 10.0)))
        .unwrap();
    let building = store.add_building(point_building("Home", 5.0, 5.0)).unwrap();

    assert_eq!(store.remove(&zone).unwrap(), EntityKind::Zone);

    assert!(store.building(&building).is_ok());
    assert!(store.zones_for(&building).unwrap().is_empty());
    assert_eq!(store.zone(&zone), Err(PlanError::NotFound(zone)));
    assert!(store.index_consistent());
}

#[test]
fn test_remove_building_cascades_index() {
    let mut store = EntityStore::default();
    let zone = store
        .add_zone(ZoneSpec::new("Square", ZoneType::Residential, square(0.0, 10.0)))
        .unwrap();
    let building = store.add_building(point_building("Home", 5.0, 5.0)).unwrap();

    store.remove(&building).unwrap();
    assert!(store
        .entities_in_zone(&zone, EntityKind::Building)
        .unwrap()
        .is_empty());
    assert_eq!(store.zones_for(&building), Err(PlanError::NotFound(building)));
}

#[test]
fn test_remove_and_get_unknown_id() {
    let mut store = EntityStore::default();
    let missing = EntityId::new();
    assert_eq!(store.remove(&missing), Err(PlanError::NotFound(missing)));
    assert_eq!(store.get(&missing).unwrap_err(), PlanError::NotFound(missing));
}

#[test]
fn test_get_returns_typed_view() {
    let mut store = EntityStore::default();
    let road = store
        .add_road(
            RoadSpec::new(
                "Main Avenue",
                vec![Coordinate::new(13.001, 80.251), Coordinate::new(13.004, 80.254)],
                15.0,
                TrafficDirection::TwoWay,
            )
            .with_attribute("speed_limit", json!(50)),
        )
        .unwrap();

    let entity = store.get(&road).unwrap();
    assert_eq!(entity.kind(), EntityKind::Road);
    assert_eq!(entity.id(), road);
    assert_eq!(entity.attributes()["speed_limit"], json!(50));
    assert_eq!(entity.as_road().unwrap().name, "Main Avenue");
    assert!(entity.as_zone().is_none());
}

#[test]
fn test_record_reading_monotonic() {
    let mut store = EntityStore::default();
    let sensor = store
        .add_sensor(SensorSpec::new(SensorKind::Traffic, Coordinate::new(1.0, 1.0)))
        .unwrap();

    store.record_reading(&sensor, 60, 20.0).unwrap();
    // Equal timestamps are accepted
    store.record_reading(&sensor, 60, 21.0).unwrap();

    let result = store.record_reading(&sensor, 30, 5.0);
    assert_eq!(
        result,
        Err(PlanError::InvalidReading {
            sensor_id: sensor,
            timestamp: 30,
            last: 60,
        })
    );

    let readings = &store.sensor(&sensor).unwrap().readings;
    assert_eq!(readings.len(), 2);
    assert_eq!(readings[0], Reading { timestamp: 60, value: 20.0 });
    assert_eq!(readings[1], Reading { timestamp: 60, value: 21.0 });
}

#[test]
fn test_record_reading_errors() {
    let mut store = EntityStore::default();
    let sensor = store
        .add_sensor(SensorSpec::new(SensorKind::Traffic, Coordinate::new(1.0, 1.0)))
        .unwrap();
    let building = store.add_building(point_building("Home", 1.0, 1.0)).unwrap();

    assert_eq!(
        store.record_reading(&building, 0, 1.0),
        Err(PlanError::NotFound(building))
    );
    assert!(matches!(
        store.record_reading(&sensor, 0, f64::NAN),
        Err(PlanError::Validation(ValidationError::InvalidNumber { field: "value", .. }))
    ));
    assert!(store.sensor(&sensor).unwrap().readings.is_empty());
}

#[test]
fn test_set_zone_boundary_reassociates() {
    let mut store = EntityStore::default();
    let zone = store
        .add_zone(ZoneSpec::new("Moving", ZoneType::Commercial, square(0.0, 10.0)))
        .unwrap();
    let near = store.add_building(point_building("Near", 5.0, 5.0)).unwrap();
    let far = store.add_building(point_building("Far", 25.0, 25.0)).unwrap();

    store.set_zone_boundary(&zone, square(20.0, 40.0)).unwrap();

    assert!(store.zones_for(&near).unwrap().is_empty());
    assert_eq!(store.zones_for(&far).unwrap(), BTreeSet::from([zone]));
    assert!((store.zone(&zone).unwrap().area - 400.0).abs() < 1e-9);
    assert!(store.index_consistent());

    // Invalid boundary keeps the previous one
    assert!(store.set_zone_boundary(&zone, Vec::new()).is_err());
    assert!((store.zone(&zone).unwrap().area - 400.0).abs() < 1e-9);
    assert_eq!(store.zones_for(&far).unwrap(), BTreeSet::from([zone]));
}

#[test]
fn test_relocate_building_and_sensor() {
    let mut store = EntityStore::default();
    let west = store
        .add_zone(ZoneSpec::new("West", ZoneType::Residential, square(0.0, 10.0)))
        .unwrap();
    let east = store
        .add_zone(ZoneSpec::new("East", ZoneType::Industrial, square(20.0, 30.0)))
        .unwrap();
    let building = store.add_building(point_building("Mover", 5.0, 5.0)).unwrap();
    let sensor = store
        .add_sensor(SensorSpec::new(SensorKind::WaterLevel, Coordinate::new(5.0, 5.0)))
        .unwrap();

    store
        .relocate_building(&building, FootprintSpec::Outline(square(22.0, 24.0)))
        .unwrap();
    store.relocate_sensor(&sensor, Coordinate::new(25.0, 25.0)).unwrap();

    assert_eq!(store.zones_for(&building).unwrap(), BTreeSet::from([east]));
    assert_eq!(store.zones_for(&sensor).unwrap(), BTreeSet::from([east]));
    assert!(store
        .entities_in_zone(&west, EntityKind::Sensor)
        .unwrap()
        .is_empty());
    assert!(store.index_consistent());

    assert!(store
        .relocate_sensor(&sensor, Coordinate::new(f64::NAN, 0.0))
        .is_err());
    assert_eq!(
        store.sensor(&sensor).unwrap().location,
        Coordinate::new(25.0, 25.0)
    );
}

#[test]
fn test_overlapping_zones() {
    let mut store = EntityStore::default();
    let a = store
        .add_zone(ZoneSpec::new("A", ZoneType::Residential, square(0.0, 10.0)))
        .unwrap();
    let b = store
        .add_zone(ZoneSpec::new("B", ZoneType::Recreational, square(5.0, 15.0)))
        .unwrap();
    let sensor = store
        .add_sensor(SensorSpec::new(SensorKind::Pedestrian, Coordinate::new(7.0, 7.0)))
        .unwrap();

    assert_eq!(store.zones_for(&sensor).unwrap(), BTreeSet::from([a, b]));
}

#[test]
fn test_traffic_flow_and_status_updates() {
    let mut store = EntityStore::default();
    let road = store
        .add_road(RoadSpec::new(
            "Ring",
            vec![Coordinate::new(0.0, 0.0), Coordinate::new(1.0, 1.0)],
            8.0,
            TrafficDirection::OneWay,
        ))
        .unwrap();
    let sensor = store
        .add_sensor(SensorSpec::new(SensorKind::EnergyUsage, Coordinate::new(0.5, 0.5)))
        .unwrap();

    store.set_traffic_flow(&road, 340.0).unwrap();
    assert_eq!(store.road(&road).unwrap().traffic_flow, 340.0);
    assert!(store.set_traffic_flow(&road, -1.0).is_err());
    assert_eq!(store.road(&road).unwrap().traffic_flow, 340.0);

    store.set_sensor_status(&sensor, SensorStatus::Maintenance).unwrap();
    assert_eq!(store.sensor(&sensor).unwrap().status, SensorStatus::Maintenance);
    assert_eq!(
        store.set_sensor_status(&road, SensorStatus::Offline),
        Err(PlanError::NotFound(road))
    );
}

#[test]
fn test_iteration_in_insertion_order() {
    let mut store = EntityStore::default();
    let b1 = store.add_building(point_building("One", 1.0, 1.0)).unwrap();
    let z = store
        .add_zone(ZoneSpec::new("Z", ZoneType::Residential, square(0.0, 10.0)))
        .unwrap();
    let b2 = store.add_building(point_building("Two", 2.0, 2.0)).unwrap();
    let b3 = store.add_building(point_building("Three", 3.0, 3.0)).unwrap();
    store.remove(&b2).unwrap();

    let ids: Vec<EntityId> = store.iter().map(|e| e.id()).collect();
    assert_eq!(ids, vec![b1, z, b3]);

    let names: Vec<&str> = store.buildings().map(|b| b.name.as_str()).collect();
    assert_eq!(names, vec!["One", "Three"]);
    assert_eq!(store.count(EntityKind::Building), 2);
}

#[test]
fn test_rebuild_index_matches_incremental() {
    let mut store = EntityStore::default();
    for i in 0..4 {
        let min = f64::from(i) * 5.0;
        store
            .add_zone(ZoneSpec::new(
                format!("Z{}", i),
                ZoneType::MixedUse,
                square(min, min + 8.0),
            ))
            .unwrap();
    }
    for i in 0..10 {
        let at = f64::from(i) * 2.5;
        store.add_building(point_building("B", at, at)).unwrap();
        store
            .add_sensor(SensorSpec::new(SensorKind::Noise, Coordinate::new(at + 1.0, at)))
            .unwrap();
    }

    let incremental = store.index().clone();
    assert!(store.index_consistent());
    let pairs = store.rebuild_index();
    assert_eq!(pairs, incremental.len());
    assert_eq!(store.index(), &incremental);
}
