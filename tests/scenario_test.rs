// Integration tests for end-to-end planning scenarios through the public API

use std::collections::BTreeSet;
use urbanplan::{
    BuildingSpec, Coordinate, EntityKind, EntityStore, FootprintSpec, GeometryKernel, PlanError,
    PlanSnapshot, Predicate, RoadSpec, SensorKind, SensorSelector, SensorSpec, Statistic,
    TimeWindow, TrafficDirection, ZoneSpec, ZoneType,
};

fn square(min: f64, max: f64) -> Vec<Coordinate> {
    vec![
        Coordinate::new(min, min),
        Coordinate::new(max, min),
        Coordinate::new(max, max),
        Coordinate::new(min, max),
    ]
}

/// A building at the centre of a square zone is associated with it.
#[test]
fn test_building_in_square_zone() {
    let mut store = EntityStore::default();
    let zone = store
        .add_zone(ZoneSpec::new("Block", ZoneType::Residential, square(0.0, 10.0)))
        .unwrap();
    let building = store
        .add_building(BuildingSpec::new(
            "House",
            ZoneType::Residential,
            FootprintSpec::Point(Coordinate::new(5.0, 5.0)),
            9.0,
            3,
        ))
        .unwrap();

    assert_eq!(store.zones_for(&building).unwrap(), BTreeSet::from([zone]));

    let kernel = GeometryKernel::default();
    let area = kernel.polygon_area(&store.zone(&zone).unwrap().boundary).unwrap();
    assert!((area - 100.0).abs() < 1e-9);
}

/// Mean of three readings over the inclusive window.
#[test]
fn test_traffic_sensor_mean() {
    let mut store = EntityStore::default();
    let sensor = store
        .add_sensor(SensorSpec::new(SensorKind::Traffic, Coordinate::new(1.0, 1.0)))
        .unwrap();
    for (t, v) in [(0, 10.0), (60, 20.0), (120, 30.0)] {
        store.record_reading(&sensor, t, v).unwrap();
    }

    let mean = store
        .query()
        .aggregate(
            &SensorSelector::sensor(sensor),
            Statistic::Mean,
            TimeWindow::new(0, 120).unwrap(),
        )
        .unwrap();
    assert!((mean - 20.0).abs() < 1e-12);
}

/// Aggregating over no sensors is an error, never a default value.
#[test]
fn test_empty_selection() {
    let mut store = EntityStore::default();
    store
        .add_sensor(SensorSpec::new(SensorKind::Noise, Coordinate::new(1.0, 1.0)))
        .unwrap();

    let result = store.query().aggregate(
        &SensorSelector::any().of_kind(SensorKind::WaterLevel),
        Statistic::Sum,
        TimeWindow::all(),
    );
    assert_eq!(result, Err(PlanError::EmptySelection));
}

/// Removing a zone keeps the building but clears its association.
#[test]
fn test_remove_zone_keeps_building() {
    let mut store = EntityStore::default();
    let zone = store
        .add_zone(ZoneSpec::new("Block", ZoneType::Commercial, square(0.0, 10.0)))
        .unwrap();
    let building = store
        .add_building(BuildingSpec::new(
            "Shop",
            ZoneType::Commercial,
            FootprintSpec::Outline(square(4.0, 6.0)),
            6.0,
            2,
        ))
        .unwrap();
    assert_eq!(store.zones_for(&building).unwrap().len(), 1);

    store.remove(&zone).unwrap();

    assert!(store.building(&building).is_ok());
    assert!(store.zones_for(&building).unwrap().is_empty());
}

/// Out-of-order readings are rejected and the log is unchanged.
#[test]
fn test_out_of_order_reading() {
    let mut store = EntityStore::default();
    let sensor = store
        .add_sensor(SensorSpec::new(SensorKind::Weather, Coordinate::new(2.0, 2.0)))
        .unwrap();
    store.record_reading(&sensor, 100, 21.5).unwrap();

    let before = store.sensor(&sensor).unwrap().readings.clone();
    let result = store.record_reading(&sensor, 99, 22.0);

    assert!(matches!(result, Err(PlanError::InvalidReading { .. })));
    assert_eq!(store.sensor(&sensor).unwrap().readings, before);
}

/// The smart-city layout: inclusive boundaries and a sensor outside every zone.
#[test]
fn test_smart_city_layout() {
    let mut store = EntityStore::default();
    let residential = store
        .add_zone(ZoneSpec::new(
            "Aalim Residential Area",
            ZoneType::Residential,
            vec![
                Coordinate::new(13.0010, 80.2500),
                Coordinate::new(13.0020, 80.2500),
                Coordinate::new(13.0020, 80.2520),
                Coordinate::new(13.0010, 80.2520),
            ],
        ))
        .unwrap();
    let commercial = store
        .add_zone(ZoneSpec::new(
            "Aalim Commercial Hub",
            ZoneType::Commercial,
            vec![
                Coordinate::new(13.0030, 80.2530),
                Coordinate::new(13.0040, 80.2530),
                Coordinate::new(13.0040, 80.2550),
                Coordinate::new(13.0030, 80.2550),
            ],
        ))
        .unwrap();
    let tech_park = store
        .add_building(BuildingSpec::new(
            "Aalim Tech Park",
            ZoneType::Commercial,
            FootprintSpec::Outline(vec![
                Coordinate::new(13.0032, 80.2535),
                Coordinate::new(13.0038, 80.2535),
                Coordinate::new(13.0038, 80.2545),
                Coordinate::new(13.0032, 80.2545),
            ]),
            60.0,
            20,
        ))
        .unwrap();
    let road = store
        .add_road(RoadSpec::new(
            "Aalim Main Avenue",
            vec![
                Coordinate::new(13.0010, 80.2510),
                Coordinate::new(13.0040, 80.2540),
            ],
            15.0,
            TrafficDirection::TwoWay,
        ))
        .unwrap();
    let traffic = store
        .add_sensor(SensorSpec::new(SensorKind::Traffic, Coordinate::new(13.0025, 80.2525)))
        .unwrap();
    // On the residential zone's northern edge
    let air = store
        .add_sensor(SensorSpec::new(SensorKind::AirQuality, Coordinate::new(13.0020, 80.2515)))
        .unwrap();

    assert_eq!(store.zones_for(&tech_park).unwrap(), BTreeSet::from([commercial]));
    assert!(store.zones_for(&traffic).unwrap().is_empty());
    assert_eq!(store.zones_for(&air).unwrap(), BTreeSet::from([residential]));
    assert!(store.zones_for(&road).unwrap().is_empty());

    let in_residential = store
        .query()
        .filter(EntityKind::Sensor, Predicate::InZoneOfType(ZoneType::Residential))
        .unwrap()
        .ids();
    assert_eq!(in_residential, vec![air]);
    assert!(store.index_consistent());
}

/// A saved snapshot restores an equivalent store.
#[test]
fn test_snapshot_round_trip_through_file() {
    let mut store = EntityStore::default();
    let zone = store
        .add_zone(ZoneSpec::new("Park", ZoneType::Recreational, square(0.0, 4.0)))
        .unwrap();
    let sensor = store
        .add_sensor(SensorSpec::new(SensorKind::Pedestrian, Coordinate::new(2.0, 2.0)))
        .unwrap();
    store.record_reading(&sensor, 10, 4.0).unwrap();

    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("park.json.gz");
    PlanSnapshot::from_store(&store).save_to_file(&path).unwrap();

    let loaded = PlanSnapshot::load_from_file(&path).unwrap();
    let restored = EntityStore::from_snapshot(GeometryKernel::default(), &loaded).unwrap();

    assert_eq!(restored.len(), 2);
    assert_eq!(restored.zones_for(&sensor).unwrap(), BTreeSet::from([zone]));
    assert_eq!(restored.sensor(&sensor).unwrap(), store.sensor(&sensor).unwrap());
}
