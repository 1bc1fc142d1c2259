use anyhow::{Context, Result};
use chrono::Utc;
use std::path::PathBuf;
use tracing::info;
use urbanplan::config::{load_config, PlanConfig};
use urbanplan::snapshot::recovery::restore_latest_plan;
use urbanplan::{
    BuildingSpec, Coordinate, EntityId, EntityKind, EntityStore, FootprintSpec, PlanError,
    PlanRegistry, Predicate, RoadSpec, SensorKind, SensorSelector, SensorSpec, Statistic,
    TimeWindow, TrafficDirection, ZoneSpec, ZoneType,
};

fn main() -> Result<()> {
    let config = match std::env::var("URBANPLAN_CONFIG") {
        Ok(path) => load_config(&PathBuf::from(path))?
            .with_overrides(|key| std::env::var(key).ok()),
        Err(_) => PlanConfig::from_env(),
    };
    config.validate()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.filter.as_str().into()),
        )
        .init();

    info!("urbanplan starting...");

    let registry = PlanRegistry::new();
    let now = Utc::now().timestamp();

    let plan = match restore_latest_plan(&config.snapshot.directory, &config.geometry.kernel())? {
        Some((path, plan)) => {
            info!(path = %path.display(), plan = plan.name(), "Resuming plan from snapshot");
            let id = plan.id();
            registry.insert(plan);
            registry
                .get(&id)
                .context("Restored plan missing from registry")?
        }
        None => {
            let plan = registry.create(
                "Aalim Smart City Development",
                "Sustainable development plan near Aalim College",
                config.geometry.kernel(),
            );
            plan.update(|store| build_demonstration(store, now))
                .context("Failed to build demonstration plan")?;
            plan
        }
    };

    {
        let store = plan.read();
        info!(
            plan = plan.name(),
            zones = store.count(EntityKind::Zone),
            buildings = store.count(EntityKind::Building),
            roads = store.count(EntityKind::Road),
            sensors = store.count(EntityKind::Sensor),
            associations = store.index().len(),
            "Plan summary"
        );

        for building in store.buildings() {
            let zones = store.zones_for(&building.id)?;
            info!(
                building = %building.name,
                usage = %building.usage,
                floors = building.floors,
                height = building.height,
                floor_area = building.floor_area(),
                total_area = building.total_area(),
                zones = zones.len(),
                "Building"
            );
        }

        for road in store.roads() {
            info!(road = %road.name, length = road.length(), traffic_flow = road.traffic_flow, "Road");
        }

        let query = store.query();
        let last_hour = TimeWindow::trailing(now, 3600)?;
        match query.aggregate(
            &SensorSelector::any().of_kind(SensorKind::Traffic),
            Statistic::Mean,
            last_hour,
        ) {
            Ok(mean) => info!(mean_vehicles = mean, "Traffic over the last hour"),
            Err(PlanError::EmptySelection) => info!("No traffic readings in the last hour"),
            Err(e) => return Err(e.into()),
        }

        let residential_zones: Vec<EntityId> = store
            .zones()
            .filter(|z| z.zone_type == ZoneType::Residential)
            .map(|z| z.id)
            .collect();
        for zone in residential_zones {
            let sensors = query
                .filter(EntityKind::Sensor, Predicate::InZone(zone))?
                .count();
            info!(zone = %zone, count = sensors, "Sensors in residential zone");

            match query.summarize(
                &SensorSelector::any()
                    .of_kind(SensorKind::AirQuality)
                    .in_zone(zone),
                TimeWindow::all(),
            ) {
                Ok(air) => info!(
                    zone = %zone,
                    readings = air.count,
                    mean = air.mean(),
                    max = air.max,
                    "Air quality in residential zone"
                ),
                Err(PlanError::EmptySelection) => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    let path = plan.save_snapshot(&config.snapshot.directory, config.snapshot.compress)?;
    info!(path = %path.display(), "urbanplan finished");

    Ok(())
}

/// Zones, buildings, a road and two sensors around Aalim College, with
/// readings over the last hour and a half
fn build_demonstration(store: &mut EntityStore, now: i64) -> urbanplan::Result<()> {
    store.add_zone(ZoneSpec::new(
        "Aalim Residential Area",
        ZoneType::Residential,
        vec![
            Coordinate::new(13.0010, 80.2500),
            Coordinate::new(13.0020, 80.2500),
            Coordinate::new(13.0020, 80.2520),
            Coordinate::new(13.0010, 80.2520),
        ],
    ))?;
    store.add_zone(ZoneSpec::new(
        "Aalim Commercial Hub",
        ZoneType::Commercial,
        vec![
            Coordinate::new(13.0030, 80.2530),
            Coordinate::new(13.0040, 80.2530),
            Coordinate::new(13.0040, 80.2550),
            Coordinate::new(13.0030, 80.2550),
        ],
    ))?;

    store.add_building(
        BuildingSpec::new(
            "Aalim Smart Apartments",
            ZoneType::Residential,
            FootprintSpec::Outline(vec![
                Coordinate::new(13.0012, 80.2505),
                Coordinate::new(13.0015, 80.2505),
                Coordinate::new(13.0015, 80.2510),
                Coordinate::new(13.0012, 80.2510),
            ]),
            45.0,
            15,
        )
        .with_attribute("year_built", serde_json::json!(2024)),
    )?;
    store.add_building(BuildingSpec::new(
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
    ))?;

    store.add_road(
        RoadSpec::new(
            "Aalim Main Avenue",
            vec![
                Coordinate::new(13.0010, 80.2510),
                Coordinate::new(13.0040, 80.2540),
            ],
            15.0,
            TrafficDirection::TwoWay,
        )
        .with_traffic_flow(150.0)
        .with_attribute("speed_limit", serde_json::json!(50)),
    )?;

    let traffic = store.add_sensor(
        SensorSpec::new(SensorKind::Traffic, Coordinate::new(13.0025, 80.2525))
            .with_attribute("metric", serde_json::json!("vehicle_count")),
    )?;
    let air = store.add_sensor(
        SensorSpec::new(SensorKind::AirQuality, Coordinate::new(13.0020, 80.2515))
            .with_attribute("metric", serde_json::json!("pm25")),
    )?;

    for (minutes_ago, vehicles) in [(90, 120.0), (45, 150.0), (20, 180.0), (5, 140.0)] {
        store.record_reading(&traffic, now - minutes_ago * 60, vehicles)?;
    }
    for (minutes_ago, pm25) in [(60, 38.0), (30, 35.0)] {
        store.record_reading(&air, now - minutes_ago * 60, pm25)?;
    }
    Ok(())
}
