use crate::geometry::{CoordinateBounds, GeometryKernel};
use anyhow::{ensure, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Complete urbanplan configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlanConfig {
    #[serde(default)]
    pub geometry: GeometryConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Coordinate range and containment tolerance for new plans
#[derive(Debug, Clone, Deserialize)]
pub struct GeometryConfig {
    #[serde(default = "default_min_latitude")]
    pub min_latitude: f64,
    #[serde(default = "default_max_latitude")]
    pub max_latitude: f64,
    #[serde(default = "default_min_longitude")]
    pub min_longitude: f64,
    #[serde(default = "default_max_longitude")]
    pub max_longitude: f64,
    /// Points within this distance of a zone edge count as inside
    #[serde(default = "default_boundary_tolerance")]
    pub boundary_tolerance: f64,
}

fn default_min_latitude() -> f64 {
    -90.0
}

fn default_max_latitude() -> f64 {
    90.0
}

fn default_min_longitude() -> f64 {
    -180.0
}

fn default_max_longitude() -> f64 {
    180.0
}

fn default_boundary_tolerance() -> f64 {
    1e-9
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            min_latitude: default_min_latitude(),
            max_latitude: default_max_latitude(),
            min_longitude: default_min_longitude(),
            max_longitude: default_max_longitude(),
            boundary_tolerance: default_boundary_tolerance(),
        }
    }
}

impl GeometryConfig {
    pub fn bounds(&self) -> CoordinateBounds {
        CoordinateBounds {
            min_latitude: self.min_latitude,
            max_latitude: self.max_latitude,
            min_longitude: self.min_longitude,
            max_longitude: self.max_longitude,
        }
    }

    pub fn kernel(&self) -> GeometryKernel {
        GeometryKernel::new(self.bounds(), self.boundary_tolerance)
    }
}

/// Where and how plan snapshots are written
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotConfig {
    #[serde(default = "default_snapshot_directory")]
    pub directory: PathBuf,
    /// gzip snapshot files
    #[serde(default = "default_compress")]
    pub compress: bool,
}

fn default_snapshot_directory() -> PathBuf {
    PathBuf::from("./snapshots")
}

fn default_compress() -> bool {
    true
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            directory: default_snapshot_directory(),
            compress: default_compress(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_filter() -> String {
    "urbanplan=info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl PlanConfig {
    /// Defaults with `URBANPLAN_*` environment overrides applied
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a variable lookup; unparseable values are ignored
    ///
    /// Recognized: URBANPLAN_SNAPSHOT_DIR, URBANPLAN_SNAPSHOT_COMPRESS,
    /// URBANPLAN_LOG_FILTER, URBANPLAN_BOUNDARY_TOLERANCE
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = lookup("URBANPLAN_SNAPSHOT_DIR") {
            self.snapshot.directory = PathBuf::from(v);
        }
        if let Some(v) = lookup("URBANPLAN_SNAPSHOT_COMPRESS") {
            if let Ok(b) = v.parse::<bool>() {
                self.snapshot.compress = b;
            }
        }
        if let Some(v) = lookup("URBANPLAN_LOG_FILTER") {
            self.logging.filter = v;
        }
        if let Some(v) = lookup("URBANPLAN_BOUNDARY_TOLERANCE") {
            if let Ok(t) = v.parse::<f64>() {
                self.geometry.boundary_tolerance = t;
            }
        }
        self
    }

    /// Reject bounds that cannot hold any coordinate
    pub fn validate(&self) -> Result<()> {
        let g = &self.geometry;
        ensure!(
            g.min_latitude < g.max_latitude,
            "geometry.min_latitude ({}) must be below max_latitude ({})",
            g.min_latitude,
            g.max_latitude
        );
        ensure!(
            g.min_longitude < g.max_longitude,
            "geometry.min_longitude ({}) must be below max_longitude ({})",
            g.min_longitude,
            g.max_longitude
        );
        ensure!(
            g.boundary_tolerance.is_finite() && g.boundary_tolerance >= 0.0,
            "geometry.boundary_tolerance must be finite and non-negative"
        );
        Ok(())
    }
}

/// Load and validate configuration from a TOML file
pub fn load_config(path: &Path) -> Result<PlanConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: PlanConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    config.validate()?;
    Ok(config)
}
