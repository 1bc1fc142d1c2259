use crate::entity::{Building, EntityId, EntityKind, EntityRef, Road, Sensor, Zone};
use crate::index::Association;
use crate::plan::PlanMetadata;
use crate::store::EntityStore;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::info;

pub mod recovery;
mod restore;


pub const SNAPSHOT_VERSION: &str = "1";

/// One stored entity, tagged with its kind
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity", rename_all = "snake_case")]
pub enum SnapshotEntity {
    Zone(Zone),
    Building(Building),
    Road(Road),
    Sensor(Sensor),
}

impl SnapshotEntity {
    pub fn id(&self) -> EntityId {
        match self {
            SnapshotEntity::Zone(z) => z.id,
            SnapshotEntity::Building(b) => b.id,
            SnapshotEntity::Road(r) => r.id,
            SnapshotEntity::Sensor(s) => s.id,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            SnapshotEntity::Zone(_) => EntityKind::Zone,
            SnapshotEntity::Building(_) => EntityKind::Building,
            SnapshotEntity::Road(_) => EntityKind::Road,
            SnapshotEntity::Sensor(_) => EntityKind::Sensor,
        }
    }
}

impl From<EntityRef<'_>> for SnapshotEntity {
    fn from(entity: EntityRef<'_>) -> Self {
        match entity {
            EntityRef::Zone(z) => SnapshotEntity::Zone(z.clone()),
            EntityRef::Building(b) => SnapshotEntity::Building(b.clone()),
            EntityRef::Road(r) => SnapshotEntity::Road(r.clone()),
            EntityRef::Sensor(s) => SnapshotEntity::Sensor(s.clone()),
        }
    }
}

/// Complete state of one plan at a point in time
///
/// Entities appear in insertion order and associations are sorted, so two
/// snapshots of the same state serialize identically apart from `created_at`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlanSnapshot {
    /// Snapshot format version (for future schema evolution)
    pub snapshot_version: String,

    pub created_at: DateTime<Utc>,

    /// Owning plan, when the snapshot was taken through a `Plan`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<PlanMetadata>,

    pub entities: Vec<SnapshotEntity>,

    /// Derived zone associations at snapshot time, sorted by (entity, zone)
    #[serde(default)]
    pub associations: Vec<Association>,
}

impl PlanSnapshot {
    pub fn from_store(store: &EntityStore) -> Self {
        Self {
            snapshot_version: SNAPSHOT_VERSION.to_string(),
            created_at: Utc::now(),
            plan: None,
            entities: store.iter().map(SnapshotEntity::from).collect(),
            associations: store.index().associations(),
        }
    }

    pub fn with_plan(mut self, plan: PlanMetadata) -> Self {
        self.plan = Some(plan);
        self
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.entities.iter().filter(|e| e.kind() == kind).count()
    }

    /// Save snapshot as JSON, gzip-compressed when the path ends in `.gz`
    ///
    /// Writes to a `.tmp` sibling, fsyncs, then renames so a partial file is
    /// never observed at `path`.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .context("Failed to serialize snapshot to JSON")?;

        let tmp_path = path.with_extension("tmp");

        {
            let tmp_file = File::create(&tmp_path)
                .with_context(|| format!("Failed to create {}", tmp_path.display()))?;

            let file = if is_compressed(path) {
                let mut encoder = GzEncoder::new(tmp_file, Compression::default());
                encoder
                    .write_all(json.as_bytes())
                    .context("Failed to write compressed snapshot data")?;
                encoder.finish().context("Failed to finish compression")?
            } else {
                let mut file = tmp_file;
                file.write_all(json.as_bytes())
                    .context("Failed to write snapshot data")?;
                file
            };

            file.sync_all()
                .context("Failed to sync snapshot file to disk")?;
        }

        fs::rename(&tmp_path, path).context("Failed to rename temporary snapshot file")?;

        info!(
            path = %path.display(),
            entities = self.entity_count(),
            associations = self.associations.len(),
            "Snapshot saved"
        );
        Ok(())
    }

    /// Load a snapshot written by `save_to_file`, compressed or not
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open snapshot file {}", path.display()))?;

        let mut json = String::new();
        if is_compressed(path) {
            GzDecoder::new(file)
                .read_to_string(&mut json)
                .context("Failed to decompress snapshot file")?;
        } else {
            let mut file = file;
            file.read_to_string(&mut json)
                .context("Failed to read snapshot file")?;
        }

        let snapshot: PlanSnapshot =
            serde_json::from_str(&json).context("Failed to deserialize snapshot JSON")?;

        info!(
            path = %path.display(),
            entities = snapshot.entity_count(),
            "Snapshot loaded"
        );
        Ok(snapshot)
    }
}

fn is_compressed(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext == "gz")
        .unwrap_or(false)
}

/// Timestamped file path for a new snapshot
///
/// Format: snapshot-{timestamp}-{label}.json[.gz]
/// Example: snapshot-20260212T153045.123Z-aalim.json.gz
pub fn snapshot_path(directory: &Path, label: &str, compress: bool) -> PathBuf {
    let timestamp = Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
    let label: String = label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    let extension = if compress { "json.gz" } else { "json" };
    directory.join(format!("snapshot-{}-{}.{}", timestamp, label, extension))
}
