use crate::geometry::GeometryKernel;
use crate::plan::Plan;
use crate::snapshot::PlanSnapshot;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Load the most recent readable snapshot from a directory
///
/// Returns None if the directory is missing, holds no snapshots, or every
/// snapshot is corrupt.
pub fn load_latest_snapshot(snapshot_dir: &Path) -> Result<Option<(PathBuf, PlanSnapshot)>> {
    newest_usable(snapshot_dir, PlanSnapshot::load_from_file)
}

/// Restore the plan held by the newest snapshot that both loads and passes
/// validation against `kernel`
///
/// A snapshot that parses but no longer validates (for example after the
/// configured bounds were narrowed) is skipped like a corrupt one.
pub fn restore_latest_plan(
    snapshot_dir: &Path,
    kernel: &GeometryKernel,
) -> Result<Option<(PathBuf, Plan)>> {
    newest_usable(snapshot_dir, |path| {
        let snapshot = PlanSnapshot::load_from_file(path)?;
        let plan = Plan::from_snapshot(kernel.clone(), &snapshot)
            .with_context(|| format!("Snapshot {} failed validation", path.display()))?;
        Ok(plan)
    })
}

/// Snapshot files in a directory, newest first
///
/// The timestamp after the `snapshot-` prefix sorts lexicographically, so
/// reverse name order is reverse creation order.
pub fn list_snapshots(snapshot_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut snapshots = fs::read_dir(snapshot_dir)
        .with_context(|| format!("Failed to read snapshot directory {}", snapshot_dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()
        .context("Failed to read directory entry")?;

    snapshots.retain(|path| is_snapshot_file(path));
    snapshots.sort_unstable_by(|a, b| b.cmp(a));
    Ok(snapshots)
}

/// `snapshot-*.json` or `snapshot-*.json.gz`
fn is_snapshot_file(path: &Path) -> bool {
    path.is_file()
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| {
                name.starts_with("snapshot-")
                    && (name.ends_with(".json") || name.ends_with(".json.gz"))
            })
}

// First snapshot, newest to oldest, that `open` accepts
fn newest_usable<T>(
    snapshot_dir: &Path,
    mut open: impl FnMut(&Path) -> Result<T>,
) -> Result<Option<(PathBuf, T)>> {
    if !snapshot_dir.exists() {
        info!(
            directory = %snapshot_dir.display(),
            "Snapshot directory does not exist, starting empty"
        );
        return Ok(None);
    }

    let snapshots = list_snapshots(snapshot_dir)?;
    if snapshots.is_empty() {
        info!(directory = %snapshot_dir.display(), "No snapshots found");
        return Ok(None);
    }

    for path in snapshots {
        match open(&path) {
            Ok(value) => return Ok(Some((path, value))),
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %format!("{:#}", e),
                    "Unusable snapshot, trying next oldest"
                );
            }
        }
    }

    error!(directory = %snapshot_dir.display(), "No usable snapshot");
    Ok(None)
}
