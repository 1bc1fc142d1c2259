use crate::geometry::GeometryKernel;
use crate::snapshot::{snapshot_path, PlanSnapshot};
use crate::store::EntityStore;
use anyhow::Context;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::info;
use uuid::Uuid;


/// Descriptive fields of a plan, detached from its entities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanMetadata {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

/// One independent urban plan
///
/// Readers share the store; a writer holds it exclusively. Every mutation
/// on `EntityStore` is all-or-nothing, so a guard dropped by a panicking
/// thread never leaves a half-applied change and poisoning is ignored.
#[derive(Debug)]
pub struct Plan {
    id: Uuid,
    name: String,
    description: String,
    created_at: DateTime<Utc>,
    last_modified: RwLock<DateTime<Utc>>,
    store: RwLock<EntityStore>,
}

impl Plan {
    pub fn new(name: impl Into<String>, description: impl Into<String>, kernel: GeometryKernel) -> Self {
        Self::with_store(name, description, EntityStore::new(kernel))
    }

    pub fn with_store(
        name: impl Into<String>,
        description: impl Into<String>,
        store: EntityStore,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            description: description.into(),
            created_at: now,
            last_modified: RwLock::new(now),
            store: RwLock::new(store),
        }
    }

    /// Restore a plan, keeping its id and timestamps when the snapshot has them
    pub fn from_snapshot(kernel: GeometryKernel, snapshot: &PlanSnapshot) -> crate::Result<Self> {
        let store = EntityStore::from_snapshot(kernel, snapshot)?;
        let plan = match &snapshot.plan {
            Some(meta) => Self {
                id: meta.id,
                name: meta.name.clone(),
                description: meta.description.clone(),
                created_at: meta.created_at,
                last_modified: RwLock::new(meta.last_modified),
                store: RwLock::new(store),
            },
            None => Self::with_store("restored", "", store),
        };
        Ok(plan)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_modified(&self) -> DateTime<Utc> {
        *self
            .last_modified
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn metadata(&self) -> PlanMetadata {
        PlanMetadata {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            created_at: self.created_at,
            last_modified: self.last_modified(),
        }
    }

    /// Shared access for queries
    pub fn read(&self) -> RwLockReadGuard<'_, EntityStore> {
        self.store.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Exclusive access for mutations; marks the plan modified
    pub fn write(&self) -> RwLockWriteGuard<'_, EntityStore> {
        let guard = self.lock_store();
        self.touch();
        guard
    }

    /// Run one mutation under the exclusive lock
    ///
    /// The plan is marked modified only when `f` succeeds.
    pub fn update<T>(
        &self,
        f: impl FnOnce(&mut EntityStore) -> crate::Result<T>,
    ) -> crate::Result<T> {
        let mut store = self.lock_store();
        let value = f(&mut store)?;
        self.touch();
        Ok(value)
    }

    fn lock_store(&self) -> RwLockWriteGuard<'_, EntityStore> {
        self.store.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn touch(&self) {
        *self
            .last_modified
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Utc::now();
    }

    /// Consistent snapshot taken under the shared lock
    pub fn snapshot(&self) -> PlanSnapshot {
        let store = self.read();
        PlanSnapshot::from_store(&store).with_plan(self.metadata())
    }

    /// Write a timestamped snapshot into `directory`, creating it if needed
    pub fn save_snapshot(&self, directory: &Path, compress: bool) -> anyhow::Result<PathBuf> {
        std::fs::create_dir_all(directory).with_context(|| {
            format!("Failed to create snapshot directory {}", directory.display())
        })?;
        let path = snapshot_path(directory, &self.name, compress);
        self.snapshot().save_to_file(&path)?;
        Ok(path)
    }
}

/// Concurrent collection of independent plans keyed by id
pub struct PlanRegistry {
    plans: Arc<DashMap<Uuid, Arc<Plan>>>,
}

impl PlanRegistry {
    pub fn new() -> Self {
        Self {
            plans: Arc::new(DashMap::new()),
        }
    }

    /// Create and register an empty plan
    pub fn create(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
        kernel: GeometryKernel,
    ) -> Arc<Plan> {
        let plan = Arc::new(Plan::new(name, description, kernel));
        info!(plan_id = %plan.id(), name = plan.name(), "Plan created");
        self.plans.insert(plan.id(), Arc::clone(&plan));
        plan
    }

    /// Register an existing plan, returning any plan it replaced
    pub fn insert(&self, plan: Plan) -> Option<Arc<Plan>> {
        info!(plan_id = %plan.id(), name = plan.name(), "Plan registered");
        self.plans.insert(plan.id(), Arc::new(plan))
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<Plan>> {
        self.plans.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn remove(&self, id: &Uuid) -> Option<Arc<Plan>> {
        let removed = self.plans.remove(id).map(|(_, plan)| plan);
        if removed.is_some() {
            info!(plan_id = %id, "Plan removed");
        }
        removed
    }

    /// Metadata of every plan, oldest first
    pub fn list(&self) -> Vec<PlanMetadata> {
        let mut plans: Vec<PlanMetadata> = self
            .plans
            .iter()
            .map(|entry| entry.value().metadata())
            .collect();
        plans.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        plans
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }
}

impl Default for PlanRegistry {
    fn default() -> Self {
        Self::new()
    }
}
