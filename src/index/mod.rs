use crate::entity::{EntityId, EntityKind, Zone};
use crate::geometry::{Coordinate, GeometryKernel};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};


/// Derived (entity, zone) pair: the zone's boundary contains the entity's reference point
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Association {
    pub entity_id: EntityId,
    pub zone_id: EntityId,
}

/// Point-located entity as seen by the index
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Located {
    pub kind: EntityKind,
    pub id: EntityId,
    pub point: Coordinate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct Member {
    kind: EntityKind,
    id: EntityId,
}

/// Zone associations of buildings and sensors, derived from geometry
///
/// Holds back-references only. Both directions are kept in step and no
/// empty set is ever stored, so two indexes over the same geometry compare
/// equal regardless of the order in which they were built.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RelationshipIndex {
    /// Located entity -> containing zones
    zones_of: HashMap<EntityId, BTreeSet<EntityId>>,
    /// Zone -> contained entities
    members: HashMap<EntityId, BTreeSet<Member>>,
}

impl RelationshipIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute every association from scratch
    pub fn rebuild<'a>(
        kernel: &GeometryKernel,
        zones: impl IntoIterator<Item = &'a Zone>,
        located: impl IntoIterator<Item = Located>,
    ) -> Self {
        let zones: Vec<&Zone> = zones.into_iter().collect();
        let mut index = Self::new();
        for entity in located {
            index.place(kernel, entity, zones.iter().copied());
        }
        index
    }

    /// Associate one entity with every zone containing its point
    ///
    /// Existing associations of the entity are dropped first.
    pub fn place<'a>(
        &mut self,
        kernel: &GeometryKernel,
        entity: Located,
        zones: impl IntoIterator<Item = &'a Zone>,
    ) -> usize {
        self.forget_entity(&entity.id);
        let mut count = 0;
        for zone in zones {
            if kernel.contains(&zone.boundary, entity.point) {
                self.associate(entity.kind, entity.id, zone.id);
                count += 1;
            }
        }
        count
    }

    /// Associate one zone with every entity whose point it contains
    ///
    /// Existing associations of the zone are dropped first.
    pub fn survey(
        &mut self,
        kernel: &GeometryKernel,
        zone: &Zone,
        located: impl IntoIterator<Item = Located>,
    ) -> usize {
        self.forget_zone(&zone.id);
        let mut count = 0;
        for entity in located {
            if kernel.contains(&zone.boundary, entity.point) {
                self.associate(entity.kind, entity.id, zone.id);
                count += 1;
            }
        }
        count
    }

    pub fn associate(&mut self, kind: EntityKind, entity_id: EntityId, zone_id: EntityId) {
        self.zones_of.entry(entity_id).or_default().insert(zone_id);
        self.members
            .entry(zone_id)
            .or_default()
            .insert(Member { kind, id: entity_id });
    }

    /// Drop all associations of a building or sensor
    pub fn forget_entity(&mut self, entity_id: &EntityId) -> usize {
        let Some(zones) = self.zones_of.remove(entity_id) else {
            return 0;
        };
        for zone_id in &zones {
            if let Some(members) = self.members.get_mut(zone_id) {
                members.retain(|m| m.id != *entity_id);
                if members.is_empty() {
                    self.members.remove(zone_id);
                }
            }
        }
        zones.len()
    }

    /// Drop all associations of a zone
    pub fn forget_zone(&mut self, zone_id: &EntityId) -> usize {
        let Some(members) = self.members.remove(zone_id) else {
            return 0;
        };
        for member in &members {
            if let Some(zones) = self.zones_of.get_mut(&member.id) {
                zones.remove(zone_id);
                if zones.is_empty() {
                    self.zones_of.remove(&member.id);
                }
            }
        }
        members.len()
    }

    /// Zones containing the entity; empty when unassociated or unknown
    pub fn zones_for(&self, entity_id: &EntityId) -> BTreeSet<EntityId> {
        self.zones_of.get(entity_id).cloned().unwrap_or_default()
    }

    pub fn is_in_zone(&self, entity_id: &EntityId, zone_id: &EntityId) -> bool {
        self.zones_of
            .get(entity_id)
            .is_some_and(|zones| zones.contains(zone_id))
    }

    /// Entities of one kind associated with the zone
    pub fn entities_in_zone(&self, zone_id: &EntityId, kind: EntityKind) -> BTreeSet<EntityId> {
        self.members
            .get(zone_id)
            .map(|members| {
                members
                    .iter()
                    .filter(|m| m.kind == kind)
                    .map(|m| m.id)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All pairs, sorted by (entity, zone)
    pub fn associations(&self) -> Vec<Association> {
        let mut pairs: Vec<Association> = self
            .zones_of
            .iter()
            .flat_map(|(entity_id, zones)| {
                zones.iter().map(move |zone_id| Association {
                    entity_id: *entity_id,
                    zone_id: *zone_id,
                })
            })
            .collect();
        pairs.sort();
        pairs
    }

    /// Number of (entity, zone) pairs
    pub fn len(&self) -> usize {
        self.zones_of.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.zones_of.is_empty()
    }
}
