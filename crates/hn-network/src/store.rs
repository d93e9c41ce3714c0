//! Flat keyed container for network entities.
//!
//! The Graph Store holds no business rules: it accepts any write so that the
//! Topology Manager can perform multi-step mutations before invariants are
//! re-checked. Nothing outside the Topology Manager should write to it.

use std::collections::BTreeMap;
use std::sync::Arc;

use hn_core::EntityId;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::entity::{CompanionLine, Entity, EntityRef, NetworkLink, NetworkNode};
use crate::error::{TopologyError, TopologyResult};

/// Authoritative in-memory network representation.
///
/// Entities are kept in ordered maps keyed by id, so iteration order depends
/// only on content and never on edit history.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphStore {
    nodes: BTreeMap<EntityId, NetworkNode>,
    links: BTreeMap<EntityId, NetworkLink>,
    companions: BTreeMap<EntityId, CompanionLine>,
    /// Bumped on every write; derived views compare it to detect staleness.
    revision: u64,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up any entity by id.
    pub fn get(&self, id: &str) -> TopologyResult<EntityRef<'_>> {
        if let Some(node) = self.nodes.get(id) {
            return Ok(EntityRef::Node(node));
        }
        if let Some(link) = self.links.get(id) {
            return Ok(EntityRef::Link(link));
        }
        if let Some(companion) = self.companions.get(id) {
            return Ok(EntityRef::Companion(companion));
        }
        Err(TopologyError::not_found(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id) || self.links.contains_key(id) || self.companions.contains_key(id)
    }

    /// Insert or replace an entity, returning the previous value with the same id and kind.
    pub fn upsert(&mut self, entity: Entity) -> Option<Entity> {
        self.revision += 1;
        match entity {
            Entity::Node(node) => self.nodes.insert(node.id.clone(), node).map(Entity::Node),
            Entity::Link(link) => self.links.insert(link.id.clone(), link).map(Entity::Link),
            Entity::Companion(c) => self.companions.insert(c.id.clone(), c).map(Entity::Companion),
        }
    }

    /// Remove an entity by id, whatever its kind.
    pub fn remove(&mut self, id: &str) -> Option<Entity> {
        let removed = self
            .nodes
            .remove(id)
            .map(Entity::Node)
            .or_else(|| self.links.remove(id).map(Entity::Link))
            .or_else(|| self.companions.remove(id).map(Entity::Companion));
        if removed.is_some() {
            self.revision += 1;
        }
        removed
    }

    pub fn node(&self, id: &str) -> Option<&NetworkNode> {
        self.nodes.get(id)
    }

    pub fn link(&self, id: &str) -> Option<&NetworkLink> {
        self.links.get(id)
    }

    pub fn companion(&self, id: &str) -> Option<&CompanionLine> {
        self.companions.get(id)
    }

    /// Mutable node access. Counts as a write.
    pub fn node_mut(&mut self, id: &str) -> Option<&mut NetworkNode> {
        let node = self.nodes.get_mut(id)?;
        self.revision += 1;
        Some(node)
    }

    /// Mutable link access. Counts as a write.
    pub fn link_mut(&mut self, id: &str) -> Option<&mut NetworkLink> {
        let link = self.links.get_mut(id)?;
        self.revision += 1;
        Some(link)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NetworkNode> {
        self.nodes.values()
    }

    pub fn links(&self) -> impl Iterator<Item = &NetworkLink> {
        self.links.values()
    }

    pub fn companions(&self) -> impl Iterator<Item = &CompanionLine> {
        self.companions.values()
    }

    pub(crate) fn nodes_mut(&mut self) -> impl Iterator<Item = &mut NetworkNode> {
        self.revision += 1;
        self.nodes.values_mut()
    }

    /// Companion ids owned by `owner_id`.
    pub fn companions_of(&self, owner_id: &str) -> Vec<EntityId> {
        self.companions
            .values()
            .filter(|c| c.owner_id.as_str() == owner_id)
            .map(|c| c.id.clone())
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.links.is_empty() && self.companions.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }
}

/// Shared handle to one Graph Store instance.
///
/// This is the unit of dependency injection: the same handle is passed to
/// every manager that needs the store. Writers hold the write lock for the
/// full duration of an operation, so readers never see a half-applied edit.
#[derive(Debug, Clone, Default)]
pub struct StoreHandle(Arc<RwLock<GraphStore>>);

impl StoreHandle {
    pub fn new(store: GraphStore) -> Self {
        Self(Arc::new(RwLock::new(store)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, GraphStore> {
        self.0.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, GraphStore> {
        self.0.write()
    }

    /// Immutable copy of the current store, detached from later edits.
    pub fn snapshot(&self) -> GraphStore {
        self.0.read().clone()
    }

    pub fn revision(&self) -> u64 {
        self.0.read().revision()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Coordinate, NodeKind};

    fn node(id: &str) -> NetworkNode {
        NetworkNode::new(
            EntityId::new(id).unwrap(),
            NodeKind::junction(0.0),
            Coordinate::default(),
            0.0,
        )
    }

    #[test]
    fn get_missing_is_not_found() {
        let store = GraphStore::new();
        assert_eq!(
            store.get("J1").unwrap_err(),
            TopologyError::NotFound { id: "J1".into() }
        );
    }

    #[test]
    fn upsert_and_remove_bump_revision() {
        let mut store = GraphStore::new();
        assert_eq!(store.revision(), 0);
        assert!(store.upsert(Entity::Node(node("J1"))).is_none());
        assert_eq!(store.revision(), 1);
        assert!(matches!(store.get("J1"), Ok(EntityRef::Node(_))));

        assert!(store.remove("J1").is_some());
        assert_eq!(store.revision(), 2);
        // Removing something absent is not a write
        assert!(store.remove("J1").is_none());
        assert_eq!(store.revision(), 2);
    }

    #[test]
    fn snapshot_is_detached() {
        let handle = StoreHandle::default();
        handle.write().upsert(Entity::Node(node("J1")));
        let snap = handle.snapshot();
        handle.write().remove("J1");
        assert!(snap.node("J1").is_some());
        assert!(handle.read().node("J1").is_none());
    }
}
