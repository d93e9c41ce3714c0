//! Topology Manager: the only sanctioned writer of the Graph Store.
//!
//! Every public operation takes the store's write lock for its full duration
//! and validates before it mutates, so a failed call leaves the store exactly
//! as it was and a successful one leaves every connectivity invariant intact.

use hn_core::{EntityId, IdAllocator, LinkId, NodeId};
use indexmap::IndexSet;
use tracing::{debug, info, warn};

use crate::entity::{
    CompanionLine, Coordinate, Entity, EntityKind, EntityRef, LinkKind, LinkStatus, NetworkLink,
    NetworkNode, NodeKind,
};
use crate::error::{TopologyError, TopologyResult};
use crate::selection::Selection;
use crate::store::{GraphStore, StoreHandle};

/// Read-only description of what deleting an entity would remove.
#[derive(Debug, Clone, PartialEq)]
pub struct CascadePreview {
    pub target: EntityId,
    pub target_kind: EntityKind,
    /// Links that would be removed along with the target (nodes only).
    pub link_ids: Vec<LinkId>,
}

impl CascadePreview {
    pub fn cascades(&self) -> bool {
        !self.link_ids.is_empty()
    }

    pub fn link_count(&self) -> usize {
        self.link_ids.len()
    }
}

/// Enforces connectivity invariants on every network edit.
#[derive(Debug)]
pub struct TopologyManager {
    store: StoreHandle,
    ids: IdAllocator,
    selection: Selection,
}

impl TopologyManager {
    /// Create a manager over `store`. Every id already in the store is
    /// registered as spent so it will never be allocated again.
    pub fn new(store: StoreHandle) -> Self {
        let mut ids = IdAllocator::new();
        {
            let guard = store.read();
            for node in guard.nodes() {
                ids.claim(&node.id);
            }
            for link in guard.links() {
                ids.claim(&link.id);
            }
            for companion in guard.companions() {
                ids.claim(&companion.id);
            }
        }
        Self {
            store,
            ids,
            selection: Selection::new(),
        }
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    /// True if `id` was issued or imported at any point in this session.
    pub fn is_id_spent(&self, id: &str) -> bool {
        self.ids.is_spent(id)
    }

    // ------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------

    /// Place a new node with an allocated id.
    pub fn add_node(
        &mut self,
        kind: NodeKind,
        position: Coordinate,
        elevation: f64,
    ) -> TopologyResult<NodeId> {
        check_position(position)?;
        if !elevation.is_finite() {
            return Err(TopologyError::invalid("elevation must be finite"));
        }
        let id = self.ids.next(kind.id_prefix());
        let node = NetworkNode::new(id.clone(), kind, position, elevation);
        self.store.write().upsert(Entity::Node(node));
        debug!(node = %id, "node added");
        Ok(id)
    }

    /// Insert a node with a caller-supplied id (network import).
    ///
    /// Any `connected_links` on the input are discarded; connectivity is
    /// derived from the links inserted afterwards.
    pub fn insert_node(&mut self, mut node: NetworkNode) -> TopologyResult<()> {
        check_position(node.position)?;
        if self.ids.is_spent(&node.id) {
            return Err(TopologyError::invalid(format!(
                "id {} was already used in this session",
                node.id
            )));
        }
        self.ids.claim(&node.id);
        node.connected_links = IndexSet::new();
        self.store.write().upsert(Entity::Node(node));
        Ok(())
    }

    /// Draw a new link between two existing nodes with an allocated id.
    ///
    /// `interior` holds the bend points between the two node positions.
    pub fn add_link(
        &mut self,
        kind: LinkKind,
        start: &str,
        end: &str,
        interior: Vec<Coordinate>,
    ) -> TopologyResult<LinkId> {
        self.add_link_inner(kind, start, end, interior, false)
    }

    /// Like [`Self::add_link`] but flagged as a transient preview.
    pub fn add_preview_link(
        &mut self,
        kind: LinkKind,
        start: &str,
        end: &str,
        interior: Vec<Coordinate>,
    ) -> TopologyResult<LinkId> {
        self.add_link_inner(kind, start, end, interior, true)
    }

    fn add_link_inner(
        &mut self,
        kind: LinkKind,
        start: &str,
        end: &str,
        interior: Vec<Coordinate>,
        preview: bool,
    ) -> TopologyResult<LinkId> {
        let mut store = self.store.write();
        let (start_pos, end_pos) = endpoint_positions(&store, start, end)?;
        for c in &interior {
            check_position(*c)?;
        }
        let id = self.ids.next(kind.id_prefix());
        let mut geometry = Vec::with_capacity(interior.len() + 2);
        geometry.push(start_pos);
        geometry.extend(interior);
        geometry.push(end_pos);

        let link = NetworkLink {
            id: id.clone(),
            kind,
            start_node_id: EntityId::new(start)?,
            end_node_id: EntityId::new(end)?,
            geometry,
            status: LinkStatus::Open,
            preview,
        };
        attach_link(&mut store, link);
        debug!(link = %id, start, end, preview, "link added");
        Ok(id)
    }

    /// Insert a link with a caller-supplied id (network import).
    ///
    /// Geometry ends are snapped onto the endpoint node positions.
    pub fn insert_link(&mut self, mut link: NetworkLink) -> TopologyResult<()> {
        let mut store = self.store.write();
        let (start_pos, end_pos) =
            endpoint_positions(&store, &link.start_node_id, &link.end_node_id)?;
        if self.ids.is_spent(&link.id) {
            return Err(TopologyError::invalid(format!(
                "id {} was already used in this session",
                link.id
            )));
        }
        for c in &link.geometry {
            check_position(*c)?;
        }
        self.ids.claim(&link.id);
        if link.geometry.len() < 2 {
            link.geometry = vec![start_pos, end_pos];
        } else {
            let last = link.geometry.len() - 1;
            link.geometry[0] = start_pos;
            link.geometry[last] = end_pos;
        }
        attach_link(&mut store, link);
        Ok(())
    }

    /// Turn a preview link into a regular one.
    pub fn commit_preview(&mut self, id: &str) -> TopologyResult<()> {
        let mut store = self.store.write();
        let link = store.link_mut(id).ok_or_else(|| TopologyError::not_found(id))?;
        link.preview = false;
        Ok(())
    }

    /// Attach a visual-only companion line to an existing node or link.
    pub fn attach_companion(
        &mut self,
        owner: &str,
        geometry: Vec<Coordinate>,
    ) -> TopologyResult<EntityId> {
        let mut store = self.store.write();
        match store.get(owner)? {
            EntityRef::Node(_) | EntityRef::Link(_) => {}
            EntityRef::Companion(_) => {
                return Err(TopologyError::invalid("companions cannot own companions"));
            }
        }
        let id = self.ids.next("AUX");
        store.upsert(Entity::Companion(CompanionLine {
            id: id.clone(),
            owner_id: EntityId::new(owner)?,
            geometry,
        }));
        Ok(id)
    }

    // ------------------------------------------------------------------
    // Deletion
    // ------------------------------------------------------------------

    /// Report what deleting `id` would remove, without touching the store.
    pub fn cascade_preview(&self, id: &str) -> TopologyResult<CascadePreview> {
        let store = self.store.read();
        let entity = store.get(id)?;
        let (target, link_ids) = match entity {
            EntityRef::Node(node) => (
                node.id.clone(),
                node.connected_links.iter().cloned().collect(),
            ),
            EntityRef::Link(link) => (link.id.clone(), Vec::new()),
            EntityRef::Companion(c) => (c.id.clone(), Vec::new()),
        };
        Ok(CascadePreview {
            target,
            target_kind: entity.kind(),
            link_ids,
        })
    }

    /// Delete a node and every link incident to it.
    ///
    /// Returns the deleted ids: cascaded links first, then the node.
    pub fn delete_node(&mut self, id: &str) -> TopologyResult<Vec<EntityId>> {
        let deleted = {
            let mut store = self.store.write();
            if store.node(id).is_none() {
                return Err(TopologyError::not_found(id));
            }
            cascade_delete_node(&mut store, id)
        };
        self.after_delete(&deleted);
        info!(node = id, removed = deleted.len(), "node deleted");
        Ok(deleted)
    }

    /// Delete a link, detaching it from both endpoints. Nodes left isolated are kept.
    pub fn delete_link(&mut self, id: &str) -> TopologyResult<Vec<EntityId>> {
        let deleted = {
            let mut store = self.store.write();
            let link = detach_and_remove_link(&mut store, id)
                .ok_or_else(|| TopologyError::not_found(id))?;
            for endpoint in [&link.start_node_id, &link.end_node_id] {
                if store.node(endpoint).is_some_and(NetworkNode::is_isolated) {
                    warn!(node = %endpoint, "node left isolated by link deletion");
                }
            }
            vec![link.id]
        };
        self.after_delete(&deleted);
        info!(link = id, "link deleted");
        Ok(deleted)
    }

    /// Delete several entities in order.
    ///
    /// The list need not be cascade-closed: ids already removed by an earlier
    /// cascade in the same batch are skipped, as are ids not in the store.
    pub fn delete_many<S: AsRef<str>>(&mut self, ids: &[S]) -> Vec<EntityId> {
        let mut deleted = Vec::new();
        {
            let mut store = self.store.write();
            for id in ids {
                let id = id.as_ref();
                if store.node(id).is_some() {
                    deleted.extend(cascade_delete_node(&mut store, id));
                } else if let Some(link) = detach_and_remove_link(&mut store, id) {
                    deleted.push(link.id);
                } else if let Some(Entity::Companion(c)) = store.remove(id) {
                    deleted.push(c.id);
                } else {
                    debug!(id, "delete_many skipped absent id");
                }
            }
        }
        self.after_delete(&deleted);
        info!(requested = ids.len(), removed = deleted.len(), "batch delete");
        deleted
    }

    fn after_delete(&mut self, deleted: &[EntityId]) {
        if self.selection.references_any(deleted) {
            self.selection.clear();
        }
    }

    // ------------------------------------------------------------------
    // Reconnection and geometry
    // ------------------------------------------------------------------

    /// Move one or both endpoints of a link to other existing nodes.
    pub fn reconnect_link(
        &mut self,
        id: &str,
        new_start: Option<&str>,
        new_end: Option<&str>,
    ) -> TopologyResult<()> {
        let mut store = self.store.write();
        let link = store.link(id).ok_or_else(|| TopologyError::not_found(id))?;
        let old_start = link.start_node_id.clone();
        let old_end = link.end_node_id.clone();
        let start = new_start.unwrap_or(old_start.as_str()).to_string();
        let end = new_end.unwrap_or(old_end.as_str()).to_string();
        let (start_pos, end_pos) = endpoint_positions(&store, &start, &end)?;
        let start = EntityId::new(start)?;
        let end = EntityId::new(end)?;

        // Detach from both old ends before attaching, so swaps stay consistent
        for old in [&old_start, &old_end] {
            if let Some(node) = store.node_mut(old) {
                node.connected_links.shift_remove(id);
            }
        }
        let link_id = {
            let link = store.link_mut(id).ok_or_else(|| TopologyError::not_found(id))?;
            link.start_node_id = start.clone();
            link.end_node_id = end.clone();
            let last = link.geometry.len() - 1;
            link.geometry[0] = start_pos;
            link.geometry[last] = end_pos;
            link.id.clone()
        };
        for new in [&start, &end] {
            if let Some(node) = store.node_mut(new) {
                node.connected_links.insert(link_id.clone());
            }
        }
        info!(link = id, from = %old_start, to = %old_end, start = %start, end = %end, "link reconnected");
        Ok(())
    }

    /// Move a node, dragging the matching end of every incident link.
    pub fn move_node(&mut self, id: &str, position: Coordinate) -> TopologyResult<()> {
        check_position(position)?;
        let mut store = self.store.write();
        let node = store.node_mut(id).ok_or_else(|| TopologyError::not_found(id))?;
        node.position = position;
        let incident: Vec<LinkId> = node.connected_links.iter().cloned().collect();
        for link_id in incident {
            if let Some(link) = store.link_mut(&link_id) {
                let last = link.geometry.len() - 1;
                if link.start_node_id.as_str() == id {
                    link.geometry[0] = position;
                }
                if link.end_node_id.as_str() == id {
                    link.geometry[last] = position;
                }
            }
        }
        Ok(())
    }

    /// Swap a link's endpoints and reverse its geometry.
    pub fn reverse_link(&mut self, id: &str) -> TopologyResult<()> {
        let mut store = self.store.write();
        let link = store.link_mut(id).ok_or_else(|| TopologyError::not_found(id))?;
        std::mem::swap(&mut link.start_node_id, &mut link.end_node_id);
        link.geometry.reverse();
        Ok(())
    }

    /// Insert a junction into a pipe at the geometry point nearest `position`.
    ///
    /// The original pipe keeps its id and now ends at the new junction; a new
    /// pipe continues to the original end node. Length is split in proportion
    /// to drawn geometry. A split point that lands on either end node is an
    /// `InvalidTopology` error, since one half would have zero length.
    pub fn split_link(
        &mut self,
        id: &str,
        position: Coordinate,
    ) -> TopologyResult<(NodeId, LinkId)> {
        check_position(position)?;
        let mut store = self.store.write();
        let link = store.link(id).ok_or_else(|| TopologyError::not_found(id))?.clone();
        let LinkKind::Pipe {
            length,
            diameter,
            roughness,
            minor_loss,
            check_valve,
        } = link.kind
        else {
            return Err(TopologyError::invalid(format!(
                "only pipes can be split, {} is a {}",
                link.id,
                link.kind.label()
            )));
        };

        let (segment, t) = nearest_segment(&link.geometry, position);
        let split_at = link.geometry[segment].lerp(link.geometry[segment + 1], t);
        let mut head: Vec<Coordinate> = link.geometry[..=segment].to_vec();
        head.push(split_at);
        let mut tail = vec![split_at];
        tail.extend_from_slice(&link.geometry[segment + 1..]);

        let drawn = link.geometric_length();
        let fraction = if drawn > 0.0 {
            head.windows(2).map(|w| w[0].distance(w[1])).sum::<f64>() / drawn
        } else {
            0.5
        };
        if fraction <= f64::EPSILON || fraction >= 1.0 - f64::EPSILON {
            return Err(TopologyError::invalid(format!(
                "split point of {id} lands on an endpoint"
            )));
        }

        let elevation = {
            let a = store.node(&link.start_node_id).map_or(0.0, |n| n.elevation);
            let b = store.node(&link.end_node_id).map_or(0.0, |n| n.elevation);
            a + (b - a) * fraction
        };

        let node_id = self.ids.next("J");
        let new_link_id = self.ids.next("P");
        store.upsert(Entity::Node(NetworkNode::new(
            node_id.clone(),
            NodeKind::junction(0.0),
            split_at,
            elevation,
        )));

        if let Some(end_node) = store.node_mut(&link.end_node_id) {
            end_node.connected_links.shift_remove(id);
        }
        if let Some(original) = store.link_mut(id) {
            original.end_node_id = node_id.clone();
            original.geometry = head;
            original.kind = LinkKind::Pipe {
                length: length * fraction,
                diameter,
                roughness,
                minor_loss,
                check_valve,
            };
        }
        if let Some(new_node) = store.node_mut(&node_id) {
            new_node.connected_links.insert(link.id.clone());
        }
        attach_link(
            &mut store,
            NetworkLink {
                id: new_link_id.clone(),
                kind: LinkKind::Pipe {
                    length: length * (1.0 - fraction),
                    diameter,
                    roughness,
                    minor_loss: 0.0,
                    check_valve: false,
                },
                start_node_id: node_id.clone(),
                end_node_id: link.end_node_id.clone(),
                geometry: tail,
                status: link.status,
                preview: false,
            },
        );
        info!(link = id, node = %node_id, new_link = %new_link_id, "pipe split");
        Ok((node_id, new_link_id))
    }

    /// Insert an interior vertex before position `index` (1..=len-1).
    pub fn insert_vertex(
        &mut self,
        link_id: &str,
        index: usize,
        position: Coordinate,
    ) -> TopologyResult<()> {
        check_position(position)?;
        let mut store = self.store.write();
        let link = store
            .link_mut(link_id)
            .ok_or_else(|| TopologyError::not_found(link_id))?;
        if index == 0 || index >= link.geometry.len() {
            return Err(TopologyError::invalid(format!(
                "vertex insert index {index} outside interior of {link_id}"
            )));
        }
        link.geometry.insert(index, position);
        Ok(())
    }

    /// Move an interior vertex. Endpoints follow their nodes and cannot be moved here.
    pub fn move_vertex(
        &mut self,
        link_id: &str,
        index: usize,
        position: Coordinate,
    ) -> TopologyResult<()> {
        check_position(position)?;
        let mut store = self.store.write();
        let link = store
            .link_mut(link_id)
            .ok_or_else(|| TopologyError::not_found(link_id))?;
        check_interior(link, index)?;
        link.geometry[index] = position;
        Ok(())
    }

    /// Remove an interior vertex.
    pub fn remove_vertex(&mut self, link_id: &str, index: usize) -> TopologyResult<Coordinate> {
        let mut store = self.store.write();
        let link = store
            .link_mut(link_id)
            .ok_or_else(|| TopologyError::not_found(link_id))?;
        check_interior(link, index)?;
        Ok(link.geometry.remove(index))
    }

    // ------------------------------------------------------------------
    // Attribute edits
    // ------------------------------------------------------------------

    pub fn set_link_status(&mut self, id: &str, status: LinkStatus) -> TopologyResult<()> {
        let mut store = self.store.write();
        let link = store.link_mut(id).ok_or_else(|| TopologyError::not_found(id))?;
        link.status = status;
        Ok(())
    }

    pub fn set_elevation(&mut self, id: &str, elevation: f64) -> TopologyResult<()> {
        if !elevation.is_finite() {
            return Err(TopologyError::invalid("elevation must be finite"));
        }
        let mut store = self.store.write();
        let node = store.node_mut(id).ok_or_else(|| TopologyError::not_found(id))?;
        node.elevation = elevation;
        Ok(())
    }

    /// Replace a node's subtype attributes. The id is kept even if the subtype changes.
    pub fn update_node_kind(&mut self, id: &str, kind: NodeKind) -> TopologyResult<()> {
        let mut store = self.store.write();
        let node = store.node_mut(id).ok_or_else(|| TopologyError::not_found(id))?;
        node.kind = kind;
        Ok(())
    }

    /// Replace a link's subtype attributes. The id is kept even if the subtype changes.
    pub fn update_link_kind(&mut self, id: &str, kind: LinkKind) -> TopologyResult<()> {
        let mut store = self.store.write();
        let link = store.link_mut(id).ok_or_else(|| TopologyError::not_found(id))?;
        link.kind = kind;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Queries and selection
    // ------------------------------------------------------------------

    /// Nodes with no incident links. Reported for the caller to surface; never auto-deleted.
    pub fn isolated_nodes(&self) -> Vec<NodeId> {
        self.store
            .read()
            .nodes()
            .filter(|n| n.is_isolated())
            .map(|n| n.id.clone())
            .collect()
    }

    pub fn select(&mut self, id: &str) -> TopologyResult<()> {
        let store = self.store.read();
        let entity = store.get(id)?;
        let id = match entity {
            EntityRef::Node(n) => n.id.clone(),
            EntityRef::Link(l) => l.id.clone(),
            EntityRef::Companion(c) => c.id.clone(),
        };
        self.selection.add(id);
        Ok(())
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }
}

/// Recompute every node's `connected_links` from link endpoints.
///
/// Used when a store is rebuilt from an external representation whose
/// persisted connectivity cannot be trusted.
pub fn rebuild_connectivity(store: &mut GraphStore) -> TopologyResult<()> {
    let mut incidence: Vec<(NodeId, LinkId)> = Vec::new();
    for link in store.links() {
        for endpoint in [&link.start_node_id, &link.end_node_id] {
            if store.node(endpoint).is_none() {
                return Err(TopologyError::invalid(format!(
                    "link {} references missing node {}",
                    link.id, endpoint
                )));
            }
            incidence.push((endpoint.clone(), link.id.clone()));
        }
    }
    for node in store.nodes_mut() {
        node.connected_links.clear();
    }
    for (node_id, link_id) in incidence {
        if let Some(node) = store.node_mut(&node_id) {
            node.connected_links.insert(link_id);
        }
    }
    Ok(())
}

fn check_position(c: Coordinate) -> TopologyResult<()> {
    if c.is_finite() {
        Ok(())
    } else {
        Err(TopologyError::invalid("coordinates must be finite"))
    }
}

fn check_interior(link: &NetworkLink, index: usize) -> TopologyResult<()> {
    if index == 0 || index + 1 >= link.geometry.len() {
        return Err(TopologyError::invalid(format!(
            "vertex {} of {} is not an interior vertex",
            index, link.id
        )));
    }
    Ok(())
}

/// Positions of two distinct, existing endpoint nodes.
fn endpoint_positions(
    store: &GraphStore,
    start: &str,
    end: &str,
) -> TopologyResult<(Coordinate, Coordinate)> {
    if start == end {
        return Err(TopologyError::invalid(format!(
            "link cannot start and end at the same node {start}"
        )));
    }
    let lookup = |id: &str| {
        store
            .node(id)
            .map(|n| n.position)
            .ok_or_else(|| TopologyError::invalid(format!("endpoint node {id} does not exist")))
    };
    Ok((lookup(start)?, lookup(end)?))
}

/// Store a link and register it with both endpoints.
fn attach_link(store: &mut GraphStore, link: NetworkLink) {
    let id = link.id.clone();
    let endpoints = [link.start_node_id.clone(), link.end_node_id.clone()];
    store.upsert(Entity::Link(link));
    for endpoint in endpoints {
        if let Some(node) = store.node_mut(&endpoint) {
            node.connected_links.insert(id.clone());
        }
    }
}

/// Remove companions owned by `owner_id`. Runs while the owner still exists.
fn remove_companions(store: &mut GraphStore, owner_id: &str) {
    for companion in store.companions_of(owner_id) {
        store.remove(&companion);
    }
}

/// Remove a link and strip it from both endpoints that are still present.
fn detach_and_remove_link(store: &mut GraphStore, id: &str) -> Option<NetworkLink> {
    store.link(id)?;
    remove_companions(store, id);
    let Some(Entity::Link(link)) = store.remove(id) else {
        return None;
    };
    for endpoint in [&link.start_node_id, &link.end_node_id] {
        if let Some(node) = store.node_mut(endpoint) {
            node.connected_links.shift_remove(id);
        }
    }
    Some(link)
}

/// Remove a node, its incident links and all their companions.
fn cascade_delete_node(store: &mut GraphStore, id: &str) -> Vec<EntityId> {
    let cascade: Vec<LinkId> = store
        .node(id)
        .map(|n| n.connected_links.iter().cloned().collect())
        .unwrap_or_default();
    let mut deleted = Vec::with_capacity(cascade.len() + 1);
    for link_id in cascade {
        if let Some(link) = detach_and_remove_link(store, &link_id) {
            deleted.push(link.id);
        }
    }
    remove_companions(store, id);
    if let Some(removed) = store.remove(id) {
        deleted.push(removed.id().clone());
    }
    deleted
}

/// Segment index and parameter of the point on `geometry` nearest `p`.
fn nearest_segment(geometry: &[Coordinate], p: Coordinate) -> (usize, f64) {
    let mut best = (0, 0.5, f64::INFINITY);
    for (i, w) in geometry.windows(2).enumerate() {
        let (a, b) = (w[0], w[1]);
        let (dx, dy) = (b.x - a.x, b.y - a.y);
        let len2 = dx * dx + dy * dy;
        let t = if len2 > 0.0 {
            (((p.x - a.x) * dx + (p.y - a.y) * dy) / len2).clamp(0.0, 1.0)
        } else {
            0.5
        };
        let d = a.lerp(b, t).distance(p);
        if d < best.2 {
            best = (i, t, d);
        }
    }
    (best.0, best.1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::check_invariants;

    fn two_junctions() -> (TopologyManager, NodeId, NodeId, LinkId) {
        let mut topo = TopologyManager::new(StoreHandle::default());
        let j1 = topo
            .add_node(NodeKind::junction(0.0), Coordinate::new(0.0, 0.0), 100.0)
            .unwrap();
        let j2 = topo
            .add_node(NodeKind::junction(0.0), Coordinate::new(10.0, 0.0), 80.0)
            .unwrap();
        let p1 = topo
            .add_link(LinkKind::default_pipe(), &j1, &j2, vec![])
            .unwrap();
        (topo, j1, j2, p1)
    }

    #[test]
    fn add_link_registers_both_ends() {
        let (topo, j1, j2, p1) = two_junctions();
        let store = topo.store().read();
        assert!(store.node(&j1).unwrap().connected_links.contains(&p1));
        assert!(store.node(&j2).unwrap().connected_links.contains(&p1));
        assert_eq!(store.link(&p1).unwrap().geometry.len(), 2);
        check_invariants(&store).unwrap();
    }

    #[test]
    fn add_link_rejects_self_loop_and_missing_node() {
        let (mut topo, j1, _, _) = two_junctions();
        let before = topo.store().snapshot();
        assert!(matches!(
            topo.add_link(LinkKind::default_pipe(), &j1, &j1, vec![]),
            Err(TopologyError::InvalidTopology { .. })
        ));
        assert!(matches!(
            topo.add_link(LinkKind::default_pipe(), &j1, "J99", vec![]),
            Err(TopologyError::InvalidTopology { .. })
        ));
        assert_eq!(topo.store().snapshot(), before);
    }

    #[test]
    fn delete_node_cascades() {
        let (mut topo, j1, j2, p1) = two_junctions();
        let deleted = topo.delete_node(&j1).unwrap();
        assert_eq!(deleted, vec![p1.clone(), j1.clone()]);
        let store = topo.store().read();
        assert!(store.link(&p1).is_none());
        assert!(store.node(&j2).unwrap().connected_links.is_empty());
        check_invariants(&store).unwrap();
    }

    #[test]
    fn delete_missing_node_is_not_found() {
        let (mut topo, _, _, p1) = two_junctions();
        assert_eq!(
            topo.delete_node("J42").unwrap_err(),
            TopologyError::NotFound { id: "J42".into() }
        );
        // A link id is not a node
        assert!(topo.delete_node(&p1).is_err());
    }

    #[test]
    fn delete_link_keeps_isolated_nodes() {
        let (mut topo, j1, j2, p1) = two_junctions();
        topo.delete_link(&p1).unwrap();
        let mut isolated = topo.isolated_nodes();
        isolated.sort();
        assert_eq!(isolated, vec![j1, j2]);
    }

    #[test]
    fn preview_counts_links_without_mutating() {
        let (topo, j1, _, p1) = two_junctions();
        let rev = topo.store().revision();
        let preview = topo.cascade_preview(&j1).unwrap();
        assert!(preview.cascades());
        assert_eq!(preview.link_ids, vec![p1.clone()]);
        assert_eq!(topo.store().revision(), rev);

        let link_preview = topo.cascade_preview(&p1).unwrap();
        assert_eq!(link_preview.target_kind, EntityKind::Link);
        assert!(!link_preview.cascades());
    }

    #[test]
    fn deletion_clears_selection_referencing_deleted_ids() {
        let (mut topo, j1, j2, p1) = two_junctions();
        topo.select(&p1).unwrap();
        topo.select(&j2).unwrap();
        topo.delete_node(&j1).unwrap();
        assert!(topo.selection().is_empty());
    }

    #[test]
    fn unrelated_deletion_keeps_selection() {
        let (mut topo, _, j2, _) = two_junctions();
        let j3 = topo
            .add_node(NodeKind::junction(0.0), Coordinate::new(5.0, 5.0), 0.0)
            .unwrap();
        topo.select(&j2).unwrap();
        topo.delete_node(&j3).unwrap();
        assert!(topo.selection().contains(&j2));
    }

    #[test]
    fn companions_removed_with_owner() {
        let (mut topo, j1, _, p1) = two_junctions();
        let aux = topo
            .attach_companion(&p1, vec![Coordinate::new(1.0, 1.0), Coordinate::new(2.0, 2.0)])
            .unwrap();
        let deleted = topo.delete_node(&j1).unwrap();
        assert!(!deleted.contains(&aux));
        assert!(topo.store().read().companion(&aux).is_none());
    }

    #[test]
    fn reconnect_moves_connectivity() {
        let (mut topo, j1, j2, p1) = two_junctions();
        let j3 = topo
            .add_node(NodeKind::junction(0.0), Coordinate::new(0.0, 10.0), 90.0)
            .unwrap();
        topo.reconnect_link(&p1, None, Some(&j3)).unwrap();
        let store = topo.store().read();
        assert!(!store.node(&j2).unwrap().connected_links.contains(&p1));
        assert!(store.node(&j3).unwrap().connected_links.contains(&p1));
        assert!(store.node(&j1).unwrap().connected_links.contains(&p1));
        assert_eq!(
            store.link(&p1).unwrap().geometry.last().copied(),
            Some(Coordinate::new(0.0, 10.0))
        );
        check_invariants(&store).unwrap();
    }

    #[test]
    fn reconnect_swap_keeps_both_ends() {
        let (mut topo, j1, j2, p1) = two_junctions();
        topo.reconnect_link(&p1, Some(&j2), Some(&j1)).unwrap();
        let store = topo.store().read();
        assert!(store.node(&j1).unwrap().connected_links.contains(&p1));
        assert!(store.node(&j2).unwrap().connected_links.contains(&p1));
        check_invariants(&store).unwrap();
    }

    #[test]
    fn reconnect_to_missing_node_is_all_or_nothing() {
        let (mut topo, _, _, p1) = two_junctions();
        let before = topo.store().snapshot();
        let err = topo.reconnect_link(&p1, Some("J77"), None).unwrap_err();
        assert!(matches!(err, TopologyError::InvalidTopology { .. }));
        assert_eq!(topo.store().snapshot(), before);
    }

    #[test]
    fn ids_are_never_reused() {
        let (mut topo, j1, _, _) = two_junctions();
        topo.delete_node(&j1).unwrap();
        let j3 = topo
            .add_node(NodeKind::junction(0.0), Coordinate::default(), 0.0)
            .unwrap();
        assert_ne!(j3, j1);
        let reinsert = NetworkNode::new(j1, NodeKind::junction(0.0), Coordinate::default(), 0.0);
        assert!(topo.insert_node(reinsert).is_err());
    }

    #[test]
    fn move_node_drags_link_ends() {
        let (mut topo, j1, _, p1) = two_junctions();
        topo.move_node(&j1, Coordinate::new(-5.0, 2.0)).unwrap();
        let store = topo.store().read();
        assert_eq!(store.link(&p1).unwrap().geometry[0], Coordinate::new(-5.0, 2.0));
        crate::validate::check_geometry_anchors(&store).unwrap();
    }

    #[test]
    fn split_link_inserts_junction() {
        let (mut topo, _, j2, p1) = two_junctions();
        let (mid, p_new) = topo.split_link(&p1, Coordinate::new(4.0, 3.0)).unwrap();
        let store = topo.store().read();
        let mid_node = store.node(&mid).unwrap();
        assert_eq!(mid_node.position, Coordinate::new(4.0, 0.0));
        assert!((mid_node.elevation - 92.0).abs() < 1e-9);
        assert_eq!(store.link(&p1).unwrap().end_node_id, mid);
        assert_eq!(store.link(&p_new).unwrap().end_node_id, j2);
        assert!(!store.node(&j2).unwrap().connected_links.contains(&p1));
        let LinkKind::Pipe { length, .. } = store.link(&p1).unwrap().kind else {
            panic!("expected pipe");
        };
        assert!((length - 40.0).abs() < 1e-9);
        check_invariants(&store).unwrap();
    }

    #[test]
    fn split_at_an_endpoint_is_rejected() {
        let (mut topo, _, _, p1) = two_junctions();
        let before = topo.store().snapshot();
        for at in [
            Coordinate::new(-5.0, 0.0),
            Coordinate::new(0.0, 0.0),
            Coordinate::new(10.0, 0.0),
            Coordinate::new(15.0, 2.0),
        ] {
            assert!(matches!(
                topo.split_link(&p1, at),
                Err(TopologyError::InvalidTopology { .. })
            ));
        }
        assert_eq!(topo.store().snapshot(), before);
        let LinkKind::Pipe { length, .. } = topo.store().read().link(&p1).unwrap().kind else {
            panic!("expected pipe");
        };
        assert!(length > 0.0);
    }

    #[test]
    fn vertex_edits_are_interior_only() {
        let (mut topo, _, _, p1) = two_junctions();
        assert!(topo.insert_vertex(&p1, 0, Coordinate::new(1.0, 1.0)).is_err());
        topo.insert_vertex(&p1, 1, Coordinate::new(5.0, 5.0)).unwrap();
        assert!(topo.move_vertex(&p1, 0, Coordinate::default()).is_err());
        assert!(topo.move_vertex(&p1, 2, Coordinate::default()).is_err());
        topo.move_vertex(&p1, 1, Coordinate::new(5.0, 6.0)).unwrap();
        assert_eq!(topo.remove_vertex(&p1, 1).unwrap(), Coordinate::new(5.0, 6.0));
        assert_eq!(topo.store().read().link(&p1).unwrap().geometry.len(), 2);
    }

    #[test]
    fn rebuild_connectivity_repairs_lists() {
        let (topo, j1, _, p1) = two_junctions();
        let mut store = topo.store().snapshot();
        store.node_mut(&j1).unwrap().connected_links.clear();
        assert!(check_invariants(&store).is_err());
        rebuild_connectivity(&mut store).unwrap();
        assert!(store.node(&j1).unwrap().connected_links.contains(&p1));
        check_invariants(&store).unwrap();
    }
}
