//! Connectivity invariant checks.

use crate::error::{TopologyError, TopologyResult};
use crate::store::GraphStore;

/// Verify the store's connectivity invariants:
/// - every link references two existing, distinct nodes
/// - every link has at least two coordinates, anchored on its endpoint nodes
/// - a node's `connected_links` is exactly the set of links touching it
/// - every companion's owner exists
pub fn check_invariants(store: &GraphStore) -> TopologyResult<()> {
    for link in store.links() {
        for endpoint in [&link.start_node_id, &link.end_node_id] {
            let Some(node) = store.node(endpoint) else {
                return Err(violation(format!(
                    "link {} references missing node {}",
                    link.id, endpoint
                )));
            };
            if !node.connected_links.contains(&link.id) {
                return Err(violation(format!(
                    "node {} does not list incident link {}",
                    endpoint, link.id
                )));
            }
        }
        if link.start_node_id == link.end_node_id {
            return Err(violation(format!("link {} is a self-loop", link.id)));
        }
        if link.geometry.len() < 2 {
            return Err(violation(format!(
                "link {} has {} coordinates (expected at least 2)",
                link.id,
                link.geometry.len()
            )));
        }
    }

    for node in store.nodes() {
        for link_id in &node.connected_links {
            match store.link(link_id) {
                Some(link) if link.touches(&node.id) => {}
                Some(_) => {
                    return Err(violation(format!(
                        "node {} lists link {} which does not touch it",
                        node.id, link_id
                    )));
                }
                None => {
                    return Err(violation(format!(
                        "node {} lists missing link {}",
                        node.id, link_id
                    )));
                }
            }
        }
    }

    for companion in store.companions() {
        if store.node(&companion.owner_id).is_none() && store.link(&companion.owner_id).is_none()
        {
            return Err(violation(format!(
                "companion {} owned by missing entity {}",
                companion.id, companion.owner_id
            )));
        }
    }

    Ok(())
}

/// Verify that every link's end coordinates sit on its endpoint nodes.
///
/// Kept separate from [`check_invariants`]: imported networks often carry
/// slightly offset vertices and are snapped on import instead.
pub fn check_geometry_anchors(store: &GraphStore) -> TopologyResult<()> {
    for link in store.links() {
        let (Some(first), Some(last)) = (link.geometry.first(), link.geometry.last()) else {
            continue;
        };
        let anchors = [
            (first, &link.start_node_id),
            (last, &link.end_node_id),
        ];
        for (coord, node_id) in anchors {
            if let Some(node) = store.node(node_id)
                && node.position != *coord
            {
                return Err(violation(format!(
                    "link {} geometry is detached from node {}",
                    link.id, node_id
                )));
            }
        }
    }
    Ok(())
}

fn violation(what: String) -> TopologyError {
    TopologyError::Invariant { what }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Coordinate, Entity, LinkKind, LinkStatus, NetworkLink, NetworkNode, NodeKind};
    use hn_core::EntityId;

    fn id(s: &str) -> EntityId {
        EntityId::new(s).unwrap()
    }

    fn node(name: &str, links: &[&str]) -> NetworkNode {
        let mut n = NetworkNode::new(id(name), NodeKind::junction(0.0), Coordinate::default(), 0.0);
        for l in links {
            n.connected_links.insert(id(l));
        }
        n
    }

    fn pipe(name: &str, a: &str, b: &str) -> NetworkLink {
        NetworkLink {
            id: id(name),
            kind: LinkKind::default_pipe(),
            start_node_id: id(a),
            end_node_id: id(b),
            geometry: vec![Coordinate::default(), Coordinate::default()],
            status: LinkStatus::Open,
            preview: false,
        }
    }

    #[test]
    fn validate_empty_store() {
        assert!(check_invariants(&GraphStore::new()).is_ok());
    }

    #[test]
    fn validate_missing_node_ref() {
        let mut store = GraphStore::new();
        store.upsert(Entity::Node(node("J1", &["P1"])));
        store.upsert(Entity::Link(pipe("P1", "J1", "J99")));
        let err = check_invariants(&store).unwrap_err();
        assert!(matches!(err, TopologyError::Invariant { .. }));
        assert!(err.to_string().contains("J99"));
    }

    #[test]
    fn validate_stale_connected_link() {
        let mut store = GraphStore::new();
        store.upsert(Entity::Node(node("J1", &["P1", "P2"])));
        store.upsert(Entity::Node(node("J2", &["P1"])));
        store.upsert(Entity::Link(pipe("P1", "J1", "J2")));
        let err = check_invariants(&store).unwrap_err();
        assert!(err.to_string().contains("missing link P2"));
    }

    #[test]
    fn validate_missing_connected_link() {
        let mut store = GraphStore::new();
        store.upsert(Entity::Node(node("J1", &["P1"])));
        store.upsert(Entity::Node(node("J2", &[])));
        store.upsert(Entity::Link(pipe("P1", "J1", "J2")));
        assert!(check_invariants(&store).is_err());
    }
}
