//! hn-network: graph/model layer for hydronet.
//!
//! Provides:
//! - Network entities (nodes, links, companion lines) and the flat Graph Store
//! - Topology Manager enforcing connectivity invariants on every edit
//! - Vertex Index derived from link geometry
//! - Invariant checking and pass-through network settings
//!
//! # Example
//!
//! ```
//! use hn_network::{Coordinate, LinkKind, NodeKind, StoreHandle, TopologyManager};
//!
//! let store = StoreHandle::default();
//! let mut topo = TopologyManager::new(store.clone());
//! let j1 = topo.add_node(NodeKind::junction(0.0), Coordinate::new(0.0, 0.0), 100.0).unwrap();
//! let j2 = topo.add_node(NodeKind::junction(1.5), Coordinate::new(100.0, 0.0), 80.0).unwrap();
//! let p1 = topo.add_link(LinkKind::default_pipe(), &j1, &j2, vec![]).unwrap();
//!
//! let deleted = topo.delete_node(&j1).unwrap();
//! assert_eq!(deleted, vec![p1, j1]);
//! assert!(store.read().node(j2.as_str()).unwrap().connected_links.is_empty());
//! ```

pub mod entity;
pub mod error;
pub mod selection;
pub mod settings;
pub mod store;
pub mod topology;
pub mod validate;
pub mod vertex;

// Re-exports for ergonomics
pub use entity::{
    CompanionLine, Coordinate, Entity, EntityKind, EntityRef, LinkKind, LinkStatus, NetworkLink,
    NetworkNode, NodeKind, ValveType,
};
pub use error::{TopologyError, TopologyResult};
pub use selection::Selection;
pub use settings::{Curve, NetworkSettings, Pattern, SettingEntry};
pub use store::{GraphStore, StoreHandle};
pub use topology::{CascadePreview, TopologyManager, rebuild_connectivity};
pub use validate::{check_geometry_anchors, check_invariants};
pub use vertex::{VertexIndex, VertexIndexCache, VertexRecord};
