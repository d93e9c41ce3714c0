//! Core network entity types.
//!
//! Nodes and links refer to each other only through string ids resolved by
//! the Graph Store; there are no direct object references.

use hn_core::{EntityId, LinkId, NodeId};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// 2D map coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
}

impl Coordinate {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Coordinate) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Linear interpolation between `self` and `other` (`t` in `[0, 1]`).
    pub fn lerp(self, other: Coordinate, t: f64) -> Coordinate {
        Coordinate::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }
}

/// Node subtype with its subtype-specific attributes.
///
/// Lengths are meters, demands are in the network's flow units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NodeKind {
    Junction {
        base_demand: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pattern: Option<String>,
    },
    Tank {
        init_level: f64,
        min_level: f64,
        max_level: f64,
        diameter: f64,
        #[serde(default)]
        min_volume: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        volume_curve: Option<String>,
    },
    Reservoir {
        head: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pattern: Option<String>,
    },
}

impl NodeKind {
    pub fn junction(base_demand: f64) -> Self {
        NodeKind::Junction {
            base_demand,
            pattern: None,
        }
    }

    pub fn reservoir(head: f64) -> Self {
        NodeKind::Reservoir {
            head,
            pattern: None,
        }
    }

    pub fn tank(init_level: f64, min_level: f64, max_level: f64, diameter: f64) -> Self {
        NodeKind::Tank {
            init_level,
            min_level,
            max_level,
            diameter,
            min_volume: 0.0,
            volume_curve: None,
        }
    }

    /// Prefix used when allocating ids for this subtype.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            NodeKind::Junction { .. } => "J",
            NodeKind::Tank { .. } => "T",
            NodeKind::Reservoir { .. } => "R",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Junction { .. } => "junction",
            NodeKind::Tank { .. } => "tank",
            NodeKind::Reservoir { .. } => "reservoir",
        }
    }
}

/// A point-geometry network component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub position: Coordinate,
    /// Elevation in meters.
    pub elevation: f64,
    /// Links whose start or end is this node, in insertion order.
    #[serde(default)]
    pub connected_links: IndexSet<LinkId>,
}

impl NetworkNode {
    pub fn new(id: NodeId, kind: NodeKind, position: Coordinate, elevation: f64) -> Self {
        Self {
            id,
            kind,
            position,
            elevation,
            connected_links: IndexSet::new(),
        }
    }

    pub fn is_isolated(&self) -> bool {
        self.connected_links.is_empty()
    }
}

/// Control valve types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValveType {
    /// Pressure reducing valve
    PRV,
    /// Pressure sustaining valve
    PSV,
    /// Pressure breaker valve
    PBV,
    /// Flow control valve
    FCV,
    /// Throttle control valve
    TCV,
    /// General purpose valve
    GPV,
}

impl ValveType {
    pub fn as_str(self) -> &'static str {
        match self {
            ValveType::PRV => "PRV",
            ValveType::PSV => "PSV",
            ValveType::PBV => "PBV",
            ValveType::FCV => "FCV",
            ValveType::TCV => "TCV",
            ValveType::GPV => "GPV",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "PRV" => Some(ValveType::PRV),
            "PSV" => Some(ValveType::PSV),
            "PBV" => Some(ValveType::PBV),
            "FCV" => Some(ValveType::FCV),
            "TCV" => Some(ValveType::TCV),
            "GPV" => Some(ValveType::GPV),
            _ => None,
        }
    }
}

/// Link subtype with its physical attributes.
///
/// Lengths are meters, diameters millimeters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LinkKind {
    Pipe {
        length: f64,
        diameter: f64,
        /// Hazen-Williams C factor
        roughness: f64,
        #[serde(default)]
        minor_loss: f64,
        #[serde(default)]
        check_valve: bool,
    },
    Pump {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        curve: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        power: Option<f64>,
        #[serde(default = "default_speed")]
        speed: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pattern: Option<String>,
    },
    Valve {
        valve_type: ValveType,
        diameter: f64,
        setting: f64,
        #[serde(default)]
        minor_loss: f64,
    },
}

fn default_speed() -> f64 {
    1.0
}

impl LinkKind {
    /// 100 m of 300 mm pipe with C = 130.
    pub fn default_pipe() -> Self {
        LinkKind::Pipe {
            length: 100.0,
            diameter: 300.0,
            roughness: 130.0,
            minor_loss: 0.0,
            check_valve: false,
        }
    }

    pub fn pump_with_curve(curve: impl Into<String>) -> Self {
        LinkKind::Pump {
            curve: Some(curve.into()),
            power: None,
            speed: 1.0,
            pattern: None,
        }
    }

    pub fn id_prefix(&self) -> &'static str {
        match self {
            LinkKind::Pipe { .. } => "P",
            LinkKind::Pump { .. } => "PU",
            LinkKind::Valve { .. } => "V",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LinkKind::Pipe { .. } => "pipe",
            LinkKind::Pump { .. } => "pump",
            LinkKind::Valve { .. } => "valve",
        }
    }

    pub fn is_pipe(&self) -> bool {
        matches!(self, LinkKind::Pipe { .. })
    }
}

/// User-set initial link status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LinkStatus {
    #[default]
    Open,
    Closed,
}

impl LinkStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LinkStatus::Open => "Open",
            LinkStatus::Closed => "Closed",
        }
    }
}

/// A line-geometry network component connecting two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkLink {
    pub id: LinkId,
    pub kind: LinkKind,
    pub start_node_id: NodeId,
    pub end_node_id: NodeId,
    /// First/last coordinates coincide with the start/end node positions.
    pub geometry: Vec<Coordinate>,
    #[serde(default)]
    pub status: LinkStatus,
    /// Transient link still being drawn; excluded from solver input and vertex tools.
    #[serde(default)]
    pub preview: bool,
}

impl NetworkLink {
    pub fn touches(&self, node_id: &str) -> bool {
        self.start_node_id.as_str() == node_id || self.end_node_id.as_str() == node_id
    }

    /// The endpoint opposite to `node_id`, if `node_id` is an endpoint.
    pub fn other_end(&self, node_id: &str) -> Option<&NodeId> {
        if self.start_node_id.as_str() == node_id {
            Some(&self.end_node_id)
        } else if self.end_node_id.as_str() == node_id {
            Some(&self.start_node_id)
        } else {
            None
        }
    }

    /// Interior coordinates (excluding both endpoints).
    pub fn interior(&self) -> &[Coordinate] {
        if self.geometry.len() <= 2 {
            &[]
        } else {
            &self.geometry[1..self.geometry.len() - 1]
        }
    }

    /// Polyline length of the geometry.
    pub fn geometric_length(&self) -> f64 {
        self.geometry
            .windows(2)
            .map(|w| w[0].distance(w[1]))
            .sum()
    }
}

/// Visual-only helper geometry tied to an owning node or link
/// (e.g. the schematic connector drawn for a pump or valve).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanionLine {
    pub id: EntityId,
    pub owner_id: EntityId,
    pub geometry: Vec<Coordinate>,
}

/// Discriminant of a stored entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Node,
    Link,
    Companion,
}

/// Owned entity, as accepted by [`crate::GraphStore::upsert`].
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Node(NetworkNode),
    Link(NetworkLink),
    Companion(CompanionLine),
}

impl Entity {
    pub fn id(&self) -> &EntityId {
        match self {
            Entity::Node(n) => &n.id,
            Entity::Link(l) => &l.id,
            Entity::Companion(c) => &c.id,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Node(_) => EntityKind::Node,
            Entity::Link(_) => EntityKind::Link,
            Entity::Companion(_) => EntityKind::Companion,
        }
    }
}

/// Borrowed entity, as returned by [`crate::GraphStore::get`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EntityRef<'a> {
    Node(&'a NetworkNode),
    Link(&'a NetworkLink),
    Companion(&'a CompanionLine),
}

impl EntityRef<'_> {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityRef::Node(_) => EntityKind::Node,
            EntityRef::Link(_) => EntityKind::Link,
            EntityRef::Companion(_) => EntityKind::Companion,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> EntityId {
        EntityId::new(s).unwrap()
    }

    #[test]
    fn link_other_end() {
        let link = NetworkLink {
            id: id("P1"),
            kind: LinkKind::default_pipe(),
            start_node_id: id("J1"),
            end_node_id: id("J2"),
            geometry: vec![Coordinate::new(0.0, 0.0), Coordinate::new(3.0, 4.0)],
            status: LinkStatus::Open,
            preview: false,
        };
        assert_eq!(link.other_end("J1").map(|n| n.as_str()), Some("J2"));
        assert_eq!(link.other_end("J2").map(|n| n.as_str()), Some("J1"));
        assert!(link.other_end("J3").is_none());
        assert!(link.interior().is_empty());
        assert_eq!(link.geometric_length(), 5.0);
    }

    #[test]
    fn kind_prefixes() {
        assert_eq!(NodeKind::junction(0.0).id_prefix(), "J");
        assert_eq!(NodeKind::reservoir(10.0).id_prefix(), "R");
        assert_eq!(LinkKind::pump_with_curve("C1").id_prefix(), "PU");
    }

    #[test]
    fn valve_type_parse() {
        assert_eq!(ValveType::parse("prv"), Some(ValveType::PRV));
        assert_eq!(ValveType::parse("XYZ"), None);
        assert_eq!(ValveType::TCV.as_str(), "TCV");
    }
}
