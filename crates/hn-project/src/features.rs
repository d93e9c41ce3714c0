//! GeoJSON-style feature collection: the Graph Store's external form.
//!
//! Every node is a `Point` feature, every link and companion line a
//! `LineString` feature. Entity attributes live in `properties` next to a
//! `featureType` discriminator. `connected_links` is never stored; it is
//! rebuilt from link endpoints on load.

use hn_core::EntityId;
use hn_network::{
    CompanionLine, Coordinate, Entity, GraphStore, LinkKind, LinkStatus, NetworkLink, NetworkNode,
    NodeKind, check_geometry_anchors, check_invariants, rebuild_connectivity,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{ProjectError, ProjectResult};

const FEATURE_TYPE: &str = "featureType";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "FeatureCollection")]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "Feature")]
pub struct Feature {
    pub id: String,
    pub geometry: Geometry,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: [f64; 2] },
    LineString { coordinates: Vec<[f64; 2]> },
}

fn point(c: Coordinate) -> [f64; 2] {
    [c.x, c.y]
}

fn coordinate(p: [f64; 2]) -> Coordinate {
    Coordinate::new(p[0], p[1])
}

/// Attributes of `value` (a struct or internally tagged enum) as a property map.
fn properties_of<T: Serialize>(value: &T, feature_type: &str) -> ProjectResult<Map<String, Value>> {
    let mut map = match serde_json::to_value(value)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    map.insert(FEATURE_TYPE.to_string(), Value::from(feature_type));
    Ok(map)
}

/// Export every entity of `store`, nodes first, then links, then companions,
/// each in id order.
pub fn to_feature_collection(store: &GraphStore) -> ProjectResult<FeatureCollection> {
    let mut features = Vec::with_capacity(store.node_count() + store.link_count());

    for node in store.nodes() {
        let mut properties = properties_of(&node.kind, "node")?;
        properties.insert("elevation".to_string(), Value::from(node.elevation));
        features.push(Feature {
            id: node.id.to_string(),
            geometry: Geometry::Point {
                coordinates: point(node.position),
            },
            properties,
        });
    }

    for link in store.links() {
        let mut properties = properties_of(&link.kind, "link")?;
        properties.insert("start_node_id".to_string(), Value::from(link.start_node_id.as_str()));
        properties.insert("end_node_id".to_string(), Value::from(link.end_node_id.as_str()));
        properties.insert("status".to_string(), serde_json::to_value(link.status)?);
        if link.preview {
            properties.insert("preview".to_string(), Value::Bool(true));
        }
        features.push(Feature {
            id: link.id.to_string(),
            geometry: Geometry::LineString {
                coordinates: link.geometry.iter().copied().map(point).collect(),
            },
            properties,
        });
    }

    for companion in store.companions() {
        let mut properties = Map::new();
        properties.insert(FEATURE_TYPE.to_string(), Value::from("companion"));
        properties.insert("owner_id".to_string(), Value::from(companion.owner_id.as_str()));
        features.push(Feature {
            id: companion.id.to_string(),
            geometry: Geometry::LineString {
                coordinates: companion.geometry.iter().copied().map(point).collect(),
            },
            properties,
        });
    }

    Ok(FeatureCollection { features })
}

/// Rebuild a Graph Store from a feature collection.
///
/// Connectivity is derived from link endpoints, then every invariant and
/// geometry anchor is checked; any failure rejects the whole collection.
pub fn from_feature_collection(collection: &FeatureCollection) -> ProjectResult<GraphStore> {
    let mut store = GraphStore::new();
    for feature in &collection.features {
        let entity = feature_entity(feature)?;
        if store.contains(entity.id()) {
            return Err(invalid(feature, "duplicate id"));
        }
        store.upsert(entity);
    }
    rebuild_connectivity(&mut store)?;
    check_invariants(&store)?;
    check_geometry_anchors(&store)?;
    Ok(store)
}

fn invalid(feature: &Feature, message: impl Into<String>) -> ProjectError {
    ProjectError::InvalidFeature {
        id: feature.id.clone(),
        message: message.into(),
    }
}

fn id_property(feature: &Feature, key: &str) -> ProjectResult<EntityId> {
    let value = feature
        .properties
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| invalid(feature, format!("missing {key}")))?;
    EntityId::new(value).map_err(|e| invalid(feature, e.to_string()))
}

fn feature_entity(feature: &Feature) -> ProjectResult<Entity> {
    let id = EntityId::new(feature.id.as_str()).map_err(|e| invalid(feature, e.to_string()))?;
    let feature_type = feature
        .properties
        .get(FEATURE_TYPE)
        .and_then(Value::as_str)
        .ok_or_else(|| invalid(feature, "missing featureType"))?;
    let attributes = Value::Object(feature.properties.clone());

    let entity = match (feature_type, &feature.geometry) {
        ("node", Geometry::Point { coordinates }) => {
            let kind: NodeKind = serde_json::from_value(attributes)
                .map_err(|e| invalid(feature, e.to_string()))?;
            let elevation = feature
                .properties
                .get("elevation")
                .and_then(Value::as_f64)
                .ok_or_else(|| invalid(feature, "missing elevation"))?;
            Entity::Node(NetworkNode::new(id, kind, coordinate(*coordinates), elevation))
        }
        ("link", Geometry::LineString { coordinates }) => {
            let kind: LinkKind = serde_json::from_value(attributes)
                .map_err(|e| invalid(feature, e.to_string()))?;
            let status: LinkStatus = match feature.properties.get("status") {
                Some(v) => serde_json::from_value(v.clone()).map_err(|e| invalid(feature, e.to_string()))?,
                None => LinkStatus::default(),
            };
            if coordinates.len() < 2 {
                return Err(invalid(feature, "a link needs at least two coordinates"));
            }
            Entity::Link(NetworkLink {
                id,
                kind,
                start_node_id: id_property(feature, "start_node_id")?,
                end_node_id: id_property(feature, "end_node_id")?,
                geometry: coordinates.iter().copied().map(coordinate).collect(),
                status,
                preview: feature
                    .properties
                    .get("preview")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
            })
        }
        ("companion", Geometry::LineString { coordinates }) => Entity::Companion(CompanionLine {
            id,
            owner_id: id_property(feature, "owner_id")?,
            geometry: coordinates.iter().copied().map(coordinate).collect(),
        }),
        (other, _) => {
            return Err(invalid(
                feature,
                format!("unexpected geometry for featureType {other}"),
            ));
        }
    };
    Ok(entity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hn_network::{StoreHandle, TopologyManager};

    fn sample() -> GraphStore {
        let handle = StoreHandle::default();
        let mut topo = TopologyManager::new(handle.clone());
        let r1 = topo
            .add_node(NodeKind::reservoir(50.0), Coordinate::new(0.0, 0.0), 50.0)
            .unwrap();
        let j1 = topo
            .add_node(NodeKind::junction(2.5), Coordinate::new(10.0, 5.0), 12.0)
            .unwrap();
        let p1 = topo
            .add_link(LinkKind::default_pipe(), &r1, &j1, vec![Coordinate::new(5.0, 0.0)])
            .unwrap();
        topo.attach_companion(&p1, vec![Coordinate::new(0.0, 1.0), Coordinate::new(1.0, 1.0)])
            .unwrap();
        handle.snapshot()
    }

    #[test]
    fn export_then_load_reproduces_store_content() {
        let store = sample();
        let fc = to_feature_collection(&store).unwrap();
        assert_eq!(fc.features.len(), 4);
        let loaded = from_feature_collection(&fc).unwrap();
        assert_eq!(
            loaded.nodes().collect::<Vec<_>>(),
            store.nodes().collect::<Vec<_>>()
        );
        assert_eq!(
            loaded.links().collect::<Vec<_>>(),
            store.links().collect::<Vec<_>>()
        );
        assert_eq!(loaded.companions().count(), 1);
    }

    #[test]
    fn geojson_shape() {
        let json = serde_json::to_value(to_feature_collection(&sample()).unwrap()).unwrap();
        assert_eq!(json["type"], "FeatureCollection");
        let first = &json["features"][0];
        assert_eq!(first["type"], "Feature");
        assert_eq!(first["geometry"]["type"], "Point");
        assert_eq!(first["properties"]["featureType"], "node");
        assert!(first["properties"].get("connected_links").is_none());
    }

    #[test]
    fn dangling_link_is_rejected() {
        let mut fc = to_feature_collection(&sample()).unwrap();
        fc.features.retain(|f| f.id != "R1");
        let err = from_feature_collection(&fc).unwrap_err();
        assert!(matches!(err, ProjectError::Topology(_)), "{err}");
    }

    #[test]
    fn unknown_feature_type_is_rejected() {
        let mut fc = to_feature_collection(&sample()).unwrap();
        fc.features[0]
            .properties
            .insert(FEATURE_TYPE.to_string(), Value::from("lamp"));
        let err = from_feature_collection(&fc).unwrap_err();
        assert!(matches!(err, ProjectError::InvalidFeature { .. }), "{err}");
    }
}
