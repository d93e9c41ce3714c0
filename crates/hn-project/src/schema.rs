//! Project file schema.

use hn_network::{GraphStore, NetworkSettings};
use serde::{Deserialize, Serialize};

use crate::ProjectResult;
use crate::features::{FeatureCollection, from_feature_collection, to_feature_collection};
use crate::migrate::LATEST_VERSION;

/// What a project persists: the network as features plus pass-through settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectDocument {
    pub features: FeatureCollection,
    #[serde(default)]
    pub settings: NetworkSettings,
}

impl ProjectDocument {
    pub fn from_store(store: &GraphStore, settings: &NetworkSettings) -> ProjectResult<Self> {
        Ok(Self {
            features: to_feature_collection(store)?,
            settings: settings.clone(),
        })
    }

    /// Rebuild a validated Graph Store from the features.
    pub fn to_store(&self) -> ProjectResult<GraphStore> {
        from_feature_collection(&self.features)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub version: u32,
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub document: ProjectDocument,
}

impl Project {
    /// A new empty project with a fresh id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            version: LATEST_VERSION,
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            document: ProjectDocument::default(),
        }
    }
}
