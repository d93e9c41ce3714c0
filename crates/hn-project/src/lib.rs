//! hn-project: project file format, feature collections and project storage.

pub mod features;
pub mod migrate;
pub mod schema;
pub mod store;
pub mod validate;

pub use features::{Feature, FeatureCollection, Geometry, from_feature_collection, to_feature_collection};
pub use migrate::{LATEST_VERSION, migrate_to_latest};
pub use schema::*;
pub use store::ProjectStore;
pub use validate::validate_project;

use std::fs;
use std::path::Path;

use hn_network::TopologyError;

pub type ProjectResult<T> = Result<T, ProjectError>;

#[derive(thiserror::Error, Debug)]
pub enum ProjectError {
    #[error("Project not found: {id}")]
    NotFound { id: String },

    #[error("Invalid project id: {id:?}")]
    InvalidId { id: String },

    #[error("Invalid feature {id}: {message}")]
    InvalidFeature { id: String, message: String },

    #[error("Topology error: {0}")]
    Topology(#[from] TopologyError),

    #[error("Migration error: {what}")]
    Migration { what: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Bring a freshly parsed project up to date and check it.
fn accept(project: Project) -> ProjectResult<Project> {
    let project = migrate_to_latest(project)?;
    validate_project(&project)?;
    Ok(project)
}

/// Read a YAML project file, migrating older versions.
pub fn load_yaml(path: &Path) -> ProjectResult<Project> {
    accept(serde_yaml::from_str(&fs::read_to_string(path)?)?)
}

pub fn save_yaml(path: &Path, project: &Project) -> ProjectResult<()> {
    validate_project(project)?;
    fs::write(path, serde_yaml::to_string(project)?)?;
    Ok(())
}

/// Read a JSON project file, migrating older versions.
pub fn load_json(path: &Path) -> ProjectResult<Project> {
    accept(serde_json::from_slice(&fs::read(path)?)?)
}

pub fn save_json(path: &Path, project: &Project) -> ProjectResult<()> {
    validate_project(project)?;
    fs::write(path, serde_json::to_vec_pretty(project)?)?;
    Ok(())
}
