//! Project file version upgrades.

use crate::schema::Project;
use crate::{ProjectError, ProjectResult};

pub const LATEST_VERSION: u32 = 2;

/// Upgrade `project` in place to [`LATEST_VERSION`].
///
/// Version 1 files had no per-project id; one is assigned on upgrade.
pub fn migrate_to_latest(mut project: Project) -> ProjectResult<Project> {
    if project.version > LATEST_VERSION {
        return Err(ProjectError::Migration {
            what: format!(
                "file version {} is newer than supported version {LATEST_VERSION}",
                project.version
            ),
        });
    }
    if project.version < 2 {
        if project.id.is_empty() {
            project.id = uuid::Uuid::new_v4().to_string();
        }
        project.version = 2;
    }
    Ok(project)
}
