//! Project validation.

use crate::schema::Project;
use crate::{ProjectError, ProjectResult};

/// Check that `project` has a usable id and that its features form a
/// consistent network.
pub fn validate_project(project: &Project) -> ProjectResult<()> {
    validate_id(&project.id)?;
    project.document.to_store()?;
    Ok(())
}

/// Project ids become file names: ASCII letters, digits, `-` and `_` only.
pub(crate) fn validate_id(id: &str) -> ProjectResult<()> {
    let ok = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(ProjectError::InvalidId { id: id.to_string() })
    }
}
