//! Project loading, saving and import.

use std::path::Path;

use hn_project::{Project, ProjectStore};
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::session::EditSession;

/// Open a stored project as an editing session.
pub fn open_project(projects: &ProjectStore, id: &str) -> AppResult<EditSession> {
    let document = projects.load_project(id)?;
    let session = EditSession::from_document(&document)?;
    info!(project = id, "project opened");
    Ok(session)
}

/// Save the session's network back into project `id`.
pub fn save_session(projects: &ProjectStore, id: &str, session: &EditSession) -> AppResult<()> {
    projects.save_project(id, &session.to_document()?)?;
    Ok(())
}

enum FileFormat {
    Yaml,
    Json,
}

fn file_format(path: &Path) -> AppResult<FileFormat> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => Ok(FileFormat::Yaml),
        Some("json" | "geojson") => Ok(FileFormat::Json),
        _ => Err(AppError::UnsupportedFile(path.to_path_buf())),
    }
}

/// Load a project file; the format follows the extension.
pub fn load_project_file(path: &Path) -> AppResult<Project> {
    let format = file_format(path)?;
    if !path.exists() {
        return Err(AppError::FileRead {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        });
    }
    let project = match format {
        FileFormat::Yaml => hn_project::load_yaml(path)?,
        FileFormat::Json => hn_project::load_json(path)?,
    };
    Ok(project)
}

pub fn save_project_file(path: &Path, project: &Project) -> AppResult<()> {
    match file_format(path)? {
        FileFormat::Yaml => hn_project::save_yaml(path, project)?,
        FileFormat::Json => hn_project::save_json(path, project)?,
    }
    Ok(())
}

/// Read an INP file into a new editing session.
pub fn import_inp_file(path: &Path) -> AppResult<EditSession> {
    let text = std::fs::read_to_string(path).map_err(|e| AppError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    let session = EditSession::from_inp(&text)?;
    info!(
        path = %path.display(),
        nodes = session.store().read().node_count(),
        "INP imported"
    );
    Ok(session)
}

/// Wrap a session's network as a new named project record.
pub fn session_to_project(name: &str, session: &EditSession) -> AppResult<Project> {
    let mut project = Project::new(name);
    project.document = session.to_document()?;
    Ok(project)
}
