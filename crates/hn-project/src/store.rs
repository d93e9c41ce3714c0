//! Directory-backed project storage keyed by opaque project id.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::migrate::{LATEST_VERSION, migrate_to_latest};
use crate::schema::{Project, ProjectDocument};
use crate::validate::validate_id;
use crate::{ProjectError, ProjectResult};

/// One `<id>.json` file per project under a root directory.
#[derive(Debug, Clone)]
pub struct ProjectStore {
    root_dir: PathBuf,
}

impl ProjectStore {
    pub fn new(root_dir: PathBuf) -> ProjectResult<Self> {
        if !root_dir.exists() {
            fs::create_dir_all(&root_dir)?;
        }
        Ok(Self { root_dir })
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    fn path(&self, id: &str) -> ProjectResult<PathBuf> {
        validate_id(id)?;
        Ok(self.root_dir.join(format!("{id}.json")))
    }

    pub fn exists(&self, id: &str) -> bool {
        self.path(id).is_ok_and(|p| p.exists())
    }

    /// Store `document` as a new project and return its id.
    pub fn create_project(
        &self,
        name: impl Into<String>,
        document: ProjectDocument,
    ) -> ProjectResult<String> {
        let mut project = Project::new(name);
        project.document = document;
        self.write(&project)?;
        Ok(project.id)
    }

    /// Full project record, upgraded to the latest file version.
    pub fn load(&self, id: &str) -> ProjectResult<Project> {
        let path = self.path(id)?;
        if !path.exists() {
            return Err(ProjectError::NotFound { id: id.to_string() });
        }
        let content = fs::read_to_string(path)?;
        let project: Project = serde_json::from_str(&content)?;
        migrate_to_latest(project)
    }

    pub fn load_project(&self, id: &str) -> ProjectResult<ProjectDocument> {
        let document = self.load(id)?.document;
        document.to_store()?;
        Ok(document)
    }

    /// Replace the document of project `id`, creating it if absent.
    pub fn save_project(&self, id: &str, document: &ProjectDocument) -> ProjectResult<()> {
        document.to_store()?;
        let project = match self.load(id) {
            Ok(existing) => Project {
                document: document.clone(),
                ..existing
            },
            Err(ProjectError::NotFound { .. }) => Project {
                version: LATEST_VERSION,
                id: id.to_string(),
                name: id.to_string(),
                document: document.clone(),
            },
            Err(e) => return Err(e),
        };
        self.write(&project)
    }

    fn write(&self, project: &Project) -> ProjectResult<()> {
        let path = self.path(&project.id)?;
        fs::write(&path, serde_json::to_string_pretty(project)?)?;
        debug!(project = %project.id, features = project.document.features.features.len(), "project saved");
        Ok(())
    }

    /// `(id, name)` of every stored project, sorted by id.
    pub fn list_projects(&self) -> ProjectResult<Vec<(String, String)>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.root_dir)? {
            let path = entry?.path();
            if path.extension().is_none_or(|e| e != "json") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Ok(project) = self.load(id) {
                out.push((project.id, project.name));
            }
        }
        out.sort();
        Ok(out)
    }

    pub fn delete_project(&self, id: &str) -> ProjectResult<()> {
        let path = self.path(id)?;
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}
