//! Error types for the hn-app service layer.

use std::path::PathBuf;

use hn_sim::SimError;

/// Application error type that wraps errors from the backend crates and
/// gives the CLI and other frontends one error surface.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Project error: {0}")]
    Project(String),

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Failed to read file: {path}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Topology error: {0}")]
    Topology(#[from] hn_network::TopologyError),

    #[error("INP error: {0}")]
    Inp(String),

    #[error(transparent)]
    Simulation(#[from] SimError),

    #[error("Results error: {0}")]
    Results(String),

    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedFile(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for hn-app operations.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Whether the run was abandoned at its deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self, AppError::Simulation(SimError::Timeout { .. }))
    }
}

impl From<hn_project::ProjectError> for AppError {
    fn from(err: hn_project::ProjectError) -> Self {
        match err {
            hn_project::ProjectError::NotFound { id } => AppError::ProjectNotFound(id),
            hn_project::ProjectError::Topology(e) => AppError::Topology(e),
            other => AppError::Project(other.to_string()),
        }
    }
}

impl From<hn_inp::InpError> for AppError {
    fn from(err: hn_inp::InpError) -> Self {
        match err {
            hn_inp::InpError::EmptyNetwork => AppError::Simulation(SimError::EmptyNetwork),
            hn_inp::InpError::Topology(e) => AppError::Topology(e),
            other => AppError::Inp(other.to_string()),
        }
    }
}

impl From<hn_results::ResultsError> for AppError {
    fn from(err: hn_results::ResultsError) -> Self {
        match err {
            hn_results::ResultsError::RunNotFound { run_id } => AppError::RunNotFound(run_id),
            other => AppError::Results(other.to_string()),
        }
    }
}
