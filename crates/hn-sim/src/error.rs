//! Error types for simulation runs.

use hn_inp::InpError;
use hn_results::ResultsError;
use thiserror::Error;

/// Errors that end a simulation run.
#[derive(Error, Debug)]
pub enum SimError {
    #[error("Cannot serialize an empty network (no nodes)")]
    EmptyNetwork,

    #[error("Serialization failed: {0}")]
    Serialize(InpError),

    /// Engine rejected the network while opening or initializing.
    #[error("{message}")]
    SolverOpen { message: String },

    /// Engine failed while solving or advancing.
    #[error("{message}")]
    SolverStep { message: String },

    #[error("Simulation timed out after {seconds} s")]
    Timeout { seconds: f64 },

    #[error("Step limit of {limit} reached before the engine finished")]
    TooManySteps { limit: usize },

    #[error("Invalid driver state: {what}")]
    InvalidState { what: &'static str },

    #[error("History error: {0}")]
    History(#[from] ResultsError),
}

pub type SimResult<T> = Result<T, SimError>;

impl From<InpError> for SimError {
    fn from(e: InpError) -> Self {
        match e {
            InpError::EmptyNetwork => SimError::EmptyNetwork,
            other => SimError::Serialize(other),
        }
    }
}

impl SimError {
    /// Whether the error came from the engine itself.
    pub fn is_solver_error(&self) -> bool {
        matches!(self, SimError::SolverOpen { .. } | SimError::SolverStep { .. })
    }
}
