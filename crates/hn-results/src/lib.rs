//! hn-results: simulation history, playback, run cache and wire types.

pub mod cursor;
pub mod hash;
pub mod history;
pub mod store;
pub mod types;
pub mod wire;

pub use cursor::PlaybackCursor;
pub use hash::compute_run_id;
pub use history::SimulationHistory;
pub use store::RunStore;
pub use types::*;
pub use wire::{ErrorResponse, SimulationReply, SimulationRequest, SimulationResponse};

pub type ResultsResult<T> = Result<T, ResultsError>;

#[derive(thiserror::Error, Debug)]
pub enum ResultsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Run not found: {run_id}")]
    RunNotFound { run_id: String },

    #[error("Invalid path: {message}")]
    InvalidPath { message: String },

    #[error("Timestamp {time} does not follow {previous}")]
    NonMonotonic { previous: u64, time: u64 },

    #[error("History has {timestamps} timestamps but {snapshots} snapshots")]
    LengthMismatch { timestamps: usize, snapshots: usize },
}
