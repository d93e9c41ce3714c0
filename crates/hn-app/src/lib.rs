//! Shared application service layer for hydronet.
//!
//! Frontends (the CLI, an HTTP shim, an editor) go through this crate for
//! editing sessions, project storage, simulation runs and result queries.

pub mod error;
pub mod progress;
pub mod project_service;
pub mod query;
pub mod run_service;
pub mod session;

pub use error::{AppError, AppResult};
pub use progress::{RunProgressEvent, RunStage};
pub use project_service::{
    import_inp_file, load_project_file, open_project, save_project_file, save_session,
    session_to_project,
};
pub use query::{
    RunSummary, extract_link_series, extract_node_series, get_run_summary, list_link_ids,
    list_node_ids,
};
pub use run_service::{
    ENGINE_VERSION, RunOptions, RunOutcome, list_runs, load_run, run_inp, run_inp_with_progress,
    run_with_deadline, simulate,
};
pub use session::EditSession;
