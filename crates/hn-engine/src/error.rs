//! Error types for engine operations.

use hn_inp::InpError;
use thiserror::Error;

/// Errors raised by a hydraulic engine. Display output is the diagnostic
/// surfaced to callers verbatim.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Input error: {what}")]
    Input { what: String },

    #[error("INP error: {0}")]
    Inp(#[from] InpError),

    #[error("System unbalanced: {what}")]
    Unbalanced { what: String },

    #[error("Numeric error: {what}")]
    Numeric { what: String },

    #[error("Engine is not open")]
    NotOpen,

    #[error("Engine is already open")]
    AlreadyOpen,

    #[error("Hydraulics not initialized")]
    NotInitialized,

    #[error("Invalid index: {what}")]
    InvalidIndex { what: String },
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    pub(crate) fn input(what: impl Into<String>) -> Self {
        EngineError::Input { what: what.into() }
    }
}
