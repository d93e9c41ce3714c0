//! Topology-specific error types.

use hn_core::HnError;
use thiserror::Error;

/// Errors raised by the Graph Store and Topology Manager.
///
/// Every operation that returns one of these has left the store untouched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TopologyError {
    /// An operation referenced an id absent from the Graph Store.
    #[error("Entity not found: {id}")]
    NotFound { id: String },

    /// The mutation would violate a connectivity invariant.
    #[error("Invalid topology: {what}")]
    InvalidTopology { what: String },

    /// A consistency check over the store failed.
    #[error("Invariant violated: {what}")]
    Invariant { what: String },

    #[error(transparent)]
    Core(#[from] HnError),
}

impl TopologyError {
    pub(crate) fn not_found(id: impl Into<String>) -> Self {
        TopologyError::NotFound { id: id.into() }
    }

    pub(crate) fn invalid(what: impl Into<String>) -> Self {
        TopologyError::InvalidTopology { what: what.into() }
    }
}

pub type TopologyResult<T> = Result<T, TopologyError>;
