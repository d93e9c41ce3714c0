use hn_core::HnError;
use hn_network::TopologyError;

pub type InpResult<T> = Result<T, InpError>;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum InpError {
    #[error("Cannot serialize an empty network (no nodes)")]
    EmptyNetwork,

    #[error("Line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Formatting error")]
    Format(#[from] std::fmt::Error),

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error(transparent)]
    Core(#[from] HnError),
}

impl InpError {
    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        InpError::Parse {
            line,
            message: message.into(),
        }
    }
}
