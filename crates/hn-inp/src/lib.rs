//! hn-inp: the solver's native text input format.
//!
//! - [`writer`] serializes a Graph Store snapshot plus network settings
//! - [`parser`] reads INP text back into network entities
//! - [`import`] loads parsed entities into a store through the Topology Manager

pub mod error;
pub mod import;
pub mod parser;
pub mod writer;

pub use error::{InpError, InpResult};
pub use import::{ImportSummary, import_into, load_store};
pub use parser::{InpNetwork, parse, parse_time};
pub use writer::serialize;
