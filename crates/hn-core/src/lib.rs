//! hn-core: stable foundation for hydronet.
//!
//! Contains:
//! - ids (string entity ids + session id allocation)
//! - numeric (display rounding)
//! - units (uom SI types + constructors)
//! - error (shared error types)

pub mod error;
pub mod ids;
pub mod numeric;
pub mod units;

// Re-exports: nice ergonomics for downstream crates
pub use error::{HnError, HnResult};
pub use ids::*;
pub use numeric::*;
pub use units::*;
