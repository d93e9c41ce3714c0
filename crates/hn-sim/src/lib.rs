//! hn-sim: simulation driver.
//!
//! Drives a [`hn_engine::HydraulicEngine`] through one extended-period run:
//! open the serialized network, initialize, then alternate solve / extract /
//! advance until the engine reports no further events. Every run ends with
//! the engine closed, whatever the outcome.

pub mod driver;
pub mod error;
pub mod extract;

pub use driver::{DriverOptions, DriverState, SimulationDriver, StepProgress};
pub use error::{SimError, SimResult};
pub use extract::{extract_snapshot, status_label};
