//! hn-engine: hydraulic solver engines behind a stepwise interface.
//!
//! [`HydraulicEngine`] is the open/init/run/next/query/close surface the
//! simulation driver programs against. [`NetworkEngine`] is a reference
//! implementation: demand-driven extended-period hydraulics solved by
//! successive linearization of link head losses (gradient method) with a
//! dense LU factorization per iteration.

pub mod controls;
pub mod engine;
pub mod error;
pub mod hydraulics;
pub mod model;
pub mod network_engine;

pub use engine::{HydraulicEngine, LinkParam, NodeParam, StatusCode};
pub use error::{EngineError, EngineResult};
pub use hydraulics::SolveOptions;
pub use network_engine::NetworkEngine;
