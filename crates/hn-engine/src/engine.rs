//! The stepwise engine interface.

use crate::error::EngineResult;

/// Node quantities an engine reports after each `run`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeParam {
    /// Hydraulic head (m).
    Head,
    /// Head above node elevation (m).
    Pressure,
    /// Actual demand in network flow units. Negative at sources.
    Demand,
}

/// Link quantities an engine reports after each `run`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkParam {
    /// Signed flow in network flow units, positive from start to end node.
    Flow,
    /// Mean velocity (m/s).
    Velocity,
    /// Pipes: head loss per 1000 m. Pumps and valves: head drop across the link.
    Headloss,
    /// Numeric [`StatusCode`].
    Status,
}

/// Link status codes as reported through [`LinkParam::Status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StatusCode {
    /// Pump cannot deliver the head required.
    XHead = 0,
    /// Temporarily closed (check valve with reverse head).
    TempClosed = 1,
    Closed = 2,
    Open = 3,
    /// Control valve actively regulating.
    Active = 4,
}

impl StatusCode {
    /// Smallest code that counts as open.
    pub const OPEN_THRESHOLD: f64 = StatusCode::Open as i32 as f64;

    pub fn code(self) -> f64 {
        self as i32 as f64
    }

    pub fn is_open(self) -> bool {
        self >= StatusCode::Open
    }
}

/// A hydraulic solver driven one event at a time.
///
/// Call order: `open`, `init`, then alternate `run` and `next` until `next`
/// returns 0, then `close`. Values queried between `run` and `next` describe
/// the most recent solution. Indices are `0..node_count()` and
/// `0..link_count()` in input order.
pub trait HydraulicEngine {
    /// Load a network from INP text.
    fn open(&mut self, inp: &str) -> EngineResult<()>;

    /// Reset hydraulic state to time zero.
    fn init(&mut self) -> EngineResult<()>;

    /// Solve hydraulics at the current time; returns that time in seconds.
    fn run(&mut self) -> EngineResult<u64>;

    /// Advance to the next hydraulic event; returns the step in seconds, 0 when done.
    fn next(&mut self) -> EngineResult<u64>;

    fn node_count(&self) -> usize;

    fn link_count(&self) -> usize;

    fn node_id(&self, index: usize) -> EngineResult<&str>;

    fn link_id(&self, index: usize) -> EngineResult<&str>;

    fn node_value(&self, index: usize, param: NodeParam) -> EngineResult<f64>;

    fn link_value(&self, index: usize, param: LinkParam) -> EngineResult<f64>;

    /// Release everything loaded by `open`. Safe to call repeatedly.
    fn close(&mut self);

    fn is_open(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(StatusCode::XHead.code(), 0.0);
        assert_eq!(StatusCode::Active.code(), 4.0);
        assert_eq!(StatusCode::OPEN_THRESHOLD, 3.0);
        assert!(StatusCode::Active.is_open());
        assert!(!StatusCode::TempClosed.is_open());
    }
}
