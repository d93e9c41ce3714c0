//! Result data types.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub type RunId = String;

/// Per-node values at one time step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeResult {
    pub head: f64,
    pub pressure: f64,
    pub demand: f64,
}

/// Per-link values at one time step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkResult {
    pub flow: f64,
    pub velocity: f64,
    pub headloss: f64,
    /// `"Open"` or `"Closed"`.
    pub status: String,
}

/// Values of every node and link at one time step, keyed by entity id in
/// solver order.
///
/// A snapshot carries no time of its own: it is paired by index with the
/// timestamp at the same position in
/// [`SimulationHistory::timestamps`](crate::SimulationHistory::timestamps),
/// matching the parallel `timestamps`/`snapshots` arrays of the endpoint reply.
/// Use [`SimulationHistory::get`](crate::SimulationHistory::get) or
/// [`SimulationHistory::iter`](crate::SimulationHistory::iter) to read both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationSnapshot {
    pub nodes: IndexMap<String, NodeResult>,
    pub links: IndexMap<String, LinkResult>,
}

impl SimulationSnapshot {
    pub fn node(&self, id: &str) -> Option<&NodeResult> {
        self.nodes.get(id)
    }

    pub fn link(&self, id: &str) -> Option<&LinkResult> {
        self.links.get(id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: RunId,
    /// Caller-chosen grouping key, e.g. a project id.
    pub network_id: String,
    /// RFC 3339 creation time.
    pub timestamp: String,
    pub engine_version: String,
    pub steps: usize,
}

/// One line of `timeseries.jsonl`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeseriesRecord {
    pub time_s: u64,
    #[serde(flatten)]
    pub snapshot: SimulationSnapshot,
}
