//! Per-step result extraction from an engine.

use hn_core::round_to;
use hn_engine::{EngineResult, HydraulicEngine, LinkParam, NodeParam, StatusCode};
use hn_results::{LinkResult, NodeResult, SimulationSnapshot};

/// Pressure and demand display precision.
const VALUE_DECIMALS: u32 = 2;
const HEADLOSS_DECIMALS: u32 = 4;

/// Display label for a numeric engine status code.
pub fn status_label(code: f64) -> &'static str {
    if code >= StatusCode::OPEN_THRESHOLD {
        "Open"
    } else {
        "Closed"
    }
}

/// Query every node and link of `engine` for the current solution.
///
/// `node_ids` and `link_ids` are the engine's ids in index order. Head, flow
/// and velocity are never rounded.
pub fn extract_snapshot<E: HydraulicEngine + ?Sized>(
    engine: &E,
    node_ids: &[String],
    link_ids: &[String],
    round: bool,
) -> EngineResult<SimulationSnapshot> {
    let rounded = |v: f64, decimals| if round { round_to(v, decimals) } else { v };
    let mut snapshot = SimulationSnapshot::default();
    snapshot.nodes.reserve(node_ids.len());
    snapshot.links.reserve(link_ids.len());

    for (i, id) in node_ids.iter().enumerate() {
        let result = NodeResult {
            head: engine.node_value(i, NodeParam::Head)?,
            pressure: rounded(engine.node_value(i, NodeParam::Pressure)?, VALUE_DECIMALS),
            demand: rounded(engine.node_value(i, NodeParam::Demand)?, VALUE_DECIMALS),
        };
        snapshot.nodes.insert(id.clone(), result);
    }
    for (i, id) in link_ids.iter().enumerate() {
        let result = LinkResult {
            flow: engine.link_value(i, LinkParam::Flow)?,
            velocity: engine.link_value(i, LinkParam::Velocity)?,
            headloss: rounded(engine.link_value(i, LinkParam::Headloss)?, HEADLOSS_DECIMALS),
            status: status_label(engine.link_value(i, LinkParam::Status)?).to_string(),
        };
        snapshot.links.insert(id.clone(), result);
    }
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_threshold() {
        assert_eq!(status_label(StatusCode::XHead.code()), "Closed");
        assert_eq!(status_label(StatusCode::TempClosed.code()), "Closed");
        assert_eq!(status_label(StatusCode::Closed.code()), "Closed");
        assert_eq!(status_label(StatusCode::Open.code()), "Open");
        assert_eq!(status_label(StatusCode::Active.code()), "Open");
        assert_eq!(status_label(2.999), "Closed");
    }
}
