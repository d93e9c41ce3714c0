//! Query helpers for extracting data from simulation histories.

use hn_results::SimulationHistory;

use crate::error::{AppError, AppResult};

/// Summary of a run's time range and contents.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub time_range: (u64, u64),
    pub snapshot_count: usize,
    pub node_count: usize,
    pub link_count: usize,
}

pub fn get_run_summary(history: &SimulationHistory) -> AppResult<RunSummary> {
    let (Some(first), Some(last)) = (history.timestamps().first(), history.timestamps().last())
    else {
        return Err(AppError::InvalidInput("No snapshots in run".to_string()));
    };
    let (node_count, link_count) = history
        .snapshots()
        .first()
        .map_or((0, 0), |s| (s.nodes.len(), s.links.len()));

    Ok(RunSummary {
        time_range: (*first, *last),
        snapshot_count: history.len(),
        node_count,
        link_count,
    })
}

/// Node ids in solver order.
pub fn list_node_ids(history: &SimulationHistory) -> Vec<String> {
    history
        .snapshots()
        .first()
        .map(|s| s.nodes.keys().cloned().collect())
        .unwrap_or_default()
}

pub fn list_link_ids(history: &SimulationHistory) -> Vec<String> {
    history
        .snapshots()
        .first()
        .map(|s| s.links.keys().cloned().collect())
        .unwrap_or_default()
}

/// Time series of `variable` (`head`, `pressure` or `demand`) at a node.
pub fn extract_node_series(
    history: &SimulationHistory,
    node_id: &str,
    variable: &str,
) -> AppResult<Vec<(u64, f64)>> {
    let pick: fn(&hn_results::NodeResult) -> f64 = match variable {
        "head" => |n| n.head,
        "pressure" => |n| n.pressure,
        "demand" => |n| n.demand,
        _ => {
            return Err(AppError::InvalidInput(format!(
                "Unknown node variable: {variable}"
            )));
        }
    };

    let series: Vec<(u64, f64)> = history
        .iter()
        .filter_map(|(t, snap)| snap.node(node_id).map(|n| (t, pick(n))))
        .collect();
    if series.is_empty() && !history.is_empty() {
        return Err(AppError::InvalidInput(format!("Unknown node: {node_id}")));
    }
    Ok(series)
}

/// Time series of `variable` (`flow`, `velocity`, `headloss` or `status`) on a
/// link. Status is reported as 1 for open and 0 for closed.
pub fn extract_link_series(
    history: &SimulationHistory,
    link_id: &str,
    variable: &str,
) -> AppResult<Vec<(u64, f64)>> {
    let pick: fn(&hn_results::LinkResult) -> f64 = match variable {
        "flow" => |l| l.flow,
        "velocity" => |l| l.velocity,
        "headloss" => |l| l.headloss,
        "status" => |l| if l.status == "Open" { 1.0 } else { 0.0 },
        _ => {
            return Err(AppError::InvalidInput(format!(
                "Unknown link variable: {variable}"
            )));
        }
    };

    let series: Vec<(u64, f64)> = history
        .iter()
        .filter_map(|(t, snap)| snap.link(link_id).map(|l| (t, pick(l))))
        .collect();
    if series.is_empty() && !history.is_empty() {
        return Err(AppError::InvalidInput(format!("Unknown link: {link_id}")));
    }
    Ok(series)
}
