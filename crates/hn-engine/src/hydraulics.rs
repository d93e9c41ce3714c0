//! Network hydraulic solve by successive linearization (gradient method).
//!
//! Unknowns are junction heads. Each iteration linearizes every link's
//! head-loss relation around its current flow, assembles the nodal
//! continuity system, solves it with an LU factorization and updates the
//! flows from the new heads. Check valves and pumps change status between
//! iterations when the head across them reverses.

use nalgebra::{DMatrix, DVector};
use tracing::{debug, warn};

use crate::engine::StatusCode;
use crate::error::{EngineError, EngineResult};
use crate::model::{HW_EXPONENT, LinkRole, Model, NodeRole, minor_resistance};

/// Resistance of a closed link (`h = R q`).
const CLOSED_RESISTANCE: f64 = 1e8;
/// Velocity used to seed initial pipe flows (m/s).
const SEED_VELOCITY: f64 = 0.3048;

/// Solver configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveOptions {
    /// Maximum iterations per solve
    pub max_iterations: usize,
    /// Convergence limit on sum of |flow change| / sum of |flow|
    pub accuracy: f64,
    /// Lower bound on a link's head-loss gradient, keeps the system well posed at zero flow
    pub min_gradient: f64,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            accuracy: 1e-3,
            min_gradient: 1e-7,
        }
    }
}

/// Mutable hydraulic state of an open network.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct HydraulicState {
    /// Node heads (m).
    pub heads: Vec<f64>,
    /// Link flows (m^3/s).
    pub flows: Vec<f64>,
    /// Current actual demand per node (m^3/s); zero at fixed-head nodes.
    pub demands: Vec<f64>,
    /// Tank levels (m); zero for other nodes.
    pub levels: Vec<f64>,
    /// Status set by input or controls.
    pub user_open: Vec<bool>,
    /// Pump speed or valve setting.
    pub settings: Vec<f64>,
    /// Status resulting from the last solve.
    pub status: Vec<StatusCode>,
}

impl HydraulicState {
    pub fn initial(model: &Model) -> Self {
        let levels: Vec<f64> = model
            .nodes
            .iter()
            .map(|n| match n.role {
                NodeRole::Tank { init_level, .. } => init_level,
                _ => 0.0,
            })
            .collect();
        let heads = model
            .nodes
            .iter()
            .zip(&levels)
            .map(|(n, level)| n.elevation + level)
            .collect();
        let flows = model
            .links
            .iter()
            .map(|l| match &l.role {
                LinkRole::Pump { curve, .. } => curve.design_flow(),
                _ => l
                    .diameter()
                    .map_or(0.0, |d| SEED_VELOCITY * std::f64::consts::PI * d * d / 4.0),
            })
            .collect();
        let user_open: Vec<bool> = model.links.iter().map(|l| l.initially_open).collect();
        let status = user_open
            .iter()
            .map(|open| if *open { StatusCode::Open } else { StatusCode::Closed })
            .collect();
        Self {
            heads,
            flows,
            demands: vec![0.0; model.nodes.len()],
            levels,
            user_open,
            settings: model.links.iter().map(|l| l.initial_setting).collect(),
            status,
        }
    }

    /// Net flow into node `i` from its links (m^3/s).
    pub fn net_inflow(&self, model: &Model, i: usize) -> f64 {
        model
            .links
            .iter()
            .zip(&self.flows)
            .map(|(l, q)| {
                if l.to == i {
                    *q
                } else if l.from == i {
                    -*q
                } else {
                    0.0
                }
            })
            .sum()
    }
}

/// Per-iteration linearization of one link: `q_new = c + p (H_from - H_to)`.
struct Linearized {
    p: f64,
    c: f64,
}

fn linearize(model: &Model, state: &HydraulicState, k: usize, opts: &SolveOptions) -> Linearized {
    let q = state.flows[k];
    if !state.status[k].is_open() {
        return Linearized {
            p: 1.0 / CLOSED_RESISTANCE,
            c: 0.0,
        };
    }
    // Head loss h(q) from start to end node and its gradient
    let (h, g) = match &model.links[k].role {
        LinkRole::Pipe { r, m, .. } => {
            let aq = q.abs();
            (
                r * q * aq.powf(HW_EXPONENT - 1.0) + m * q * aq,
                HW_EXPONENT * r * aq.powf(HW_EXPONENT - 1.0) + 2.0 * m * aq,
            )
        }
        LinkRole::Pump { curve, .. } => {
            let (gain, slope) = curve.gain(q, state.settings[k]);
            (-gain, -slope)
        }
        LinkRole::Valve {
            valve_type,
            diameter,
            minor_loss,
        } => {
            let k_value = if *valve_type == hn_network::ValveType::TCV {
                state.settings[k]
            } else {
                *minor_loss
            };
            let m = minor_resistance(k_value, *diameter);
            (m * q * q.abs(), 2.0 * m * q.abs())
        }
    };
    let g = g.max(opts.min_gradient);
    Linearized {
        p: 1.0 / g,
        c: q - h / g,
    }
}

/// Outcome of one converged solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SolveReport {
    pub iterations: usize,
    pub relative_change: f64,
}

/// Solve junction heads and link flows for the current demands and fixed heads.
///
/// `state.heads` must already hold the heads of all fixed-head nodes and
/// `state.demands` the junction demands.
pub(crate) fn solve(
    model: &Model,
    state: &mut HydraulicState,
    opts: &SolveOptions,
) -> EngineResult<SolveReport> {
    let row: Vec<Option<usize>> = {
        let mut next = 0;
        model
            .nodes
            .iter()
            .map(|n| {
                (!n.is_fixed_head()).then(|| {
                    next += 1;
                    next - 1
                })
            })
            .collect()
    };
    let n = row.iter().flatten().count();
    let mut relative_change = f64::INFINITY;

    for iteration in 1..=opts.max_iterations {
        let lin: Vec<Linearized> = (0..model.links.len())
            .map(|k| linearize(model, state, k, opts))
            .collect();

        if n > 0 {
            let mut a = DMatrix::<f64>::zeros(n, n);
            let mut b = DVector::<f64>::zeros(n);
            for (i, r) in row.iter().enumerate() {
                if let Some(r) = r {
                    b[*r] = -state.demands[i];
                }
            }
            for (link, l) in model.links.iter().zip(&lin) {
                for (this, other, sign) in [(link.from, link.to, -1.0), (link.to, link.from, 1.0)] {
                    let Some(ri) = row[this] else { continue };
                    a[(ri, ri)] += l.p;
                    b[ri] += sign * l.c;
                    match row[other] {
                        Some(rj) => a[(ri, rj)] -= l.p,
                        None => b[ri] += l.p * state.heads[other],
                    }
                }
            }
            let x = a.lu().solve(&b).ok_or_else(|| EngineError::Numeric {
                what: "singular network matrix".to_string(),
            })?;
            for (i, r) in row.iter().enumerate() {
                if let Some(r) = r {
                    state.heads[i] = x[*r];
                }
            }
        }

        let mut change = 0.0;
        let mut total = 0.0;
        for (k, (link, l)) in model.links.iter().zip(&lin).enumerate() {
            let q_new = if state.status[k].is_open() {
                l.c + l.p * (state.heads[link.from] - state.heads[link.to])
            } else {
                0.0
            };
            change += (q_new - state.flows[k]).abs();
            total += q_new.abs();
            state.flows[k] = q_new;
        }
        relative_change = if total > 0.0 { change / total } else { 0.0 };

        let status_changed = update_status(model, state);
        if relative_change <= opts.accuracy && !status_changed {
            debug!(iterations = iteration, relative_change, "hydraulics converged");
            return Ok(SolveReport {
                iterations: iteration,
                relative_change,
            });
        }
    }

    warn!(relative_change, max_iterations = opts.max_iterations, "hydraulics did not converge");
    Err(EngineError::Unbalanced {
        what: format!(
            "relative flow change {relative_change:.6} after {} trials",
            opts.max_iterations
        ),
    })
}

/// Re-evaluate check valves and pumps against the current heads.
/// Returns true if any status changed.
fn update_status(model: &Model, state: &mut HydraulicState) -> bool {
    let mut changed = false;
    for (k, link) in model.links.iter().enumerate() {
        let before = state.status[k];
        let dh = state.heads[link.from] - state.heads[link.to];
        let after = if !state.user_open[k] {
            StatusCode::Closed
        } else {
            match &link.role {
                LinkRole::Pipe {
                    check_valve: true, ..
                } => {
                    if before == StatusCode::TempClosed {
                        if dh > 0.0 { StatusCode::Open } else { before }
                    } else if state.flows[k] < 0.0 {
                        StatusCode::TempClosed
                    } else {
                        StatusCode::Open
                    }
                }
                LinkRole::Pump { curve, .. } => {
                    let shutoff = curve.shutoff(state.settings[k]);
                    if state.settings[k] <= 0.0 {
                        StatusCode::Closed
                    } else if -dh > shutoff {
                        StatusCode::XHead
                    } else {
                        StatusCode::Open
                    }
                }
                _ => StatusCode::Open,
            }
        };
        if after != before {
            state.status[k] = after;
            if !after.is_open() {
                state.flows[k] = 0.0;
            }
            changed = true;
        }
    }
    changed
}
