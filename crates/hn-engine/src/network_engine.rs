//! Reference [`HydraulicEngine`] implementation.

use hn_core::{m, m3ps, mean_velocity};
use tracing::{debug, info};

use crate::controls::{ControlAction, Trigger};
use crate::engine::{HydraulicEngine, LinkParam, NodeParam, StatusCode};
use crate::error::{EngineError, EngineResult};
use crate::hydraulics::{HydraulicState, SolveOptions, solve};
use crate::model::{LinkRole, Model, NodeRole, compile};

/// Extended-period hydraulic engine over a compiled network.
#[derive(Debug, Clone, Default)]
pub struct NetworkEngine {
    options: SolveOptions,
    model: Option<Model>,
    state: Option<HydraulicState>,
    time: u64,
    total_iterations: usize,
}

impl NetworkEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: SolveOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Current simulation time in seconds.
    pub fn time(&self) -> u64 {
        self.time
    }

    /// Solver iterations spent since `init`.
    pub fn total_iterations(&self) -> usize {
        self.total_iterations
    }

    fn model(&self) -> EngineResult<&Model> {
        self.model.as_ref().ok_or(EngineError::NotOpen)
    }

    fn loaded(&self) -> EngineResult<(&Model, &HydraulicState)> {
        let model = self.model()?;
        let state = self.state.as_ref().ok_or(EngineError::NotInitialized)?;
        Ok((model, state))
    }

    fn effective_options(&self, model: &Model) -> SolveOptions {
        SolveOptions {
            max_iterations: model.trials.unwrap_or(self.options.max_iterations),
            accuracy: model.accuracy.unwrap_or(self.options.accuracy),
            ..self.options
        }
    }
}

/// Set fixed heads and demands for time `t`.
fn apply_boundary(model: &Model, state: &mut HydraulicState, t: u64) {
    for (i, node) in model.nodes.iter().enumerate() {
        match node.role {
            NodeRole::Junction {
                base_demand,
                pattern,
            } => {
                state.demands[i] = base_demand * model.multiplier(pattern, t) * model.demand_multiplier;
            }
            NodeRole::Reservoir { head, pattern } => {
                state.heads[i] = head * model.multiplier(pattern, t);
                state.demands[i] = 0.0;
            }
            NodeRole::Tank { .. } => {
                state.heads[i] = node.elevation + state.levels[i];
                state.demands[i] = 0.0;
            }
        }
    }
    for (k, link) in model.links.iter().enumerate() {
        if let LinkRole::Pump {
            pattern: Some(p), ..
        } = link.role
        {
            state.settings[k] = model.multiplier(Some(p), t);
        }
    }
}

/// Apply controls triggered at time `t` by clock or node values.
fn apply_controls(model: &Model, state: &mut HydraulicState, t: u64) {
    for control in &model.controls {
        let fires = match control.trigger {
            Trigger::AtTime(_) | Trigger::AtClockTime(_) => {
                control.fires_at(t, model.times.start_clocktime)
            }
            Trigger::Above { node, value } => node_control_value(model, state, node) > value,
            Trigger::Below { node, value } => node_control_value(model, state, node) < value,
        };
        if !fires {
            continue;
        }
        let k = control.link;
        match control.action {
            ControlAction::Open => state.user_open[k] = true,
            ControlAction::Close => state.user_open[k] = false,
            ControlAction::Setting(v) => {
                state.settings[k] = v;
                state.user_open[k] = !matches!(model.links[k].role, LinkRole::Pump { .. }) || v > 0.0;
            }
        }
        let status = if state.user_open[k] {
            StatusCode::Open
        } else {
            StatusCode::Closed
        };
        if state.status[k] != status {
            debug!(link = %model.links[k].id, t, status = ?status, "control applied");
        }
        state.status[k] = status;
    }
}

/// Tank level, or pressure from the most recent solve for other nodes.
fn node_control_value(model: &Model, state: &HydraulicState, node: usize) -> f64 {
    match model.nodes[node].role {
        NodeRole::Tank { .. } => state.levels[node],
        _ => state.heads[node] - model.nodes[node].elevation,
    }
}

/// Seconds until a tank fills, empties, or crosses a control level at the current inflow.
fn tank_event_time(model: &Model, state: &HydraulicState) -> Option<u64> {
    let mut best: Option<f64> = None;
    let mut consider = |secs: f64| {
        if secs.is_finite() && secs > 0.0 {
            best = Some(best.map_or(secs, |b: f64| b.min(secs)));
        }
    };
    for (i, node) in model.nodes.iter().enumerate() {
        let NodeRole::Tank {
            min_level,
            max_level,
            area,
            ..
        } = node.role
        else {
            continue;
        };
        let inflow = state.net_inflow(model, i);
        let level = state.levels[i];
        if inflow > 0.0 {
            consider((max_level - level) * area / inflow);
        } else if inflow < 0.0 {
            consider((level - min_level) * area / -inflow);
        }
        for control in &model.controls {
            if let Trigger::Above { node, value } | Trigger::Below { node, value } = control.trigger
                && node == i
                && inflow != 0.0
            {
                consider((value - level) * area / inflow);
            }
        }
    }
    best.map(|s| s.ceil() as u64)
}

impl HydraulicEngine for NetworkEngine {
    fn open(&mut self, inp: &str) -> EngineResult<()> {
        if self.model.is_some() {
            return Err(EngineError::AlreadyOpen);
        }
        let network = hn_inp::parse(inp)?;
        let model = compile(&network)?;
        info!(
            nodes = model.nodes.len(),
            links = model.links.len(),
            duration = model.times.duration,
            "engine opened"
        );
        self.model = Some(model);
        Ok(())
    }

    fn init(&mut self) -> EngineResult<()> {
        let model = self.model()?;
        self.state = Some(HydraulicState::initial(model));
        self.time = 0;
        self.total_iterations = 0;
        Ok(())
    }

    fn run(&mut self) -> EngineResult<u64> {
        let opts = self.effective_options(self.model()?);
        let t = self.time;
        let model = self.model.as_ref().ok_or(EngineError::NotOpen)?;
        let state = self.state.as_mut().ok_or(EngineError::NotInitialized)?;
        apply_boundary(model, state, t);
        apply_controls(model, state, t);
        let report = solve(model, state, &opts).map_err(|e| match e {
            EngineError::Unbalanced { what } => EngineError::Unbalanced {
                what: format!("at {t} s: {what}"),
            },
            other => other,
        })?;
        self.total_iterations += report.iterations;
        debug!(t, iterations = report.iterations, "hydraulics solved");
        Ok(t)
    }

    fn next(&mut self) -> EngineResult<u64> {
        let (model, state) = self.loaded()?;
        let t = self.time;
        let times = model.times;
        if t >= times.duration {
            return Ok(0);
        }
        let mut dt = times.duration - t;
        dt = dt.min(times.hydraulic_step - t % times.hydraulic_step);
        if !model.patterns.is_empty() {
            dt = dt.min(times.pattern_step - (t + times.pattern_start) % times.pattern_step);
        }
        for control in &model.controls {
            if let Some(until) = control.time_until(t, times.start_clocktime) {
                dt = dt.min(until);
            }
        }
        if let Some(until) = tank_event_time(model, state) {
            dt = dt.min(until);
        }
        let dt = dt.max(1);

        let model = self.model.as_ref().ok_or(EngineError::NotOpen)?;
        let state = self.state.as_mut().ok_or(EngineError::NotInitialized)?;
        for (i, node) in model.nodes.iter().enumerate() {
            if let NodeRole::Tank {
                min_level,
                max_level,
                area,
                ..
            } = node.role
            {
                let inflow = state.net_inflow(model, i);
                state.levels[i] = (state.levels[i] + inflow * dt as f64 / area).clamp(min_level, max_level);
            }
        }
        self.time = t + dt;
        Ok(dt)
    }

    fn node_count(&self) -> usize {
        self.model.as_ref().map_or(0, |m| m.nodes.len())
    }

    fn link_count(&self) -> usize {
        self.model.as_ref().map_or(0, |m| m.links.len())
    }

    fn node_id(&self, index: usize) -> EngineResult<&str> {
        let model = self.model()?;
        model
            .nodes
            .get(index)
            .map(|n| n.id.as_str())
            .ok_or_else(|| EngineError::InvalidIndex {
                what: format!("node {index}"),
            })
    }

    fn link_id(&self, index: usize) -> EngineResult<&str> {
        let model = self.model()?;
        model
            .links
            .get(index)
            .map(|l| l.id.as_str())
            .ok_or_else(|| EngineError::InvalidIndex {
                what: format!("link {index}"),
            })
    }

    fn node_value(&self, index: usize, param: NodeParam) -> EngineResult<f64> {
        let (model, state) = self.loaded()?;
        let node = model.nodes.get(index).ok_or_else(|| EngineError::InvalidIndex {
            what: format!("node {index}"),
        })?;
        let value = match param {
            NodeParam::Head => state.heads[index],
            NodeParam::Pressure => state.heads[index] - node.elevation,
            NodeParam::Demand => match node.role {
                NodeRole::Junction { .. } => model.from_si(state.demands[index]),
                _ => model.from_si(state.net_inflow(model, index)),
            },
        };
        Ok(value)
    }

    fn link_value(&self, index: usize, param: LinkParam) -> EngineResult<f64> {
        let (model, state) = self.loaded()?;
        let link = model.links.get(index).ok_or_else(|| EngineError::InvalidIndex {
            what: format!("link {index}"),
        })?;
        let q = state.flows[index];
        let dh = state.heads[link.from] - state.heads[link.to];
        let value = match param {
            LinkParam::Flow => model.from_si(q),
            LinkParam::Velocity => link
                .diameter()
                .map_or(0.0, |d| mean_velocity(m3ps(q), m(d)).value),
            LinkParam::Headloss => match link.role {
                LinkRole::Pipe { length, .. } => dh.abs() * 1000.0 / length,
                _ => dh,
            },
            LinkParam::Status => state.status[index].code(),
        };
        Ok(value)
    }

    fn close(&mut self) {
        if self.model.take().is_some() {
            debug!("engine closed");
        }
        self.state = None;
        self.time = 0;
    }

    fn is_open(&self) -> bool {
        self.model.is_some()
    }
}
