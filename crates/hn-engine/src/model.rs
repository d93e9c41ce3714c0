//! Compiled network: parsed INP entities resolved to indices and SI units.

use std::collections::HashMap;

use hn_core::FlowUnits;
use hn_core::constants::G0_MPS2;
use hn_inp::{InpNetwork, parse_time};
use hn_network::{LinkKind, LinkStatus, NetworkSettings, NodeKind, ValveType};
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::Bfs;

use crate::controls::{Control, parse_control};
use crate::error::{EngineError, EngineResult};

/// Hazen-Williams flow exponent.
pub(crate) const HW_EXPONENT: f64 = 1.852;
/// Minor loss coefficient to resistance: 8 / (g * pi^2), per m^4.
const MINOR_LOSS_FACTOR: f64 =
    8.0 / (G0_MPS2 * std::f64::consts::PI * std::f64::consts::PI);
const DEFAULT_STEP: u64 = 3600;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum NodeRole {
    /// Base demand in m^3/s.
    Junction {
        base_demand: f64,
        pattern: Option<usize>,
    },
    Reservoir {
        head: f64,
        pattern: Option<usize>,
    },
    /// Levels in m, cross-section area in m^2.
    Tank {
        init_level: f64,
        min_level: f64,
        max_level: f64,
        area: f64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct NodeModel {
    pub id: String,
    pub elevation: f64,
    pub role: NodeRole,
}

impl NodeModel {
    pub fn is_fixed_head(&self) -> bool {
        !matches!(self.role, NodeRole::Junction { .. })
    }
}

/// Pump head gain as a function of flow at full speed.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PumpCurve {
    /// `h = shutoff - r q^2`, fitted through a single design point.
    PowerLaw { shutoff: f64, r: f64, design_flow: f64 },
    /// Piecewise-linear through `(q m^3/s, h m)` points sorted by flow.
    Points(Vec<(f64, f64)>),
}

impl PumpCurve {
    fn from_points(mut points: Vec<(f64, f64)>) -> Self {
        if let [(q0, h0)] = points[..] {
            let shutoff = 4.0 / 3.0 * h0;
            return PumpCurve::PowerLaw {
                shutoff,
                r: h0 / (3.0 * q0 * q0),
                design_flow: q0,
            };
        }
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        PumpCurve::Points(points)
    }

    /// Head gain and its derivative with respect to flow, at relative speed `speed`.
    pub fn gain(&self, q: f64, speed: f64) -> (f64, f64) {
        match self {
            PumpCurve::PowerLaw { shutoff, r, .. } => {
                (speed * speed * shutoff - r * q * q.abs(), -2.0 * r * q.abs())
            }
            PumpCurve::Points(points) => {
                // Affinity laws: h(q, s) = s^2 f(q / s)
                let s = speed.max(1e-6);
                let (h, slope) = interpolate(points, q / s);
                (s * s * h, s * slope)
            }
        }
    }

    pub fn shutoff(&self, speed: f64) -> f64 {
        self.gain(0.0, speed).0
    }

    pub fn design_flow(&self) -> f64 {
        match self {
            PumpCurve::PowerLaw { design_flow, .. } => *design_flow,
            PumpCurve::Points(points) => points[points.len() / 2].0,
        }
    }
}

/// Value and slope of a piecewise-linear curve, extrapolating the end segments.
fn interpolate(points: &[(f64, f64)], x: f64) -> (f64, f64) {
    let seg = points
        .windows(2)
        .position(|w| x <= w[1].0)
        .unwrap_or(points.len().saturating_sub(2));
    let (x0, y0) = points[seg];
    let (x1, y1) = points[seg + 1];
    let slope = if x1 > x0 { (y1 - y0) / (x1 - x0) } else { 0.0 };
    (y0 + slope * (x - x0), slope)
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LinkRole {
    Pipe {
        length: f64,
        diameter: f64,
        /// Hazen-Williams resistance, `h = r q^1.852`.
        r: f64,
        /// Minor loss resistance, `h = m q^2`.
        m: f64,
        check_valve: bool,
    },
    Pump {
        curve: PumpCurve,
        pattern: Option<usize>,
    },
    Valve {
        valve_type: ValveType,
        diameter: f64,
        minor_loss: f64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LinkModel {
    pub id: String,
    pub from: usize,
    pub to: usize,
    pub role: LinkRole,
    pub initially_open: bool,
    /// Pump speed or valve setting at time zero.
    pub initial_setting: f64,
}

impl LinkModel {
    pub fn diameter(&self) -> Option<f64> {
        match self.role {
            LinkRole::Pipe { diameter, .. } | LinkRole::Valve { diameter, .. } => Some(diameter),
            LinkRole::Pump { .. } => None,
        }
    }
}

/// Minor loss coefficient `K` to resistance `m` in `h = m q^2`.
pub(crate) fn minor_resistance(k: f64, diameter: f64) -> f64 {
    MINOR_LOSS_FACTOR * k / diameter.powi(4)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Times {
    pub duration: u64,
    pub hydraulic_step: u64,
    pub pattern_step: u64,
    pub pattern_start: u64,
    pub start_clocktime: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Model {
    pub nodes: Vec<NodeModel>,
    pub links: Vec<LinkModel>,
    pub patterns: Vec<Vec<f64>>,
    pub controls: Vec<Control>,
    pub times: Times,
    pub units: FlowUnits,
    pub demand_multiplier: f64,
    pub accuracy: Option<f64>,
    pub trials: Option<usize>,
}

impl Model {
    /// Multiplier of `pattern` for the period containing time `t`.
    pub fn multiplier(&self, pattern: Option<usize>, t: u64) -> f64 {
        let Some(values) = pattern.and_then(|p| self.patterns.get(p)) else {
            return 1.0;
        };
        if values.is_empty() {
            return 1.0;
        }
        let period = (t + self.times.pattern_start) / self.times.pattern_step.max(1);
        values[(period % values.len() as u64) as usize]
    }

    /// Flow in m^3/s to network units.
    pub fn from_si(&self, q: f64) -> f64 {
        q / self.units.to_m3ps_factor()
    }
}

/// Resolve a parsed network into a [`Model`], rejecting inputs the engine
/// cannot simulate.
pub(crate) fn compile(network: &InpNetwork) -> EngineResult<Model> {
    let settings = &network.settings;
    let units = flow_units(settings)?;
    if let Some(formula) = settings.option("Headloss")
        && !formula.eq_ignore_ascii_case("H-W")
    {
        return Err(EngineError::input(format!(
            "Headloss formula {formula} is not supported (H-W only)"
        )));
    }
    if network.nodes.is_empty() {
        return Err(EngineError::input("Network has no nodes"));
    }
    let factor = units.to_m3ps_factor();

    let pattern_index: HashMap<String, usize> = settings
        .patterns
        .iter()
        .enumerate()
        .map(|(i, p)| (p.id.to_ascii_uppercase(), i))
        .collect();
    let default_pattern = settings
        .option("Pattern")
        .map(str::to_string)
        .or_else(|| settings.pattern("1").map(|p| p.id.clone()));
    let resolve_pattern = |owner: &str, id: Option<&str>| -> EngineResult<Option<usize>> {
        match id {
            None => Ok(None),
            Some(id) => pattern_index
                .get(&id.to_ascii_uppercase())
                .copied()
                .map(Some)
                .ok_or_else(|| EngineError::input(format!("Undefined pattern {id} in {owner}"))),
        }
    };

    let mut node_index = HashMap::new();
    let mut nodes = Vec::with_capacity(network.nodes.len());
    for (i, node) in network.nodes.iter().enumerate() {
        let id = node.id.as_str();
        node_index.insert(id.to_string(), i);
        let (elevation, role) = match &node.kind {
            NodeKind::Junction {
                base_demand,
                pattern,
            } => {
                let pattern = pattern.as_deref().or(if *base_demand != 0.0 {
                    default_pattern.as_deref()
                } else {
                    None
                });
                (
                    node.elevation,
                    NodeRole::Junction {
                        base_demand: base_demand * factor,
                        pattern: resolve_pattern(id, pattern)?,
                    },
                )
            }
            NodeKind::Reservoir { head, pattern } => (
                *head,
                NodeRole::Reservoir {
                    head: *head,
                    pattern: resolve_pattern(id, pattern.as_deref())?,
                },
            ),
            NodeKind::Tank {
                init_level,
                min_level,
                max_level,
                diameter,
                ..
            } => {
                if !(min_level <= init_level && init_level <= max_level) || *diameter <= 0.0 {
                    return Err(EngineError::input(format!("Illegal tank levels or diameter in tank {id}")));
                }
                (
                    node.elevation,
                    NodeRole::Tank {
                        init_level: *init_level,
                        min_level: *min_level,
                        max_level: *max_level,
                        area: std::f64::consts::PI * diameter * diameter / 4.0,
                    },
                )
            }
        };
        nodes.push(NodeModel {
            id: id.to_string(),
            elevation,
            role,
        });
    }

    let mut link_index = HashMap::new();
    let mut links = Vec::with_capacity(network.links.len());
    for (i, link) in network.links.iter().enumerate() {
        let id = link.id.as_str();
        link_index.insert(id.to_string(), i);
        let lookup = |node: &str| {
            node_index
                .get(node)
                .copied()
                .ok_or_else(|| EngineError::input(format!("Undefined node {node} in link {id}")))
        };
        let from = lookup(link.start_node_id.as_str())?;
        let to = lookup(link.end_node_id.as_str())?;
        if from == to {
            return Err(EngineError::input(format!("Link {id} has identical start and end nodes")));
        }
        let (role, setting) = compile_link(id, &link.kind, settings, factor, &resolve_pattern)?;
        links.push(LinkModel {
            id: id.to_string(),
            from,
            to,
            role,
            initially_open: link.status == LinkStatus::Open,
            initial_setting: setting,
        });
    }

    check_connectivity(&nodes, &links)?;

    let times = Times {
        duration: time_setting(settings, "Duration", 0)?,
        hydraulic_step: time_setting(settings, "Hydraulic Timestep", DEFAULT_STEP)?.max(1),
        pattern_step: time_setting(settings, "Pattern Timestep", DEFAULT_STEP)?.max(1),
        pattern_start: time_setting(settings, "Pattern Start", 0)?,
        start_clocktime: match settings.time("Start ClockTime") {
            Some(v) => crate::controls::parse_clocktime(v)
                .ok_or_else(|| EngineError::input(format!("Invalid Start ClockTime {v}")))?,
            None => 0,
        },
    };

    let controls = settings
        .controls
        .iter()
        .map(|line| parse_control(line, &node_index, &link_index, &links))
        .collect::<EngineResult<Vec<_>>>()?;

    Ok(Model {
        nodes,
        links,
        patterns: settings.patterns.iter().map(|p| p.multipliers.clone()).collect(),
        controls,
        times,
        units,
        demand_multiplier: number_option(settings, "Demand Multiplier")?.unwrap_or(1.0),
        accuracy: number_option(settings, "Accuracy")?,
        trials: number_option(settings, "Trials")?.map(|t| t.max(1.0) as usize),
    })
}

fn compile_link(
    id: &str,
    kind: &LinkKind,
    settings: &NetworkSettings,
    factor: f64,
    resolve_pattern: &dyn Fn(&str, Option<&str>) -> EngineResult<Option<usize>>,
) -> EngineResult<(LinkRole, f64)> {
    match kind {
        LinkKind::Pipe {
            length,
            diameter,
            roughness,
            minor_loss,
            check_valve,
        } => {
            if *length <= 0.0 || *diameter <= 0.0 || *roughness <= 0.0 {
                return Err(EngineError::input(format!(
                    "Illegal length, diameter or roughness in pipe {id}"
                )));
            }
            let d = diameter / 1000.0;
            let r = 10.67 * length / (roughness.powf(HW_EXPONENT) * d.powf(4.87));
            Ok((
                LinkRole::Pipe {
                    length: *length,
                    diameter: d,
                    r,
                    m: minor_resistance(*minor_loss, d),
                    check_valve: *check_valve,
                },
                1.0,
            ))
        }
        LinkKind::Pump {
            curve,
            speed,
            pattern,
            ..
        } => {
            let Some(curve_id) = curve else {
                return Err(EngineError::input(format!("Pump {id} has no head curve")));
            };
            let points = settings
                .curve(curve_id)
                .map(|c| &c.points)
                .filter(|p| !p.is_empty())
                .ok_or_else(|| EngineError::input(format!("Undefined curve {curve_id} in pump {id}")))?;
            let si: Vec<(f64, f64)> = points.iter().map(|(q, h)| (q * factor, *h)).collect();
            if si.iter().any(|(q, h)| *q < 0.0 || *h < 0.0) || (si.len() == 1 && si[0].0 <= 0.0) {
                return Err(EngineError::input(format!("Invalid head curve {curve_id} in pump {id}")));
            }
            Ok((
                LinkRole::Pump {
                    curve: PumpCurve::from_points(si),
                    pattern: resolve_pattern(id, pattern.as_deref())?,
                },
                *speed,
            ))
        }
        LinkKind::Valve {
            valve_type,
            diameter,
            setting,
            minor_loss,
        } => {
            if *diameter <= 0.0 {
                return Err(EngineError::input(format!("Illegal diameter in valve {id}")));
            }
            Ok((
                LinkRole::Valve {
                    valve_type: *valve_type,
                    diameter: diameter / 1000.0,
                    minor_loss: *minor_loss,
                },
                *setting,
            ))
        }
    }
}

fn flow_units(settings: &NetworkSettings) -> EngineResult<FlowUnits> {
    match settings.option("Units") {
        None => Ok(FlowUnits::Lps),
        Some(u) => FlowUnits::parse(u).ok_or_else(|| {
            EngineError::input(format!("Flow units {u} are not supported (SI units only)"))
        }),
    }
}

fn time_setting(settings: &NetworkSettings, key: &str, default: u64) -> EngineResult<u64> {
    match settings.time(key) {
        None => Ok(default),
        Some(v) => parse_time(v).ok_or_else(|| EngineError::input(format!("Invalid {key} value {v}"))),
    }
}

fn number_option(settings: &NetworkSettings, key: &str) -> EngineResult<Option<f64>> {
    settings
        .option(key)
        .map(|v| {
            v.parse::<f64>()
                .ok()
                .filter(|x| x.is_finite() && *x > 0.0)
                .ok_or_else(|| EngineError::input(format!("Invalid {key} value {v}")))
        })
        .transpose()
}

/// Every junction must be reachable from a tank or reservoir through some link.
fn check_connectivity(nodes: &[NodeModel], links: &[LinkModel]) -> EngineResult<()> {
    let mut graph = UnGraph::<(), ()>::with_capacity(nodes.len() + 1, links.len() + nodes.len());
    let idx: Vec<NodeIndex> = nodes.iter().map(|_| graph.add_node(())).collect();
    for link in links {
        graph.add_edge(idx[link.from], idx[link.to], ());
    }
    let source = graph.add_node(());
    let mut has_source = false;
    for (i, node) in nodes.iter().enumerate() {
        if node.is_fixed_head() {
            graph.add_edge(source, idx[i], ());
            has_source = true;
        }
    }
    if !has_source {
        return Err(EngineError::input("Network has no tanks or reservoirs"));
    }

    let mut reached = vec![false; nodes.len()];
    let mut bfs = Bfs::new(&graph, source);
    while let Some(n) = bfs.next(&graph) {
        if n != source {
            reached[n.index()] = true;
        }
    }
    if let Some(i) = reached.iter().position(|r| !r) {
        return Err(EngineError::input(format!(
            "Node {} is not connected to any tank or reservoir",
            nodes[i].id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hn_inp::parse;

    fn compile_text(text: &str) -> EngineResult<Model> {
        compile(&parse(text).unwrap())
    }

    #[test]
    fn compiles_units_and_resistance() {
        let model = compile_text(
            "[JUNCTIONS]\nJ1 10 5\n[RESERVOIRS]\nR1 50\n[PIPES]\nP1 R1 J1 1000 300 100\n[OPTIONS]\nUnits LPS\n",
        )
        .unwrap();
        let NodeRole::Junction { base_demand, .. } = model.nodes[0].role else {
            panic!("expected junction");
        };
        assert!((base_demand - 0.005).abs() < 1e-12);
        let LinkRole::Pipe { r, .. } = model.links[0].role else {
            panic!("expected pipe");
        };
        // 10.67 * 1000 / (100^1.852 * 0.3^4.87)
        assert!((r - 742.31).abs() / 742.31 < 1e-4, "r = {r}");
        assert_eq!(model.nodes[1].elevation, 50.0);
        assert_eq!(model.times.duration, 0);
        assert_eq!(model.times.hydraulic_step, 3600);
    }

    #[test]
    fn rejects_us_units() {
        let err = compile_text("[JUNCTIONS]\nJ1 0\n[RESERVOIRS]\nR1 5\n[PIPES]\nP1 R1 J1 1 1 1\n[OPTIONS]\nUnits GPM\n")
            .unwrap_err();
        assert!(err.to_string().contains("GPM"));
    }

    #[test]
    fn rejects_undefined_node() {
        let err = compile_text("[RESERVOIRS]\nR1 5\n[PIPES]\nP1 R1 J7 1 1 1\n").unwrap_err();
        assert_eq!(err, EngineError::input("Undefined node J7 in link P1"));
    }

    #[test]
    fn rejects_missing_source_and_unreachable_junction() {
        let err = compile_text("[JUNCTIONS]\nJ1 0\nJ2 0\n[PIPES]\nP1 J1 J2 1 1 1\n").unwrap_err();
        assert!(err.to_string().contains("no tanks or reservoirs"));

        let err = compile_text(
            "[JUNCTIONS]\nJ1 0\nJ2 0\n[RESERVOIRS]\nR1 5\n[PIPES]\nP1 R1 J1 1 1 1\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("J2"));
    }

    #[test]
    fn single_point_pump_curve() {
        let curve = PumpCurve::from_points(vec![(0.05, 30.0)]);
        let (h, _) = curve.gain(0.05, 1.0);
        assert!((h - 30.0).abs() < 1e-9);
        assert!((curve.shutoff(1.0) - 40.0).abs() < 1e-9);
        // Affinity: half speed quarters the shutoff head
        assert!((curve.shutoff(0.5) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn multi_point_pump_curve_interpolates() {
        let curve = PumpCurve::from_points(vec![(0.1, 20.0), (0.0, 40.0), (0.2, 0.0)]);
        let (h, slope) = curve.gain(0.05, 1.0);
        assert!((h - 30.0).abs() < 1e-9);
        assert!((slope + 200.0).abs() < 1e-9);
        assert_eq!(curve.design_flow(), 0.1);
    }

    #[test]
    fn pattern_multipliers_wrap() {
        let model = compile_text(
            "[JUNCTIONS]\nJ1 0 1 D\n[RESERVOIRS]\nR1 5\n[PIPES]\nP1 R1 J1 1 1 1\n[PATTERNS]\nD 0.5 1.5\n",
        )
        .unwrap();
        let NodeRole::Junction { pattern, .. } = model.nodes[0].role else {
            panic!("expected junction");
        };
        assert_eq!(model.multiplier(pattern, 0), 0.5);
        assert_eq!(model.multiplier(pattern, 3600), 1.5);
        assert_eq!(model.multiplier(pattern, 7200), 0.5);
        assert_eq!(model.multiplier(None, 3600), 1.0);
    }
}
