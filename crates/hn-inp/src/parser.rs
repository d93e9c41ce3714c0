//! INP text to network entities.
//!
//! The parser is structural only: it checks field counts, numbers and
//! duplicate ids, but leaves reference checks (links to unknown nodes) to the
//! importer and the engine, since sections may appear in any order.

use std::collections::{BTreeMap, HashMap, HashSet};

use hn_core::EntityId;
use hn_network::{
    Coordinate, Curve, LinkKind, LinkStatus, NetworkLink, NetworkNode, NetworkSettings, NodeKind,
    Pattern, SettingEntry, ValveType,
};
use tracing::{debug, warn};

use crate::error::{InpError, InpResult};

/// Option/time keys made of two words.
const TWO_WORD_KEYS: &[&str] = &[
    "hydraulic timestep",
    "quality timestep",
    "pattern timestep",
    "pattern start",
    "report timestep",
    "report start",
    "rule timestep",
    "start clocktime",
    "specific gravity",
    "demand multiplier",
    "demand model",
    "emitter exponent",
    "minimum pressure",
    "required pressure",
    "pressure exponent",
];

/// A parsed network: entities in file order plus pass-through settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InpNetwork {
    pub nodes: Vec<NetworkNode>,
    pub links: Vec<NetworkLink>,
    pub settings: NetworkSettings,
}

impl InpNetwork {
    pub fn node(&self, id: &str) -> Option<&NetworkNode> {
        self.nodes.iter().find(|n| n.id.as_str() == id)
    }

    pub fn link(&self, id: &str) -> Option<&NetworkLink> {
        self.links.iter().find(|l| l.id.as_str() == id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Title,
    Junctions,
    Reservoirs,
    Tanks,
    Pipes,
    Pumps,
    Valves,
    Status,
    Patterns,
    Curves,
    Controls,
    Times,
    Options,
    Coordinates,
    Vertices,
    Ignored,
}

impl Section {
    fn from_header(name: &str) -> Option<Self> {
        let section = match name.to_ascii_uppercase().as_str() {
            "TITLE" => Section::Title,
            "JUNCTIONS" => Section::Junctions,
            "RESERVOIRS" => Section::Reservoirs,
            "TANKS" => Section::Tanks,
            "PIPES" => Section::Pipes,
            "PUMPS" => Section::Pumps,
            "VALVES" => Section::Valves,
            "STATUS" => Section::Status,
            "PATTERNS" => Section::Patterns,
            "CURVES" => Section::Curves,
            "CONTROLS" => Section::Controls,
            "TIMES" => Section::Times,
            "OPTIONS" => Section::Options,
            "COORDINATES" => Section::Coordinates,
            "VERTICES" => Section::Vertices,
            "END" => return None,
            _ => Section::Ignored,
        };
        Some(section)
    }
}

#[derive(Default)]
struct Builder {
    network: InpNetwork,
    ids: HashSet<String>,
    coordinates: HashMap<String, Coordinate>,
    vertices: BTreeMap<String, Vec<Coordinate>>,
    statuses: Vec<(usize, String, String)>,
}

/// Parse INP text.
pub fn parse(text: &str) -> InpResult<InpNetwork> {
    let mut b = Builder::default();
    let mut section: Option<Section> = None;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = raw.trim();
        if let Some(header) = trimmed.strip_prefix('[') {
            let name = header.trim_end_matches(']').trim();
            section = Section::from_header(name);
            match section {
                None => break,
                Some(Section::Ignored) => warn!(line = line_no, section = name, "skipping unsupported INP section"),
                Some(_) => {}
            }
            continue;
        }
        let Some(current) = section else {
            if !trimmed.is_empty() && !trimmed.starts_with(';') {
                return Err(InpError::parse(line_no, "data before first section header"));
            }
            continue;
        };

        if current == Section::Title {
            if !trimmed.is_empty() {
                b.network.settings.title.push(trimmed.to_string());
            }
            continue;
        }
        let data = strip_comment(raw).trim();
        if data.is_empty() {
            continue;
        }
        if current == Section::Controls {
            b.network.settings.controls.push(data.to_string());
            continue;
        }
        let fields: Vec<&str> = data.split_whitespace().collect();
        b.line(current, &fields, line_no)?;
    }

    b.finish()
}

fn strip_comment(line: &str) -> &str {
    line.split_once(';').map_or(line, |(data, _)| data)
}

impl Builder {
    fn line(&mut self, section: Section, f: &[&str], line: usize) -> InpResult<()> {
        match section {
            Section::Junctions => {
                need(f, 2, line)?;
                let kind = NodeKind::Junction {
                    base_demand: opt_num(f, 2, line)?.unwrap_or(0.0),
                    pattern: f.get(3).map(|s| s.to_string()),
                };
                self.node(f[0], kind, num(f[1], line)?, line)
            }
            Section::Reservoirs => {
                need(f, 2, line)?;
                let kind = NodeKind::Reservoir {
                    head: num(f[1], line)?,
                    pattern: f.get(2).map(|s| s.to_string()),
                };
                self.node(f[0], kind, 0.0, line)
            }
            Section::Tanks => {
                need(f, 6, line)?;
                let kind = NodeKind::Tank {
                    init_level: num(f[2], line)?,
                    min_level: num(f[3], line)?,
                    max_level: num(f[4], line)?,
                    diameter: num(f[5], line)?,
                    min_volume: opt_num(f, 6, line)?.unwrap_or(0.0),
                    volume_curve: f.get(7).filter(|s| **s != "*").map(|s| s.to_string()),
                };
                self.node(f[0], kind, num(f[1], line)?, line)
            }
            Section::Pipes => {
                need(f, 6, line)?;
                let flag = f.get(7).map(|s| s.to_ascii_uppercase());
                let kind = LinkKind::Pipe {
                    length: num(f[3], line)?,
                    diameter: num(f[4], line)?,
                    roughness: num(f[5], line)?,
                    minor_loss: opt_num(f, 6, line)?.unwrap_or(0.0),
                    check_valve: flag.as_deref() == Some("CV"),
                };
                let status = match flag.as_deref() {
                    Some("CLOSED") => LinkStatus::Closed,
                    None | Some("OPEN") | Some("CV") => LinkStatus::Open,
                    Some(other) => {
                        return Err(InpError::parse(line, format!("unknown pipe status {other}")));
                    }
                };
                self.link(f, kind, status, line)
            }
            Section::Pumps => {
                need(f, 3, line)?;
                let kind = pump_kind(&f[3..], line)?;
                self.link(f, kind, LinkStatus::Open, line)
            }
            Section::Valves => {
                need(f, 6, line)?;
                let valve_type = ValveType::parse(f[4])
                    .ok_or_else(|| InpError::parse(line, format!("unknown valve type {}", f[4])))?;
                let kind = LinkKind::Valve {
                    valve_type,
                    diameter: num(f[3], line)?,
                    setting: num(f[5], line)?,
                    minor_loss: opt_num(f, 6, line)?.unwrap_or(0.0),
                };
                self.link(f, kind, LinkStatus::Open, line)
            }
            Section::Status => {
                need(f, 2, line)?;
                self.statuses.push((line, f[0].to_string(), f[1].to_string()));
                Ok(())
            }
            Section::Patterns => {
                need(f, 1, line)?;
                let values = f[1..]
                    .iter()
                    .map(|v| num(v, line))
                    .collect::<InpResult<Vec<_>>>()?;
                let patterns = &mut self.network.settings.patterns;
                match patterns.iter_mut().find(|p| p.id == f[0]) {
                    Some(p) => p.multipliers.extend(values),
                    None => patterns.push(Pattern {
                        id: f[0].to_string(),
                        multipliers: values,
                    }),
                }
                Ok(())
            }
            Section::Curves => {
                need(f, 3, line)?;
                let point = (num(f[1], line)?, num(f[2], line)?);
                let curves = &mut self.network.settings.curves;
                match curves.iter_mut().find(|c| c.id == f[0]) {
                    Some(c) => c.points.push(point),
                    None => curves.push(Curve {
                        id: f[0].to_string(),
                        points: vec![point],
                    }),
                }
                Ok(())
            }
            Section::Times => {
                self.network.settings.times.push(setting(f));
                Ok(())
            }
            Section::Options => {
                self.network.settings.options.push(setting(f));
                Ok(())
            }
            Section::Coordinates => {
                need(f, 3, line)?;
                let c = Coordinate::new(num(f[1], line)?, num(f[2], line)?);
                if self.coordinates.insert(f[0].to_string(), c).is_some() {
                    return Err(InpError::parse(line, format!("duplicate coordinates for {}", f[0])));
                }
                Ok(())
            }
            Section::Vertices => {
                need(f, 3, line)?;
                let c = Coordinate::new(num(f[1], line)?, num(f[2], line)?);
                self.vertices.entry(f[0].to_string()).or_default().push(c);
                Ok(())
            }
            Section::Title | Section::Controls | Section::Ignored => Ok(()),
        }
    }

    fn claim(&mut self, id: &str, line: usize) -> InpResult<EntityId> {
        if !self.ids.insert(id.to_string()) {
            return Err(InpError::parse(line, format!("duplicate id {id}")));
        }
        EntityId::new(id).map_err(|e| InpError::parse(line, e.to_string()))
    }

    fn node(&mut self, id: &str, kind: NodeKind, elevation: f64, line: usize) -> InpResult<()> {
        let id = self.claim(id, line)?;
        self.network
            .nodes
            .push(NetworkNode::new(id, kind, Coordinate::default(), elevation));
        Ok(())
    }

    fn link(&mut self, f: &[&str], kind: LinkKind, status: LinkStatus, line: usize) -> InpResult<()> {
        let id = self.claim(f[0], line)?;
        let start = EntityId::new(f[1]).map_err(|e| InpError::parse(line, e.to_string()))?;
        let end = EntityId::new(f[2]).map_err(|e| InpError::parse(line, e.to_string()))?;
        self.network.links.push(NetworkLink {
            id,
            kind,
            start_node_id: start,
            end_node_id: end,
            geometry: Vec::new(),
            status,
            preview: false,
        });
        Ok(())
    }

    fn finish(mut self) -> InpResult<InpNetwork> {
        for (line, id, value) in std::mem::take(&mut self.statuses) {
            let Some(link) = self.network.links.iter_mut().find(|l| l.id.as_str() == id) else {
                return Err(InpError::parse(line, format!("status for unknown link {id}")));
            };
            match value.to_ascii_uppercase().as_str() {
                "OPEN" => link.status = LinkStatus::Open,
                "CLOSED" => link.status = LinkStatus::Closed,
                other => match (&mut link.kind, other.parse::<f64>()) {
                    (LinkKind::Valve { setting, .. }, Ok(v)) => *setting = v,
                    (LinkKind::Pump { speed, .. }, Ok(v)) => *speed = v,
                    _ => {
                        return Err(InpError::parse(line, format!("invalid status {value} for {id}")));
                    }
                },
            }
        }

        for node in &mut self.network.nodes {
            if let Some(c) = self.coordinates.get(node.id.as_str()) {
                node.position = *c;
            }
        }
        let positions: HashMap<&str, Coordinate> = self
            .network
            .nodes
            .iter()
            .map(|n| (n.id.as_str(), n.position))
            .collect();
        let mut geometries = Vec::with_capacity(self.network.links.len());
        for link in &self.network.links {
            let start = positions.get(link.start_node_id.as_str()).copied().unwrap_or_default();
            let end = positions.get(link.end_node_id.as_str()).copied().unwrap_or_default();
            let mut geometry = vec![start];
            if let Some(interior) = self.vertices.remove(link.id.as_str()) {
                geometry.extend(interior);
            }
            geometry.push(end);
            geometries.push(geometry);
        }
        for (link, geometry) in self.network.links.iter_mut().zip(geometries) {
            link.geometry = geometry;
        }
        if let Some(orphan) = self.vertices.keys().next() {
            return Err(InpError::parse(0, format!("vertices for unknown link {orphan}")));
        }

        debug!(
            nodes = self.network.nodes.len(),
            links = self.network.links.len(),
            patterns = self.network.settings.patterns.len(),
            "INP parsed"
        );
        Ok(self.network)
    }
}

fn pump_kind(params: &[&str], line: usize) -> InpResult<LinkKind> {
    let mut curve = None;
    let mut power = None;
    let mut speed = 1.0;
    let mut pattern = None;
    for pair in params.chunks(2) {
        let [key, value] = pair else {
            return Err(InpError::parse(line, "pump parameter without value"));
        };
        match key.to_ascii_uppercase().as_str() {
            "HEAD" => curve = Some(value.to_string()),
            "POWER" => power = Some(num(value, line)?),
            "SPEED" => speed = num(value, line)?,
            "PATTERN" => pattern = Some(value.to_string()),
            other => return Err(InpError::parse(line, format!("unknown pump parameter {other}"))),
        }
    }
    Ok(LinkKind::Pump {
        curve,
        power,
        speed,
        pattern,
    })
}

fn setting(f: &[&str]) -> SettingEntry {
    let split = if f.len() > 2
        && TWO_WORD_KEYS.contains(&format!("{} {}", f[0], f[1]).to_ascii_lowercase().as_str())
    {
        2
    } else {
        1
    };
    let split = split.min(f.len());
    SettingEntry::new(f[..split].join(" "), f[split..].join(" "))
}

fn need(f: &[&str], n: usize, line: usize) -> InpResult<()> {
    if f.len() < n {
        return Err(InpError::parse(
            line,
            format!("expected at least {n} fields, found {}", f.len()),
        ));
    }
    Ok(())
}

fn num(s: &str, line: usize) -> InpResult<f64> {
    let v: f64 = s
        .parse()
        .map_err(|_| InpError::parse(line, format!("invalid number {s}")))?;
    if !v.is_finite() {
        return Err(InpError::parse(line, format!("non-finite number {s}")));
    }
    Ok(v)
}

fn opt_num(f: &[&str], i: usize, line: usize) -> InpResult<Option<f64>> {
    f.get(i).map(|s| num(s, line)).transpose()
}

/// Parse an INP time value into seconds.
///
/// Accepts `h:mm[:ss]`, a bare number of hours, or a number followed by a
/// unit (`SEC`, `MIN`, `HOURS`, `DAYS`, and their abbreviations).
pub fn parse_time(value: &str) -> Option<u64> {
    let mut parts = value.split_whitespace();
    let amount = parts.next()?;
    let unit = parts.next();

    if amount.contains(':') {
        let mut secs = 0.0;
        let mut scale = 3600.0;
        for field in amount.split(':') {
            let v: f64 = field.parse().ok()?;
            secs += v * scale;
            scale /= 60.0;
        }
        return to_secs(secs);
    }

    let v: f64 = amount.parse().ok()?;
    let scale = match unit.map(|u| u.to_ascii_uppercase()) {
        None => 3600.0,
        Some(u) if u.starts_with("SEC") => 1.0,
        Some(u) if u.starts_with("MIN") => 60.0,
        Some(u) if u.starts_with("HOUR") => 3600.0,
        Some(u) if u.starts_with("DAY") => 86_400.0,
        Some(_) => return None,
    };
    to_secs(v * scale)
}

fn to_secs(v: f64) -> Option<u64> {
    (v.is_finite() && v >= 0.0).then(|| v.round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
[TITLE]
Two junctions

[JUNCTIONS]
;ID  Elev  Demand  Pattern
J1   100   0
J2   80    1.5     PAT1   ; residential

[RESERVOIRS]
R1   120

[PIPES]
P1   R1  J1  100  300  130  0  Open
P2   J1  J2  250  200  120  0  CV

[PUMPS]
PU1  J2  J1  HEAD C1  SPEED 1.2

[STATUS]
PU1  Closed

[PATTERNS]
PAT1 1.0 1.2
PAT1 0.8

[CURVES]
C1   10  40

[TIMES]
Duration             24:00
Hydraulic Timestep   1:00

[OPTIONS]
Units   LPS

[COORDINATES]
J1  0   0
J2  10  0
R1  -10 0

[VERTICES]
P2  5   2

[END]
";

    #[test]
    fn parses_sample_network() {
        let net = parse(SAMPLE).unwrap();
        assert_eq!(net.nodes.len(), 3);
        assert_eq!(net.links.len(), 3);
        assert_eq!(net.settings.title, vec!["Two junctions".to_string()]);

        let j2 = net.node("J2").unwrap();
        assert_eq!(j2.elevation, 80.0);
        assert_eq!(
            j2.kind,
            NodeKind::Junction {
                base_demand: 1.5,
                pattern: Some("PAT1".into())
            }
        );
        assert_eq!(j2.position, Coordinate::new(10.0, 0.0));

        let p2 = net.link("P2").unwrap();
        assert!(matches!(p2.kind, LinkKind::Pipe { check_valve: true, .. }));
        assert_eq!(p2.geometry.len(), 3);
        assert_eq!(p2.geometry[1], Coordinate::new(5.0, 2.0));

        let pu1 = net.link("PU1").unwrap();
        assert_eq!(pu1.status, LinkStatus::Closed);
        assert!(matches!(&pu1.kind, LinkKind::Pump { speed, .. } if (*speed - 1.2).abs() < 1e-12));

        assert_eq!(net.settings.pattern("PAT1").unwrap().multipliers, vec![1.0, 1.2, 0.8]);
        assert_eq!(net.settings.time("Hydraulic Timestep"), Some("1:00"));
        assert_eq!(net.settings.option("units"), Some("LPS"));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = parse("[JUNCTIONS]\nJ1 0\n[RESERVOIRS]\nJ1 10\n").unwrap_err();
        assert_eq!(
            err,
            InpError::Parse {
                line: 4,
                message: "duplicate id J1".into()
            }
        );
    }

    #[test]
    fn bad_number_reports_line() {
        let err = parse("[JUNCTIONS]\n\nJ1 abc\n").unwrap_err();
        assert!(matches!(err, InpError::Parse { line: 3, .. }));
    }

    #[test]
    fn unknown_sections_are_skipped() {
        let net = parse("[JUNCTIONS]\nJ1 0\n[ENERGY]\nGlobal Efficiency 75\n[END]\nJunk\n").unwrap();
        assert_eq!(net.nodes.len(), 1);
    }

    #[test]
    fn time_formats() {
        assert_eq!(parse_time("24:00"), Some(86_400));
        assert_eq!(parse_time("0:30:15"), Some(1_815));
        assert_eq!(parse_time("6"), Some(21_600));
        assert_eq!(parse_time("15 MIN"), Some(900));
        assert_eq!(parse_time("2 days"), Some(172_800));
        assert_eq!(parse_time("soon"), None);
        assert_eq!(parse_time("-1"), None);
    }

    #[test]
    fn two_word_option_keys() {
        assert_eq!(
            setting(&["Pattern", "Timestep", "2:00"]),
            SettingEntry::new("Pattern Timestep", "2:00")
        );
        assert_eq!(
            setting(&["Unbalanced", "Continue", "10"]),
            SettingEntry::new("Unbalanced", "Continue 10")
        );
    }
}
