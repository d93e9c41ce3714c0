//! Simple link controls.
//!
//! Supported statements (keywords case-insensitive):
//!
//! ```text
//! LINK <link> <OPEN|CLOSED|value> AT TIME <time>
//! LINK <link> <OPEN|CLOSED|value> AT CLOCKTIME <time> [AM|PM]
//! LINK <link> <OPEN|CLOSED|value> IF NODE <node> <ABOVE|BELOW> <value>
//! ```
//!
//! A value sets pump speed or valve setting; node values are tank levels or
//! junction pressures.

use std::collections::HashMap;

use hn_inp::parse_time;

use crate::error::{EngineError, EngineResult};
use crate::model::{LinkModel, LinkRole};

const DAY: u64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum ControlAction {
    Open,
    Close,
    Setting(f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Trigger {
    /// Seconds from simulation start.
    AtTime(u64),
    /// Seconds past midnight, every day.
    AtClockTime(u64),
    Above { node: usize, value: f64 },
    Below { node: usize, value: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Control {
    pub link: usize,
    pub action: ControlAction,
    pub trigger: Trigger,
}

impl Control {
    /// Whether a time-based trigger fires at `t`.
    pub fn fires_at(&self, t: u64, start_clocktime: u64) -> bool {
        match self.trigger {
            Trigger::AtTime(at) => at == t,
            Trigger::AtClockTime(at) => (start_clocktime + t) % DAY == at,
            Trigger::Above { .. } | Trigger::Below { .. } => false,
        }
    }

    /// Seconds from `t` until this control next fires on time, if it ever does.
    pub fn time_until(&self, t: u64, start_clocktime: u64) -> Option<u64> {
        match self.trigger {
            Trigger::AtTime(at) => (at > t).then(|| at - t),
            Trigger::AtClockTime(at) => {
                let now = (start_clocktime + t) % DAY;
                let d = (at + DAY - now) % DAY;
                Some(if d == 0 { DAY } else { d })
            }
            Trigger::Above { .. } | Trigger::Below { .. } => None,
        }
    }
}

pub(crate) fn parse_control(
    line: &str,
    node_index: &HashMap<String, usize>,
    link_index: &HashMap<String, usize>,
    links: &[LinkModel],
) -> EngineResult<Control> {
    let bad = || EngineError::input(format!("Invalid control: {line}"));
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let upper: Vec<String> = tokens.iter().map(|t| t.to_ascii_uppercase()).collect();
    if tokens.len() < 5 || upper[0] != "LINK" {
        return Err(bad());
    }
    let link = *link_index
        .get(tokens[1])
        .ok_or_else(|| EngineError::input(format!("Undefined link {} in control", tokens[1])))?;

    let action = match upper[2].as_str() {
        "OPEN" => ControlAction::Open,
        "CLOSED" => ControlAction::Close,
        other => {
            let v: f64 = other.parse().map_err(|_| bad())?;
            if matches!(links[link].role, LinkRole::Pipe { .. }) {
                return Err(EngineError::input(format!(
                    "Control on pipe {} cannot set a value",
                    links[link].id
                )));
            }
            ControlAction::Setting(v)
        }
    };

    let trigger = match (upper[3].as_str(), upper[4].as_str()) {
        ("AT", "TIME") => {
            let at = parse_time(&tokens[5..].join(" ")).ok_or_else(bad)?;
            Trigger::AtTime(at)
        }
        ("AT", "CLOCKTIME") => {
            let at = parse_clocktime(&tokens[5..].join(" ")).ok_or_else(bad)?;
            Trigger::AtClockTime(at)
        }
        ("IF", "NODE") if tokens.len() == 8 => {
            let node = *node_index
                .get(tokens[5])
                .ok_or_else(|| EngineError::input(format!("Undefined node {} in control", tokens[5])))?;
            let value: f64 = tokens[7].parse().map_err(|_| bad())?;
            match upper[6].as_str() {
                "ABOVE" => Trigger::Above { node, value },
                "BELOW" => Trigger::Below { node, value },
                _ => return Err(bad()),
            }
        }
        _ => return Err(bad()),
    };
    Ok(Control {
        link,
        action,
        trigger,
    })
}

/// Parse a time of day (`6`, `6:30`, `6:30 PM`, `18:00`) into seconds past midnight.
pub(crate) fn parse_clocktime(value: &str) -> Option<u64> {
    let mut parts = value.split_whitespace();
    let time = parts.next()?;
    let secs = parse_time(time)?;
    let secs = match parts.next().map(|s| s.to_ascii_uppercase()).as_deref() {
        None => secs,
        Some("AM") if secs >= 12 * 3600 && secs < 13 * 3600 => secs - 12 * 3600,
        Some("AM") => secs,
        Some("PM") if secs < 12 * 3600 => secs + 12 * 3600,
        Some("PM") => secs,
        Some(_) => return None,
    };
    Some(secs % DAY)
}
