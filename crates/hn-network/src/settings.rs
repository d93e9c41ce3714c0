//! Global network settings carried through to the solver unchanged.

use serde::{Deserialize, Serialize};

/// One `key value` line of an `[OPTIONS]` or `[TIMES]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingEntry {
    pub key: String,
    pub value: String,
}

impl SettingEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Time pattern of multipliers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub id: String,
    pub multipliers: Vec<f64>,
}

/// X/Y data curve (pump head curve, tank volume curve, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    pub id: String,
    pub points: Vec<(f64, f64)>,
}

/// Patterns, curves, controls, options and times.
///
/// The topology engine never interprets these; entries keep their order so
/// that serialization is a faithful pass-through.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NetworkSettings {
    #[serde(default)]
    pub title: Vec<String>,
    #[serde(default)]
    pub options: Vec<SettingEntry>,
    #[serde(default)]
    pub times: Vec<SettingEntry>,
    #[serde(default)]
    pub patterns: Vec<Pattern>,
    #[serde(default)]
    pub curves: Vec<Curve>,
    /// Raw `[CONTROLS]` statements.
    #[serde(default)]
    pub controls: Vec<String>,
}

impl NetworkSettings {
    pub fn option(&self, key: &str) -> Option<&str> {
        lookup(&self.options, key)
    }

    pub fn time(&self, key: &str) -> Option<&str> {
        lookup(&self.times, key)
    }

    pub fn set_option(&mut self, key: &str, value: impl Into<String>) {
        upsert(&mut self.options, key, value.into());
    }

    pub fn set_time(&mut self, key: &str, value: impl Into<String>) {
        upsert(&mut self.times, key, value.into());
    }

    pub fn pattern(&self, id: &str) -> Option<&Pattern> {
        self.patterns.iter().find(|p| p.id.eq_ignore_ascii_case(id))
    }

    pub fn curve(&self, id: &str) -> Option<&Curve> {
        self.curves.iter().find(|c| c.id.eq_ignore_ascii_case(id))
    }
}

fn lookup<'a>(entries: &'a [SettingEntry], key: &str) -> Option<&'a str> {
    entries
        .iter()
        .find(|e| e.key.eq_ignore_ascii_case(key))
        .map(|e| e.value.as_str())
}

fn upsert(entries: &mut Vec<SettingEntry>, key: &str, value: String) {
    if let Some(entry) = entries.iter_mut().find(|e| e.key.eq_ignore_ascii_case(key)) {
        entry.value = value;
    } else {
        entries.push(SettingEntry::new(key, value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_case_insensitive() {
        let mut settings = NetworkSettings::default();
        settings.set_time("Duration", "24:00");
        settings.set_time("DURATION", "12:00");
        assert_eq!(settings.times.len(), 1);
        assert_eq!(settings.time("duration"), Some("12:00"));
        assert_eq!(settings.option("Units"), None);
    }
}
