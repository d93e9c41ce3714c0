//! Ordered time series of simulation snapshots.

use serde::{Deserialize, Serialize};

use crate::types::{SimulationSnapshot, TimeseriesRecord};
use crate::{ResultsError, ResultsResult};

/// Strictly increasing timestamps (seconds from simulation start) paired 1:1
/// with snapshots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawHistory")]
pub struct SimulationHistory {
    timestamps: Vec<u64>,
    snapshots: Vec<SimulationSnapshot>,
}

#[derive(Deserialize)]
struct RawHistory {
    timestamps: Vec<u64>,
    snapshots: Vec<SimulationSnapshot>,
}

impl TryFrom<RawHistory> for SimulationHistory {
    type Error = ResultsError;

    fn try_from(raw: RawHistory) -> ResultsResult<Self> {
        Self::from_parts(raw.timestamps, raw.snapshots)
    }
}

impl SimulationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from parallel vectors, checking length and ordering.
    pub fn from_parts(
        timestamps: Vec<u64>,
        snapshots: Vec<SimulationSnapshot>,
    ) -> ResultsResult<Self> {
        if timestamps.len() != snapshots.len() {
            return Err(ResultsError::LengthMismatch {
                timestamps: timestamps.len(),
                snapshots: snapshots.len(),
            });
        }
        if let Some(w) = timestamps.windows(2).find(|w| w[1] <= w[0]) {
            return Err(ResultsError::NonMonotonic {
                previous: w[0],
                time: w[1],
            });
        }
        Ok(Self {
            timestamps,
            snapshots,
        })
    }

    /// Append a step. `time` must be greater than the last timestamp.
    pub fn push(&mut self, time: u64, snapshot: SimulationSnapshot) -> ResultsResult<()> {
        if let Some(&previous) = self.timestamps.last()
            && time <= previous
        {
            return Err(ResultsError::NonMonotonic { previous, time });
        }
        self.timestamps.push(time);
        self.snapshots.push(snapshot);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[u64] {
        &self.timestamps
    }

    pub fn snapshots(&self) -> &[SimulationSnapshot] {
        &self.snapshots
    }

    pub fn get(&self, index: usize) -> Option<(u64, &SimulationSnapshot)> {
        Some((*self.timestamps.get(index)?, self.snapshots.get(index)?))
    }

    /// Index of the last step at or before `time`.
    pub fn index_at(&self, time: u64) -> Option<usize> {
        match self.timestamps.binary_search(&time) {
            Ok(i) => Some(i),
            Err(0) => None,
            Err(i) => Some(i - 1),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, &SimulationSnapshot)> {
        self.timestamps.iter().copied().zip(&self.snapshots)
    }

    pub fn into_parts(self) -> (Vec<u64>, Vec<SimulationSnapshot>) {
        (self.timestamps, self.snapshots)
    }

    pub fn to_records(&self) -> Vec<TimeseriesRecord> {
        self.iter()
            .map(|(time_s, snapshot)| TimeseriesRecord {
                time_s,
                snapshot: snapshot.clone(),
            })
            .collect()
    }

    pub fn from_records(records: Vec<TimeseriesRecord>) -> ResultsResult<Self> {
        let (timestamps, snapshots) = records
            .into_iter()
            .map(|r| (r.time_s, r.snapshot))
            .unzip();
        Self::from_parts(timestamps, snapshots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_rejects_non_increasing_time() {
        let mut h = SimulationHistory::new();
        h.push(0, SimulationSnapshot::default()).unwrap();
        h.push(3600, SimulationSnapshot::default()).unwrap();
        assert!(matches!(
            h.push(3600, SimulationSnapshot::default()),
            Err(ResultsError::NonMonotonic {
                previous: 3600,
                time: 3600
            })
        ));
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn from_parts_checks_lengths() {
        let err = SimulationHistory::from_parts(vec![0, 1], vec![SimulationSnapshot::default()])
            .unwrap_err();
        assert!(matches!(err, ResultsError::LengthMismatch { .. }));
    }

    #[test]
    fn index_at_finds_step_in_effect() {
        let h = SimulationHistory::from_parts(
            vec![0, 3600, 5400],
            vec![SimulationSnapshot::default(); 3],
        )
        .unwrap();
        assert_eq!(h.index_at(0), Some(0));
        assert_eq!(h.index_at(4000), Some(1));
        assert_eq!(h.index_at(5400), Some(2));
        assert_eq!(h.index_at(99_999), Some(2));
        assert_eq!(SimulationHistory::new().index_at(0), None);
    }

    #[test]
    fn snapshots_pair_with_timestamps_by_index() {
        let snap = |flow: f64| {
            let mut s = SimulationSnapshot::default();
            s.links.insert(
                "P1".to_string(),
                crate::types::LinkResult {
                    flow,
                    velocity: 0.0,
                    headloss: 0.0,
                    status: "Open".to_string(),
                },
            );
            s
        };
        let mut h = SimulationHistory::new();
        h.push(0, snap(1.0)).unwrap();
        h.push(1800, snap(2.0)).unwrap();
        h.push(3600, snap(3.0)).unwrap();

        let (time, s) = h.get(1).unwrap();
        assert_eq!(time, 1800);
        assert_eq!(s.link("P1").unwrap().flow, 2.0);
        let pairs: Vec<(u64, f64)> = h.iter().map(|(t, s)| (t, s.link("P1").unwrap().flow)).collect();
        assert_eq!(pairs, vec![(0, 1.0), (1800, 2.0), (3600, 3.0)]);
        assert!(h.get(3).is_none());
    }

    #[test]
    fn deserialize_validates_order() {
        let bad = r#"{"timestamps":[10,5],"snapshots":[{"nodes":{},"links":{}},{"nodes":{},"links":{}}]}"#;
        assert!(serde_json::from_str::<SimulationHistory>(bad).is_err());
        let good = r#"{"timestamps":[0],"snapshots":[{"nodes":{},"links":{}}]}"#;
        assert_eq!(serde_json::from_str::<SimulationHistory>(good).unwrap().len(), 1);
    }
}
