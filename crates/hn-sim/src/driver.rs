//! Simulation runner: engine lifecycle and the time-stepping loop.

use std::ops::{Deref, DerefMut};

use hn_engine::HydraulicEngine;
use hn_network::{GraphStore, NetworkSettings};
use hn_results::SimulationHistory;
use tracing::{debug, info, warn};

use crate::error::{SimError, SimResult};
use crate::extract::extract_snapshot;

/// Lifecycle of one run.
///
/// `Idle -> Opening -> Stepping -> Completed`, with `Opening -> Failed` and
/// `Stepping -> Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DriverState {
    #[default]
    Idle,
    Opening,
    Stepping,
    Completed,
    Failed,
}

/// Options for simulation runs.
#[derive(Clone, Debug)]
pub struct DriverOptions {
    /// Optional cap on recorded snapshots; unbounded by default
    pub max_steps: Option<usize>,
    /// Round pressure, demand and headloss for display
    pub round_values: bool,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            max_steps: None,
            round_values: true,
        }
    }
}

/// Reported after each snapshot is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepProgress {
    /// Zero-based snapshot index
    pub step: usize,
    /// Simulation time of the snapshot (s)
    pub time: u64,
}

/// Closes the engine when dropped, on success, error or unwind.
struct EngineGuard<'a, E: HydraulicEngine>(&'a mut E);

impl<E: HydraulicEngine> Deref for EngineGuard<'_, E> {
    type Target = E;

    fn deref(&self) -> &E {
        self.0
    }
}

impl<E: HydraulicEngine> DerefMut for EngineGuard<'_, E> {
    fn deref_mut(&mut self) -> &mut E {
        self.0
    }
}

impl<E: HydraulicEngine> Drop for EngineGuard<'_, E> {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Runs an engine over a network and collects a [`SimulationHistory`].
///
/// A driver can be reused: every run starts again from [`DriverState::Idle`].
pub struct SimulationDriver<E: HydraulicEngine> {
    engine: E,
    state: DriverState,
    options: DriverOptions,
}

impl<E: HydraulicEngine> SimulationDriver<E> {
    pub fn new(engine: E) -> Self {
        Self::with_options(engine, DriverOptions::default())
    }

    pub fn with_options(engine: E, options: DriverOptions) -> Self {
        Self {
            engine,
            state: DriverState::Idle,
            options,
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn options(&self) -> &DriverOptions {
        &self.options
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn into_engine(self) -> E {
        self.engine
    }

    /// Serialize `store` and run it. An empty network fails before the
    /// engine is touched and leaves the driver `Idle`.
    pub fn run_network(
        &mut self,
        store: &GraphStore,
        settings: &NetworkSettings,
    ) -> SimResult<SimulationHistory> {
        self.state = DriverState::Idle;
        let inp = hn_inp::serialize(store, settings)?;
        self.run(&inp)
    }

    pub fn run(&mut self, inp: &str) -> SimResult<SimulationHistory> {
        self.run_with_progress(inp, |_| {})
    }

    pub fn run_with_progress(
        &mut self,
        inp: &str,
        mut on_step: impl FnMut(StepProgress),
    ) -> SimResult<SimulationHistory> {
        self.state = DriverState::Idle;
        if self.engine.is_open() {
            return Err(SimError::InvalidState {
                what: "engine already holds a network",
            });
        }
        let result = self.execute(inp, &mut on_step);
        let next = match &result {
            Ok(history) => {
                info!(snapshots = history.len(), "simulation completed");
                DriverState::Completed
            }
            Err(e) => {
                warn!(error = %e, from = ?self.state, "simulation failed");
                DriverState::Failed
            }
        };
        self.state = next;
        result
    }

    fn execute(
        &mut self,
        inp: &str,
        on_step: &mut dyn FnMut(StepProgress),
    ) -> SimResult<SimulationHistory> {
        let state = &mut self.state;
        let options = &self.options;
        let mut engine = EngineGuard(&mut self.engine);

        transition(state, DriverState::Opening);
        let open_failed = |e: hn_engine::EngineError| SimError::SolverOpen {
            message: e.to_string(),
        };
        engine.open(inp).map_err(open_failed)?;
        engine.init().map_err(open_failed)?;

        let node_ids = (0..engine.node_count())
            .map(|i| engine.node_id(i).map(str::to_string))
            .collect::<Result<Vec<_>, _>>()
            .map_err(open_failed)?;
        let link_ids = (0..engine.link_count())
            .map(|i| engine.link_id(i).map(str::to_string))
            .collect::<Result<Vec<_>, _>>()
            .map_err(open_failed)?;

        transition(state, DriverState::Stepping);
        let step_failed = |e: hn_engine::EngineError| SimError::SolverStep {
            message: e.to_string(),
        };
        let mut history = SimulationHistory::new();
        loop {
            let time = engine.run().map_err(step_failed)?;
            let snapshot = extract_snapshot(&*engine, &node_ids, &link_ids, options.round_values)
                .map_err(step_failed)?;
            history.push(time, snapshot)?;
            let step = history.len() - 1;
            debug!(step, time, "snapshot recorded");
            on_step(StepProgress { step, time });

            let dt = engine.next().map_err(step_failed)?;
            if dt == 0 {
                break;
            }
            if let Some(limit) = options.max_steps
                && history.len() >= limit
            {
                return Err(SimError::TooManySteps { limit });
            }
        }
        Ok(history)
    }
}

fn transition(state: &mut DriverState, next: DriverState) {
    debug!(from = ?*state, to = ?next, "driver state");
    *state = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use hn_engine::{EngineError, EngineResult, LinkParam, NodeParam};

    /// Engine that replays a fixed list of event times.
    #[derive(Default)]
    struct Scripted {
        times: Vec<u64>,
        cursor: usize,
        open: bool,
        fail_open: bool,
        closes: usize,
    }

    impl HydraulicEngine for Scripted {
        fn open(&mut self, _inp: &str) -> EngineResult<()> {
            if self.fail_open {
                return Err(EngineError::Input {
                    what: "bad network".to_string(),
                });
            }
            self.open = true;
            Ok(())
        }
        fn init(&mut self) -> EngineResult<()> {
            self.cursor = 0;
            Ok(())
        }
        fn run(&mut self) -> EngineResult<u64> {
            Ok(self.times[self.cursor])
        }
        fn next(&mut self) -> EngineResult<u64> {
            self.cursor += 1;
            Ok(self
                .times
                .get(self.cursor)
                .map_or(0, |t| t - self.times[self.cursor - 1]))
        }
        fn node_count(&self) -> usize {
            1
        }
        fn link_count(&self) -> usize {
            1
        }
        fn node_id(&self, _: usize) -> EngineResult<&str> {
            Ok("J1")
        }
        fn link_id(&self, _: usize) -> EngineResult<&str> {
            Ok("P1")
        }
        fn node_value(&self, _: usize, p: NodeParam) -> EngineResult<f64> {
            Ok(match p {
                NodeParam::Head => 101.23456,
                NodeParam::Pressure => 1.23456,
                NodeParam::Demand => 0.005,
            })
        }
        fn link_value(&self, _: usize, p: LinkParam) -> EngineResult<f64> {
            Ok(match p {
                LinkParam::Flow => 1.23456,
                LinkParam::Velocity => 0.98765,
                LinkParam::Headloss => 0.123456,
                LinkParam::Status => 3.0,
            })
        }
        fn close(&mut self) {
            self.open = false;
            self.closes += 1;
        }
        fn is_open(&self) -> bool {
            self.open
        }
    }

    fn scripted(times: &[u64]) -> Scripted {
        Scripted {
            times: times.to_vec(),
            ..Scripted::default()
        }
    }

    #[test]
    fn records_each_event_and_closes() {
        let mut driver = SimulationDriver::new(scripted(&[0, 3600, 5400]));
        let mut seen = Vec::new();
        let history = driver.run_with_progress("x", |p| seen.push(p.time)).unwrap();
        assert_eq!(history.timestamps(), &[0, 3600, 5400]);
        assert_eq!(seen, vec![0, 3600, 5400]);
        assert_eq!(driver.state(), DriverState::Completed);
        assert!(!driver.engine().is_open());
        assert_eq!(driver.engine().closes, 1);
    }

    #[test]
    fn rounds_display_values_only() {
        let mut driver = SimulationDriver::new(scripted(&[0]));
        let history = driver.run("x").unwrap();
        let (_, snap) = history.get(0).unwrap();
        let node = snap.node("J1").unwrap();
        assert_eq!(node.head, 101.23456);
        assert_eq!(node.pressure, 1.23);
        assert_eq!(node.demand, 0.01);
        let link = snap.link("P1").unwrap();
        assert_eq!(link.flow, 1.23456);
        assert_eq!(link.velocity, 0.98765);
        assert_eq!(link.headloss, 0.1235);
        assert_eq!(link.status, "Open");
    }

    #[test]
    fn unrounded_when_disabled() {
        let options = DriverOptions {
            round_values: false,
            ..DriverOptions::default()
        };
        let mut driver = SimulationDriver::with_options(scripted(&[0]), options);
        let history = driver.run("x").unwrap();
        assert_eq!(history.get(0).unwrap().1.node("J1").unwrap().pressure, 1.23456);
    }

    #[test]
    fn open_failure_is_verbatim_and_releases() {
        let mut engine = scripted(&[0]);
        engine.fail_open = true;
        let mut driver = SimulationDriver::new(engine);
        let err = driver.run("x").unwrap_err();
        assert_eq!(err.to_string(), "Input error: bad network");
        assert!(matches!(err, SimError::SolverOpen { .. }));
        assert_eq!(driver.state(), DriverState::Failed);
        assert_eq!(driver.engine().closes, 1);
    }

    #[test]
    fn step_limit_fails_the_run() {
        let options = DriverOptions {
            max_steps: Some(2),
            ..DriverOptions::default()
        };
        let mut driver = SimulationDriver::with_options(scripted(&[0, 10, 20, 30]), options);
        assert!(matches!(
            driver.run("x"),
            Err(SimError::TooManySteps { limit: 2 })
        ));
        assert_eq!(driver.state(), DriverState::Failed);
        assert!(!driver.engine().is_open());
    }

    #[test]
    fn long_runs_are_unbounded_by_default() {
        let times: Vec<u64> = (0..100_500).map(|i| i * 300).collect();
        let mut driver = SimulationDriver::new(scripted(&times));
        let history = driver.run("x").unwrap();
        assert_eq!(history.len(), 100_500);
        assert_eq!(driver.state(), DriverState::Completed);
    }

    #[test]
    fn empty_store_never_opens() {
        let mut driver = SimulationDriver::new(scripted(&[0]));
        let err = driver
            .run_network(&GraphStore::new(), &NetworkSettings::default())
            .unwrap_err();
        assert!(matches!(err, SimError::EmptyNetwork));
        assert_eq!(driver.state(), DriverState::Idle);
        assert_eq!(driver.engine().closes, 0);
    }
}
