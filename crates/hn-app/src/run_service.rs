//! Simulation execution, deadlines and run caching.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use hn_engine::{HydraulicEngine, NetworkEngine};
use hn_results::{
    ErrorResponse, RunManifest, RunStore, SimulationHistory, SimulationReply, SimulationRequest,
    SimulationResponse, compute_run_id,
};
use hn_sim::{DriverOptions, SimError, SimResult, SimulationDriver, StepProgress};
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::progress::{RunProgressEvent, RunStage};

/// Identifies the engine in run ids, so cached results never outlive an engine change.
pub const ENGINE_VERSION: &str = concat!("hn-engine ", env!("CARGO_PKG_VERSION"));

const NO_INP: &str = "No INP data provided";
const FAILED: &str = "Simulation failed";

/// Options for running simulations.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Wall-clock limit; `None` waits indefinitely
    pub timeout: Option<Duration>,
    pub use_cache: bool,
    /// Run cache directory; no caching when unset
    pub store_root: Option<PathBuf>,
    /// Grouping key recorded in cached manifests
    pub network_id: String,
    pub driver: DriverOptions,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(60)),
            use_cache: true,
            store_root: None,
            network_id: "default".to_string(),
            driver: DriverOptions::default(),
        }
    }
}

/// Result of [`run_inp`].
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: String,
    pub history: SimulationHistory,
    pub loaded_from_cache: bool,
    pub elapsed_s: f64,
}

enum WorkerMessage {
    Step(StepProgress),
    Done(SimResult<SimulationHistory>),
}

/// Run `engine` over `inp` on a worker thread, waiting at most `timeout`.
///
/// On expiry the worker is abandoned, not interrupted: it keeps running in the
/// background and its engine is closed by the driver when it finishes.
pub fn run_with_deadline<E>(
    engine: E,
    inp: String,
    driver_options: DriverOptions,
    timeout: Option<Duration>,
    on_step: &mut dyn FnMut(StepProgress),
) -> AppResult<SimulationHistory>
where
    E: HydraulicEngine + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let worker = thread::Builder::new()
        .name("hn-sim".to_string())
        .spawn(move || {
            let mut driver = SimulationDriver::with_options(engine, driver_options);
            let result = driver.run_with_progress(&inp, |p| {
                let _ = tx.send(WorkerMessage::Step(p));
            });
            let _ = tx.send(WorkerMessage::Done(result));
        })?;

    let deadline = timeout.map(|t| Instant::now() + t);
    loop {
        let message = match deadline {
            None => rx.recv().map_err(|_| worker_lost()),
            Some(deadline) => {
                match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
                    Ok(m) => Ok(m),
                    Err(RecvTimeoutError::Timeout) => {
                        let seconds = timeout.map_or(0.0, |t| t.as_secs_f64());
                        warn!(seconds, "simulation deadline expired; abandoning worker");
                        return Err(SimError::Timeout { seconds }.into());
                    }
                    Err(RecvTimeoutError::Disconnected) => Err(worker_lost()),
                }
            }
        }?;
        match message {
            WorkerMessage::Step(p) => on_step(p),
            WorkerMessage::Done(result) => {
                let _ = worker.join();
                return Ok(result?);
            }
        }
    }
}

fn worker_lost() -> AppError {
    SimError::SolverStep {
        message: "simulation worker stopped unexpectedly".to_string(),
    }
    .into()
}

fn emit(
    progress_cb: &mut Option<&mut dyn FnMut(RunProgressEvent)>,
    event: RunProgressEvent,
) {
    if let Some(cb) = progress_cb.as_deref_mut() {
        cb(event);
    }
}

/// Run INP text with the reference engine, using the run cache when configured.
pub fn run_inp(inp: &str, options: &RunOptions) -> AppResult<RunOutcome> {
    run_inp_with_progress(inp, options, None)
}

/// [`run_inp`] with stage and per-step progress events.
pub fn run_inp_with_progress(
    inp: &str,
    options: &RunOptions,
    mut progress_cb: Option<&mut dyn FnMut(RunProgressEvent)>,
) -> AppResult<RunOutcome> {
    let started = Instant::now();
    if inp.trim().is_empty() {
        return Err(AppError::InvalidInput(NO_INP.to_string()));
    }

    let run_id = compute_run_id(inp, ENGINE_VERSION);
    let store = match &options.store_root {
        Some(root) => Some(RunStore::new(root.clone())?),
        None => None,
    };

    if store.is_some() && options.use_cache {
        emit(
            &mut progress_cb,
            RunProgressEvent::stage(RunStage::CheckingCache, started.elapsed().as_secs_f64(), None),
        );
    }
    if let Some(store) = &store
        && options.use_cache
        && store.has_run(&run_id)
    {
        emit(
            &mut progress_cb,
            RunProgressEvent::stage(
                RunStage::LoadingCachedResult,
                started.elapsed().as_secs_f64(),
                Some("Loading cached run".to_string()),
            ),
        );
        let history = store.load_history(&run_id)?;
        debug!(run_id = %run_id, "run loaded from cache");
        return Ok(RunOutcome {
            run_id,
            history,
            loaded_from_cache: true,
            elapsed_s: started.elapsed().as_secs_f64(),
        });
    }

    emit(
        &mut progress_cb,
        RunProgressEvent::stage(
            RunStage::Simulating,
            started.elapsed().as_secs_f64(),
            Some("Running hydraulics".to_string()),
        ),
    );
    let history = {
        let mut on_step = |step: StepProgress| {
            emit(
                &mut progress_cb,
                RunProgressEvent {
                    stage: RunStage::Simulating,
                    elapsed_wall_s: started.elapsed().as_secs_f64(),
                    message: None,
                    step: Some(step),
                },
            );
        };
        run_with_deadline(
            NetworkEngine::new(),
            inp.to_string(),
            options.driver.clone(),
            options.timeout,
            &mut on_step,
        )?
    };

    if let Some(store) = &store {
        emit(
            &mut progress_cb,
            RunProgressEvent::stage(
                RunStage::SavingResults,
                started.elapsed().as_secs_f64(),
                None,
            ),
        );
        let manifest = RunManifest {
            run_id: run_id.clone(),
            network_id: options.network_id.clone(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            engine_version: ENGINE_VERSION.to_string(),
            steps: history.len(),
        };
        store.save_history(&manifest, &history)?;
    }

    let elapsed_s = started.elapsed().as_secs_f64();
    info!(run_id = %run_id, snapshots = history.len(), elapsed_s, "run completed");
    emit(
        &mut progress_cb,
        RunProgressEvent::stage(RunStage::Completed, elapsed_s, Some("Run completed".to_string())),
    );
    Ok(RunOutcome {
        run_id,
        history,
        loaded_from_cache: false,
        elapsed_s,
    })
}

/// The simulation endpoint: `{inp}` in, `{timestamps, snapshots, generatedAt}`
/// or `{error, details?}` out.
pub fn simulate(request: &SimulationRequest, options: &RunOptions) -> SimulationReply {
    let Some(inp) = request.inp.as_deref().filter(|s| !s.trim().is_empty()) else {
        return SimulationReply::Failure(ErrorResponse::new(NO_INP));
    };
    match run_inp(inp, options) {
        Ok(outcome) => SimulationReply::Success(SimulationResponse::new(
            outcome.history,
            chrono::Utc::now(),
        )),
        Err(e) => {
            warn!(error = %e, "simulation request failed");
            SimulationReply::Failure(ErrorResponse::with_details(FAILED, e.to_string()))
        }
    }
}

/// Cached runs for `network_id`, most recent first.
pub fn list_runs(store_root: &Path, network_id: &str) -> AppResult<Vec<RunManifest>> {
    let store = RunStore::new(store_root.to_path_buf())?;
    Ok(store.list_runs(network_id)?)
}

pub fn load_run(store_root: &Path, run_id: &str) -> AppResult<(RunManifest, SimulationHistory)> {
    let store = RunStore::new(store_root.to_path_buf())?;
    let manifest = store.load_manifest(run_id)?;
    let history = store.load_history(run_id)?;
    Ok((manifest, history))
}
