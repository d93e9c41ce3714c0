//! Content-addressed cache of completed simulation runs.
//!
//! Layout: `<root>/<run_id>/timeseries.jsonl` (one snapshot per line) and
//! `<root>/<run_id>/manifest.json`. The manifest is written last, so a run
//! directory without one is an interrupted save and is treated as absent.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::history::SimulationHistory;
use crate::types::{RunManifest, TimeseriesRecord};
use crate::{ResultsError, ResultsResult};

const MANIFEST: &str = "manifest.json";
const TIMESERIES: &str = "timeseries.jsonl";

#[derive(Debug, Clone)]
pub struct RunStore {
    root_dir: PathBuf,
}

impl RunStore {
    pub fn new(root_dir: PathBuf) -> ResultsResult<Self> {
        fs::create_dir_all(&root_dir)?;
        Ok(Self { root_dir })
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Run ids become directory names; only plain file-safe ids are accepted.
    fn run_dir(&self, run_id: &str) -> ResultsResult<PathBuf> {
        let safe = !run_id.is_empty()
            && run_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !safe {
            return Err(ResultsError::InvalidPath {
                message: format!("'{run_id}' is not a valid run id"),
            });
        }
        Ok(self.root_dir.join(run_id))
    }

    fn not_found(run_id: &str) -> ResultsError {
        ResultsError::RunNotFound {
            run_id: run_id.to_string(),
        }
    }

    pub fn has_run(&self, run_id: &str) -> bool {
        self.run_dir(run_id)
            .is_ok_and(|dir| dir.join(MANIFEST).is_file())
    }

    /// Write `records` and then `manifest`, replacing any earlier run with the
    /// same id.
    pub fn save_run(
        &self,
        manifest: &RunManifest,
        records: &[TimeseriesRecord],
    ) -> ResultsResult<()> {
        let dir = self.run_dir(&manifest.run_id)?;
        fs::create_dir_all(&dir)?;
        let _ = fs::remove_file(dir.join(MANIFEST));

        let mut out = BufWriter::new(File::create(dir.join(TIMESERIES))?);
        for record in records {
            serde_json::to_writer(&mut out, record)?;
            out.write_all(b"\n")?;
        }
        out.flush()?;

        let staged = dir.join("manifest.json.partial");
        fs::write(&staged, serde_json::to_vec_pretty(manifest)?)?;
        fs::rename(staged, dir.join(MANIFEST))?;
        Ok(())
    }

    pub fn save_history(
        &self,
        manifest: &RunManifest,
        history: &SimulationHistory,
    ) -> ResultsResult<()> {
        self.save_run(manifest, &history.to_records())
    }

    pub fn load_manifest(&self, run_id: &str) -> ResultsResult<RunManifest> {
        let path = self.run_dir(run_id)?.join(MANIFEST);
        if !path.is_file() {
            return Err(Self::not_found(run_id));
        }
        Ok(serde_json::from_slice(&fs::read(path)?)?)
    }

    pub fn load_timeseries(&self, run_id: &str) -> ResultsResult<Vec<TimeseriesRecord>> {
        if !self.has_run(run_id) {
            return Err(Self::not_found(run_id));
        }
        let file = File::open(self.run_dir(run_id)?.join(TIMESERIES))?;
        let mut records = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if !line.trim().is_empty() {
                records.push(serde_json::from_str(&line)?);
            }
        }
        Ok(records)
    }

    /// Stored run as a history; ordering is re-validated on the way in.
    pub fn load_history(&self, run_id: &str) -> ResultsResult<SimulationHistory> {
        SimulationHistory::from_records(self.load_timeseries(run_id)?)
    }

    /// Manifests for `network_id`, newest first.
    pub fn list_runs(&self, network_id: &str) -> ResultsResult<Vec<RunManifest>> {
        let mut runs: Vec<RunManifest> = fs::read_dir(&self.root_dir)?
            .filter_map(Result::ok)
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| self.load_manifest(&entry.file_name().to_string_lossy()).ok())
            .filter(|manifest| manifest.network_id == network_id)
            .collect();
        runs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(runs)
    }

    pub fn delete_run(&self, run_id: &str) -> ResultsResult<()> {
        let dir = self.run_dir(run_id)?;
        if dir.exists() {
            fs::remove_dir_all(dir)?;
        }
        Ok(())
    }
}
