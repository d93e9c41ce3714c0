//! An editing session: one network, its editor state and its latest results.

use std::sync::Arc;

use hn_network::{
    GraphStore, NetworkSettings, StoreHandle, TopologyManager, VertexIndex, VertexIndexCache,
};
use hn_project::ProjectDocument;
use hn_results::{PlaybackCursor, SimulationHistory};
use tracing::{info, warn};

use crate::error::AppResult;
use crate::run_service::{RunOptions, RunOutcome, run_inp};

/// Ties the Graph Store, Topology Manager, Vertex Index and playback state
/// together around a single shared store.
#[derive(Debug)]
pub struct EditSession {
    store: StoreHandle,
    topology: TopologyManager,
    vertices: VertexIndexCache,
    settings: NetworkSettings,
    history: Option<Arc<SimulationHistory>>,
    cursor: PlaybackCursor,
}

impl Default for EditSession {
    fn default() -> Self {
        Self::new(GraphStore::new(), NetworkSettings::default())
    }
}

impl EditSession {
    pub fn new(store: GraphStore, settings: NetworkSettings) -> Self {
        let store = StoreHandle::new(store);
        Self {
            topology: TopologyManager::new(store.clone()),
            vertices: VertexIndexCache::new(store.clone()),
            store,
            settings,
            history: None,
            cursor: PlaybackCursor::default(),
        }
    }

    pub fn from_document(document: &ProjectDocument) -> AppResult<Self> {
        Ok(Self::new(document.to_store()?, document.settings.clone()))
    }

    /// Session over a network imported from INP text.
    pub fn from_inp(text: &str) -> AppResult<Self> {
        let (store, settings) = hn_inp::load_store(text)?;
        let store = store.snapshot();
        Ok(Self::new(store, settings))
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    pub fn topology(&self) -> &TopologyManager {
        &self.topology
    }

    pub fn topology_mut(&mut self) -> &mut TopologyManager {
        &mut self.topology
    }

    pub fn settings(&self) -> &NetworkSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut NetworkSettings {
        &mut self.settings
    }

    /// Vertex Index for the current store revision.
    pub fn vertex_index(&mut self) -> &VertexIndex {
        self.vertices.get()
    }

    pub fn export_inp(&self) -> AppResult<String> {
        Ok(hn_inp::serialize(&self.store.read(), &self.settings)?)
    }

    pub fn to_document(&self) -> AppResult<ProjectDocument> {
        Ok(ProjectDocument::from_store(&self.store.read(), &self.settings)?)
    }

    /// Simulate the network as it is now.
    ///
    /// The store is copied before the run, so edits made meanwhile never
    /// reach the solver. Results replace the previous history only on
    /// success; a failed run leaves playback untouched.
    pub fn simulate(&mut self, options: &RunOptions) -> AppResult<RunOutcome> {
        let snapshot = self.store.snapshot();
        let inp = hn_inp::serialize(&snapshot, &self.settings)?;
        match run_inp(&inp, options) {
            Ok(outcome) => {
                let history = Arc::new(outcome.history.clone());
                self.cursor = PlaybackCursor::new(Arc::clone(&history));
                self.history = Some(history);
                info!(run_id = %outcome.run_id, "session results updated");
                Ok(outcome)
            }
            Err(e) => {
                warn!(error = %e, "session simulation failed; keeping previous results");
                Err(e)
            }
        }
    }

    pub fn history(&self) -> Option<&SimulationHistory> {
        self.history.as_deref()
    }

    pub fn cursor(&self) -> &PlaybackCursor {
        &self.cursor
    }

    pub fn cursor_mut(&mut self) -> &mut PlaybackCursor {
        &mut self.cursor
    }

    /// Drop results, e.g. after an edit that invalidates them.
    pub fn clear_results(&mut self) {
        self.history = None;
        self.cursor = PlaybackCursor::default();
    }
}
