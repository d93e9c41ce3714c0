//! Vertex Index: a derived, read-only view of every pipe vertex.
//!
//! Built from a store snapshot and never written back. The cache compares the
//! store revision it was built from to decide when to rebuild.

use hn_core::LinkId;
use rayon::prelude::*;
use tracing::debug;

use crate::entity::{Coordinate, NetworkLink};
use crate::store::{GraphStore, StoreHandle};

/// One vertex of one pipe's geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexRecord {
    pub parent_link_id: LinkId,
    /// Position within the parent's coordinate list.
    pub index: usize,
    /// True for the first and last coordinate.
    pub is_endpoint: bool,
    pub position: Coordinate,
}

/// All vertices of all committed pipes, grouped by pipe in id order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VertexIndex {
    records: Vec<VertexRecord>,
    revision: u64,
}

impl VertexIndex {
    /// Derive the index from `store`. Pumps, valves and preview links are skipped.
    pub fn build(store: &GraphStore) -> Self {
        let pipes: Vec<&NetworkLink> = store
            .links()
            .filter(|l| l.kind.is_pipe() && !l.preview)
            .collect();
        let records: Vec<VertexRecord> = pipes
            .par_iter()
            .map(|link| link_vertices(link))
            .collect::<Vec<_>>()
            .into_iter()
            .flatten()
            .collect();
        debug!(
            pipes = pipes.len(),
            vertices = records.len(),
            revision = store.revision(),
            "vertex index built"
        );
        Self {
            records,
            revision: store.revision(),
        }
    }

    pub fn records(&self) -> &[VertexRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Store revision this index was derived from.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn for_link<'a>(&'a self, link_id: &'a str) -> impl Iterator<Item = &'a VertexRecord> + 'a {
        self.records
            .iter()
            .filter(move |r| r.parent_link_id.as_str() == link_id)
    }

    /// Interior vertex nearest `point` within `radius`, for vertex drag tools.
    pub fn nearest(&self, point: Coordinate, radius: f64) -> Option<&VertexRecord> {
        self.records
            .iter()
            .filter(|r| !r.is_endpoint)
            .map(|r| (r, r.position.distance(point)))
            .filter(|(_, d)| *d <= radius)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(r, _)| r)
    }
}

fn link_vertices(link: &NetworkLink) -> Vec<VertexRecord> {
    let last = link.geometry.len().saturating_sub(1);
    link.geometry
        .iter()
        .enumerate()
        .map(|(index, position)| VertexRecord {
            parent_link_id: link.id.clone(),
            index,
            is_endpoint: index == 0 || index == last,
            position: *position,
        })
        .collect()
}

/// Vertex Index that rebuilds itself when the store has changed.
#[derive(Debug, Clone)]
pub struct VertexIndexCache {
    store: StoreHandle,
    index: Option<VertexIndex>,
}

impl VertexIndexCache {
    pub fn new(store: StoreHandle) -> Self {
        Self { store, index: None }
    }

    /// Current index, rebuilt if the store moved on since the last build.
    pub fn get(&mut self) -> &VertexIndex {
        let store = self.store.read();
        let stale = self
            .index
            .as_ref()
            .is_none_or(|idx| idx.revision != store.revision());
        if stale {
            self.index = Some(VertexIndex::build(&store));
        }
        drop(store);
        self.index.get_or_insert_with(VertexIndex::default)
    }

    pub fn invalidate(&mut self) {
        self.index = None;
    }
}
