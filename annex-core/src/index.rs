//! Ergonomic single-file HNSW index: owns both vector storage and the graph,
//! and presents the open/add/search/flush surface the FFI layer and most
//! embedders actually want instead of juggling `Storage` + `HnswGraph` by hand.

use crate::hnsw::builder::HnswBuilder;
use crate::hnsw::{DeleteStrategy, HnswGraph, HnswParams, SearchResult};
use crate::Storage;
use anyhow::Result;
use std::path::Path;

/// Tunable knobs for a `VectorIndex`.
#[derive(Debug, Clone, Copy)]
pub struct IndexOptions {
    /// Maximum connections per node (M in the HNSW literature).
    pub max_connections: u16,

    /// Candidate list size used while linking new nodes (efConstruction).
    pub ef_construction: usize,

    /// Candidate list size used while searching (efSearch).
    pub ef_search: usize,
}

impl Default for IndexOptions {
    fn default() -> Self {
        let params = HnswParams::default();
        Self {
            max_connections: params.max_connections,
            ef_construction: params.ef_construction,
            ef_search: params.ef_search,
        }
    }
}

impl IndexOptions {
    fn to_hnsw_params(self) -> HnswParams {
        HnswParams {
            max_connections: self.max_connections,
            ef_construction: self.ef_construction,
            ef_search: self.ef_search,
            ..HnswParams::default()
        }
    }
}

/// A single vector nearest to a query, with its distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryResult {
    pub id: u64,
    pub distance: f32,
}

impl From<SearchResult> for QueryResult {
    fn from(r: SearchResult) -> Self {
        Self { id: r.id, distance: r.distance }
    }
}

/// A nearest-neighbor index backed by a single on-disk HNSW graph.
#[derive(Debug)]
pub struct VectorIndex {
    graph: HnswGraph,
    builder: HnswBuilder,
    ef_search: usize,
}

impl VectorIndex {
    /// Opens an existing index or creates a new one at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is already open by another process, has
    /// a mismatched dimension count, or is corrupted.
    pub fn open<P: AsRef<Path>>(path: P, dimensions: u32, options: IndexOptions) -> Result<Self> {
        let storage = Storage::open(path, dimensions)?;
        let params = options.to_hnsw_params();
        let graph = HnswGraph::open(storage, params)?;
        let builder = HnswBuilder::new(params);

        // Ghost-node recovery: a crash between `storage.insert()` and the
        // graph's publish step leaves a vector with no matching node. We
        // don't patch anything here — `len()` already reports
        // `graph.node_count()`, which correctly excludes the ghost — but the
        // next `add()` call reclaims that orphaned storage slot rather than
        // appending a new one (see `add()` below).

        Ok(Self { graph, builder, ef_search: options.ef_search })
    }

    /// Adds a vector, returning its id.
    ///
    /// If a previous crash left an orphaned vector in storage with no
    /// matching graph node (a "ghost node"), this call reclaims that slot
    /// instead of appending a new one.
    ///
    /// # Errors
    ///
    /// Returns an error if `vector.len()` doesn't match the index's
    /// dimensionality.
    pub fn add(&mut self, vector: &[f32]) -> Result<u64> {
        if vector.len() != self.dimensions() as usize {
            anyhow::bail!(
                "dimension mismatch: index expects {}, got {}",
                self.dimensions(),
                vector.len()
            );
        }

        let has_ghost = self.graph.storage.count() > self.graph.node_count();
        let node_id = self.graph.node_count();

        if has_ghost {
            self.graph.storage.overwrite_vector(node_id, vector)?;
        } else {
            self.graph.storage.insert(vector)?;
        }

        self.builder.insert(&mut self.graph, node_id)?;

        Ok(node_id)
    }

    /// Searches for the `k` nearest neighbors of `query`.
    ///
    /// Returns at most `min(k, len())` results sorted by ascending distance.
    /// Returns an empty vector for `k == 0` or an empty index rather than an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns an error if `query.len()` doesn't match the index's
    /// dimensionality.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<QueryResult>> {
        if query.len() != self.dimensions() as usize {
            anyhow::bail!(
                "dimension mismatch: index expects {}, got {}",
                self.dimensions(),
                query.len()
            );
        }

        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let ef = self.ef_search.max(k);
        let results = self.graph.search(query, k, ef)?;
        Ok(results.into_iter().map(QueryResult::from).collect())
    }

    /// Removes a vector from the index using `strategy` to decide how much
    /// of its neighbor graph gets patched immediately versus left for the
    /// next search to skip over.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` doesn't refer to an existing node.
    pub fn delete(&mut self, id: u64, strategy: DeleteStrategy) -> Result<()> {
        self.graph.delete(id, strategy)
    }

    /// Flushes all pending writes to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying fsync fails.
    pub fn flush(&mut self) -> Result<()> {
        self.graph.commit()
    }

    /// Number of vectors currently indexed (excludes unreconciled ghosts).
    pub fn len(&self) -> u64 {
        self.graph.node_count()
    }

    /// Whether the index contains no vectors.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Vector dimensionality this index was opened with.
    pub fn dimensions(&self) -> u32 {
        self.graph.storage.dimensions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_open_add_search_roundtrip() {
        let temp_file = NamedTempFile::new().unwrap();
        let mut index = VectorIndex::open(temp_file.path(), 4, IndexOptions::default()).unwrap();

        let id0 = index.add(&[1.0, 0.0, 0.0, 0.0]).unwrap();
        let id1 = index.add(&[0.0, 1.0, 0.0, 0.0]).unwrap();
        assert_eq!((id0, id1), (0, 1));

        let results = index.search(&[1.0, 0.0, 0.0, 0.0], 1).unwrap();
        assert_eq!(results[0].id, 0);
    }

    #[test]
    fn test_search_empty_index_returns_empty() {
        let temp_file = NamedTempFile::new().unwrap();
        let index = VectorIndex::open(temp_file.path(), 4, IndexOptions::default()).unwrap();
        assert!(index.search(&[0.0; 4], 5).unwrap().is_empty());
    }

    #[test]
    fn test_dimension_mismatch_errors() {
        let temp_file = NamedTempFile::new().unwrap();
        let mut index = VectorIndex::open(temp_file.path(), 4, IndexOptions::default()).unwrap();

        let err = index.add(&[1.0, 2.0]).unwrap_err();
        assert!(err.to_string().contains("dimension mismatch"));

        let err = index.search(&[1.0, 2.0], 1).unwrap_err();
        assert!(err.to_string().contains("dimension mismatch"));
    }

    #[test]
    fn test_k_zero_returns_empty_without_error() {
        let temp_file = NamedTempFile::new().unwrap();
        let mut index = VectorIndex::open(temp_file.path(), 4, IndexOptions::default()).unwrap();
        index.add(&[1.0, 0.0, 0.0, 0.0]).unwrap();
        assert!(index.search(&[1.0, 0.0, 0.0, 0.0], 0).unwrap().is_empty());
    }
}
