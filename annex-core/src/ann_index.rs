//! A shared capability surface over both index families, for callers that
//! want to hold "an ANN index" without committing to HNSW or NAPP at the
//! type level — e.g. a config-driven embedder that picks the family from a
//! settings file.
//!
//! [`AnnIndex`] is the trait both families implement directly; [`Index`] is
//! the enum that dispatches to whichever one a caller built, named after
//! the family it wraps (`Index::Hnsw` / `Index::Napp`) rather than after
//! the trait, since Rust doesn't allow a trait and an enum sharing one name.

use crate::error::AnnError;
use crate::hnsw::DeleteStrategy;
use crate::index::{IndexOptions, VectorIndex};
use crate::napp::{IntersectionAlgorithm, NappIndex};
use crate::params::NappParams;
use crate::pivot::PivotSelectionStrategy;
use crate::space::AnySpace;
use std::fs;
use std::path::Path;

/// One neighbor returned by a k-NN or range query, family-agnostic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Object id, relative to whichever index produced it.
    pub id: u64,
    /// Distance to the query. `NaN` if the index was configured to skip
    /// exact re-ranking (NAPP's `skip_checking`).
    pub distance: f32,
}

/// The operations both index families support, returning [`AnnError`]
/// rather than `anyhow::Error` at this boundary so callers outside the
/// crate get a stable, matchable error type.
pub trait AnnIndex {
    /// Finds up to `k` nearest neighbors of `query`.
    ///
    /// # Errors
    ///
    /// Returns [`AnnError::Parameter`] on a dimension mismatch.
    fn search_knn(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, AnnError>;

    /// Finds every neighbor of `query` within `radius`.
    ///
    /// # Errors
    ///
    /// Returns [`AnnError::Unsupported`] for index families that don't
    /// implement range search (currently HNSW), or [`AnnError::Parameter`]
    /// on a dimension mismatch.
    fn search_range(&self, query: &[f32], radius: f32) -> Result<Vec<Neighbor>, AnnError>;

    /// Removes `ids` from the index.
    ///
    /// # Errors
    ///
    /// Returns [`AnnError::Unsupported`] for index families that don't
    /// support deletion (currently NAPP, which only supports rebuilding).
    fn delete_batch(&mut self, ids: &[u64]) -> Result<(), AnnError>;

    /// Number of objects currently indexed.
    fn len(&self) -> usize;

    /// Whether the index contains no objects.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Vector dimensionality this index was built for.
    fn dimensions(&self) -> usize;
}

impl AnnIndex for VectorIndex {
    fn search_knn(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, AnnError> {
        let results = self.search(query, k)?;
        Ok(results.into_iter().map(|r| Neighbor { id: r.id, distance: r.distance }).collect())
    }

    fn search_range(&self, _query: &[f32], _radius: f32) -> Result<Vec<Neighbor>, AnnError> {
        Err(AnnError::Unsupported("range search is not implemented for HNSW".into()))
    }

    fn delete_batch(&mut self, ids: &[u64]) -> Result<(), AnnError> {
        for &id in ids {
            self.delete(id, DeleteStrategy::NeighborsOnly)?;
        }
        Ok(())
    }

    fn len(&self) -> usize {
        VectorIndex::len(self) as usize
    }

    fn dimensions(&self) -> usize {
        VectorIndex::dimensions(self) as usize
    }
}

impl AnnIndex for NappIndex<AnySpace> {
    fn search_knn(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, AnnError> {
        let results = self.search(query, k)?;
        Ok(results.into_iter().map(|(id, distance)| Neighbor { id: u64::from(id), distance }).collect())
    }

    fn search_range(&self, query: &[f32], radius: f32) -> Result<Vec<Neighbor>, AnnError> {
        let results = NappIndex::search_range(self, query, radius)?;
        Ok(results.into_iter().map(|(id, distance)| Neighbor { id: u64::from(id), distance }).collect())
    }

    fn delete_batch(&mut self, _ids: &[u64]) -> Result<(), AnnError> {
        Err(AnnError::Unsupported("NAPP doesn't support deletion; rebuild the index instead".into()))
    }

    fn len(&self) -> usize {
        NappIndex::len(self)
    }

    fn dimensions(&self) -> usize {
        NappIndex::dimensions(self)
    }
}

/// An ANN index of either family, for callers that decide which one to
/// build at runtime.
#[derive(Debug)]
pub enum Index {
    /// An HNSW graph index.
    Hnsw(VectorIndex),
    /// A NAPP inverted index, with its space erased to a trait object so
    /// both families can live behind the same enum.
    Napp(NappIndex<AnySpace>),
}

impl Index {
    /// Opens or creates an HNSW index at `path`.
    ///
    /// # Errors
    ///
    /// See [`VectorIndex::open`].
    pub fn open_hnsw<P: AsRef<Path>>(
        path: P,
        dimensions: u32,
        options: IndexOptions,
    ) -> Result<Self, AnnError> {
        Ok(Self::Hnsw(VectorIndex::open(path, dimensions, options)?))
    }

    /// Builds a NAPP index over `objects` with a type-erased space.
    ///
    /// # Errors
    ///
    /// See [`NappIndex::build`].
    pub fn build_napp(
        space: AnySpace,
        params: NappParams,
        objects: Vec<Vec<f32>>,
        strategy: PivotSelectionStrategy,
        seed: u64,
    ) -> Result<Self, AnnError> {
        Ok(Self::Napp(NappIndex::build(space, params, objects, strategy, seed)?))
    }

    /// Selects which posting-list intersection algorithm a `Napp` variant
    /// uses. A no-op on `Hnsw`.
    pub fn set_napp_algorithm(&mut self, algorithm: IntersectionAlgorithm) {
        if let Self::Napp(index) = self {
            index.set_algorithm(algorithm);
        }
    }

    /// Writes a `Napp` variant to `path` in the line-based text format; a
    /// no-op that returns `Ok(())` on `Hnsw`, whose durability already goes
    /// through `VectorIndex::flush`'s mmap commit rather than a save step.
    ///
    /// # Errors
    ///
    /// Returns [`AnnError::Corruption`] wrapping the underlying I/O error.
    pub fn save_napp_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), AnnError> {
        if let Self::Napp(index) = self {
            fs::write(path, index.save_to_string()).map_err(|e| AnnError::Corruption(e.to_string()))?;
        }
        Ok(())
    }

    /// Reads a NAPP index previously written with [`Index::save_napp_to_file`],
    /// reconstructing its [`Space`](crate::space::Space) from the name stored
    /// in the file header via [`AnySpace::by_name`].
    ///
    /// # Errors
    ///
    /// Returns [`AnnError::Corruption`] if `path` can't be read or the file
    /// doesn't parse, or [`AnnError::Parameter`] if the header names a space
    /// [`AnySpace::by_name`] doesn't recognize.
    pub fn load_napp_from_file<P: AsRef<Path>>(path: P) -> Result<Self, AnnError> {
        let text = fs::read_to_string(path).map_err(|e| AnnError::Corruption(e.to_string()))?;
        let space_name = text
            .lines()
            .find_map(|line| line.strip_prefix("space = "))
            .ok_or_else(|| AnnError::Corruption("missing 'space' header field".into()))?;
        let space = AnySpace::by_name(space_name)
            .ok_or_else(|| AnnError::Parameter(format!("unknown space '{space_name}'")))?;
        Ok(Self::Napp(NappIndex::load_from_str(&text, space)?))
    }
}

impl AnnIndex for Index {
    fn search_knn(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, AnnError> {
        match self {
            Self::Hnsw(index) => index.search_knn(query, k),
            Self::Napp(index) => index.search_knn(query, k),
        }
    }

    fn search_range(&self, query: &[f32], radius: f32) -> Result<Vec<Neighbor>, AnnError> {
        match self {
            Self::Hnsw(index) => index.search_range(query, radius),
            Self::Napp(index) => AnnIndex::search_range(index, query, radius),
        }
    }

    fn delete_batch(&mut self, ids: &[u64]) -> Result<(), AnnError> {
        match self {
            Self::Hnsw(index) => index.delete_batch(ids),
            Self::Napp(index) => index.delete_batch(ids),
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Hnsw(index) => AnnIndex::len(index),
            Self::Napp(index) => AnnIndex::len(index),
        }
    }

    fn dimensions(&self) -> usize {
        match self {
            Self::Hnsw(index) => AnnIndex::dimensions(index),
            Self::Napp(index) => index.dimensions(),
        }
    }
}
