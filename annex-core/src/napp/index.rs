//! NAPP: a pivot-based inverted index for approximate nearest-neighbor
//! search, built by indexing each object's closest pivots and searched by
//! intersecting the posting lists of the query's closest pivots.
//!
//! Grounded on `NappOptim` (`original_source/.../method/napp_optim.{h,cc}`):
//! objects are split into build chunks that are indexed independently and
//! in parallel (`IndexChunk`). Per-chunk posting lists (local object ids)
//! are what `SaveIndex`/`LoadIndex` persist, one `chunkId` line plus
//! `numPivot` list lines per chunk; a merged, globally-addressed view is
//! derived from them for `search`. Search computes the query's closest
//! `numPrefixSearch` pivots, looks up their posting lists, and hands them to
//! [`crate::napp::search::intersect`] to find candidates seen by at least
//! `minTimes` of them.

use crate::error::AnnError;
use crate::heap::SortedInsertArray;
use crate::napp::search::{intersect, IntersectionAlgorithm};
use crate::napp::signature::closest_pivots;
use crate::params::NappParams;
use crate::persist::{read_field, read_list, write_field, write_list};
use crate::pivot::{select_pivots, PivotSelectionStrategy};
use crate::space::Space;
use parking_lot::Mutex;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use tracing::{debug, info};

/// A pivot-based inverted index over a fixed, in-memory set of objects.
///
/// Unlike [`crate::hnsw::HnswGraph`], `NappIndex` is built once from a
/// complete dataset rather than grown by single-vector inserts — this
/// mirrors the original method, whose posting lists are merged in one pass
/// after all chunks finish indexing. Rebuilding the index is the supported
/// way to add data; there is no online insertion path.
#[derive(Debug)]
pub struct NappIndex<S: Space> {
    space: S,
    params: NappParams,
    dimensions: usize,
    objects: Vec<Vec<f32>>,
    pivots: Vec<Vec<f32>>,
    /// Per-chunk, per-pivot posting lists holding *local* object ids
    /// (relative to `chunk_id * params.chunk_index_size`), exactly as
    /// `IndexChunk` produces and `SaveIndex`/`LoadIndex` persist them.
    chunk_postings: Vec<Vec<Vec<u32>>>,
    /// Per-pivot posting lists merged across every chunk, with ids
    /// translated back to global object ids. Derived from `chunk_postings`
    /// at build/load time; kept alongside it because `search` needs O(1)
    /// per-pivot access and merging on every query would be wasteful.
    postings: Vec<Arc<Vec<u32>>>,
    algorithm: IntersectionAlgorithm,
}

impl<S: Space> NappIndex<S> {
    /// Selects which posting-list intersection algorithm `search` uses.
    /// Defaults to [`IntersectionAlgorithm::ScanCount`].
    pub fn set_algorithm(&mut self, algorithm: IntersectionAlgorithm) {
        self.algorithm = algorithm;
    }
    /// Builds a NAPP index over `objects` using `space` for distance
    /// computation and `strategy` to select `params.num_pivot` pivots.
    ///
    /// # Errors
    ///
    /// Returns [`AnnError::Parameter`] if `params` fails validation, the
    /// dataset is empty, or any object's length disagrees with the first
    /// object's dimensionality.
    pub fn build(
        space: S,
        params: NappParams,
        objects: Vec<Vec<f32>>,
        strategy: PivotSelectionStrategy,
        seed: u64,
    ) -> Result<Self, AnnError> {
        params.validate().map_err(AnnError::Parameter)?;

        if objects.is_empty() {
            return Err(AnnError::Parameter("cannot build NAPP index over zero objects".into()));
        }

        let dimensions = objects[0].len();
        for (id, obj) in objects.iter().enumerate() {
            if obj.len() != dimensions {
                return Err(AnnError::Parameter(format!(
                    "object {id} has {} dimensions, expected {dimensions}",
                    obj.len()
                )));
            }
        }

        if params.num_pivot > objects.len() {
            return Err(AnnError::Parameter(format!(
                "numPivot ({}) exceeds dataset size ({})",
                params.num_pivot,
                objects.len()
            )));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let pivot_ids = select_pivots(
            strategy,
            &|id| objects[id as usize].clone(),
            objects.len() as u64,
            params.num_pivot,
            &mut rng,
        );
        let pivots: Vec<Vec<f32>> = pivot_ids.into_iter().map(|id| objects[id as usize].clone()).collect();

        info!(num_pivot = pivots.len(), num_objects = objects.len(), "selected NAPP pivots");

        let chunk_qty = objects.len().div_ceil(params.chunk_index_size);
        let chunk_results: Vec<Mutex<Vec<Vec<u32>>>> =
            (0..chunk_qty).map(|_| Mutex::new(Vec::new())).collect();

        crate::worker::parallel_for(0, chunk_qty, params.index_thread_qty, |chunk_id, _thread_id| {
            let min_id = chunk_id * params.chunk_index_size;
            let max_id = (min_id + params.chunk_index_size).min(objects.len());

            let mut chunk_postings: Vec<Vec<u32>> = vec![Vec::new(); pivots.len()];
            for local_id in 0..(max_id - min_id) {
                let object = &objects[min_id + local_id];
                for pivot_id in closest_pivots(&space, object, &pivots, params.num_prefix) {
                    chunk_postings[pivot_id as usize].push(local_id as u32);
                }
            }

            debug!(chunk_id, min_id, max_id, "indexed NAPP chunk");
            *chunk_results[chunk_id].lock() = chunk_postings;
        });

        let chunk_postings: Vec<Vec<Vec<u32>>> =
            chunk_results.into_iter().map(Mutex::into_inner).collect();
        let postings = Self::merge_chunk_postings(&chunk_postings, pivots.len(), params.chunk_index_size);

        Ok(Self {
            space,
            params,
            dimensions,
            objects,
            pivots,
            chunk_postings,
            postings,
            algorithm: IntersectionAlgorithm::default(),
        })
    }

    /// Merges per-chunk, per-pivot posting lists of local object ids into
    /// per-pivot lists of global object ids, translating each chunk's local
    /// ids by `chunk_id * chunk_index_size`. Shared by `build` and
    /// `load_from_str`, whose only difference is where `chunk_postings`
    /// came from.
    fn merge_chunk_postings(
        chunk_postings: &[Vec<Vec<u32>>],
        num_pivot: usize,
        chunk_index_size: usize,
    ) -> Vec<Arc<Vec<u32>>> {
        let mut postings: Vec<Vec<u32>> = vec![Vec::new(); num_pivot];
        for (chunk_id, chunk) in chunk_postings.iter().enumerate() {
            let min_id = (chunk_id * chunk_index_size) as u32;
            for (pivot_id, ids) in chunk.iter().enumerate() {
                postings[pivot_id].extend(ids.iter().map(|&local| local + min_id));
            }
        }
        postings.into_iter().map(Arc::new).collect()
    }

    /// Finds up to `k` nearest neighbors of `query`.
    ///
    /// # Errors
    ///
    /// Returns [`AnnError::Parameter`] if `query.len()` doesn't match the
    /// index's dimensionality.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(u32, f32)>, AnnError> {
        if query.len() != self.dimensions {
            return Err(AnnError::Parameter(format!(
                "dimension mismatch: index expects {}, got {}",
                self.dimensions,
                query.len()
            )));
        }

        if k == 0 {
            return Ok(Vec::new());
        }

        let prefix = closest_pivots(&self.space, query, &self.pivots, self.params.num_prefix_search);
        let lists: Vec<Arc<Vec<u32>>> =
            prefix.into_iter().map(|pivot_id| Arc::clone(&self.postings[pivot_id as usize])).collect();

        let threshold = (self.params.min_times - 1) as u8;
        let candidates = intersect(self.algorithm, &lists, self.objects.len() as u32, threshold, k);

        if self.params.skip_checking {
            let mut out: Vec<(u32, f32)> =
                candidates.into_iter().map(|id| (id, f32::NAN)).collect();
            out.truncate(k);
            return Ok(out);
        }

        let mut top: SortedInsertArray<u32> = SortedInsertArray::with_capacity(k);
        for id in candidates {
            let distance = self.space.distance(query, &self.objects[id as usize]);
            if !distance.is_finite() {
                return Err(AnnError::Distance(format!(
                    "distance computation against object {id} produced a non-finite value"
                )));
            }
            top.offer(id, distance);
        }
        Ok(top.into_vec())
    }

    /// Number of objects in the index.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the index contains no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Vector dimensionality this index was built for.
    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Finds every object within `radius` of `query`.
    ///
    /// Unlike `search`, this always re-ranks candidates by exact distance
    /// (a radius query is meaningless against the unranked `NAN` distances
    /// `params.skip_checking` would otherwise produce) and returns every
    /// match rather than the closest `k`.
    ///
    /// # Errors
    ///
    /// Returns [`AnnError::Parameter`] if `query.len()` doesn't match the
    /// index's dimensionality.
    pub fn search_range(&self, query: &[f32], radius: f32) -> Result<Vec<(u32, f32)>, AnnError> {
        if query.len() != self.dimensions {
            return Err(AnnError::Parameter(format!(
                "dimension mismatch: index expects {}, got {}",
                self.dimensions,
                query.len()
            )));
        }

        let prefix = closest_pivots(&self.space, query, &self.pivots, self.params.num_prefix_search);
        let lists: Vec<Arc<Vec<u32>>> =
            prefix.into_iter().map(|pivot_id| Arc::clone(&self.postings[pivot_id as usize])).collect();

        let threshold = (self.params.min_times - 1) as u8;
        let candidates = intersect(self.algorithm, &lists, self.objects.len() as u32, threshold, usize::MAX);

        let mut matches: Vec<(u32, f32)> = Vec::new();
        for id in candidates {
            let distance = self.space.distance(query, &self.objects[id as usize]);
            if !distance.is_finite() {
                return Err(AnnError::Distance(format!(
                    "distance computation against object {id} produced a non-finite value"
                )));
            }
            if distance <= radius {
                matches.push((id, distance));
            }
        }
        matches.sort_by(|a, b| a.1.total_cmp(&b.1));
        Ok(matches)
    }

    /// Serializes the index to the line-based text format described in
    /// `napp_optim.cc`'s `SaveIndex`: one `key = value` header line per
    /// parameter, one space-separated line per pivot vector, then for each
    /// build chunk a `chunkId` line followed by `numPivot` posting-list
    /// lines (local object ids), one line per stored object, and a
    /// trailing `LINE_QTY` line recording the total line count (including
    /// itself) so a truncated file is caught instead of silently
    /// mis-parsed.
    #[must_use]
    pub fn save_to_string(&self) -> String {
        let mut out = String::new();
        write_field(&mut out, "method", "napp");
        write_field(&mut out, "space", self.space.name());
        write_field(&mut out, "dimensions", self.dimensions);
        write_field(&mut out, "numObjects", self.objects.len());
        write_field(&mut out, "numPivot", self.params.num_pivot);
        write_field(&mut out, "numPrefix", self.params.num_prefix);
        write_field(&mut out, "numPrefixSearch", self.params.num_prefix_search);
        write_field(&mut out, "chunkIndexSize", self.params.chunk_index_size);
        write_field(&mut out, "minTimes", self.params.min_times);
        write_field(&mut out, "indexThreadQty", self.params.index_thread_qty);
        write_field(&mut out, "skipChecking", u8::from(self.params.skip_checking));
        write_field(&mut out, "indexQty", self.chunk_postings.len());

        for pivot in &self.pivots {
            write_list(&mut out, pivot.iter().copied());
        }
        for (chunk_id, chunk) in self.chunk_postings.iter().enumerate() {
            write_field(&mut out, "chunkId", chunk_id);
            for pivot_postings in chunk {
                write_list(&mut out, pivot_postings.iter().copied());
            }
        }
        for object in &self.objects {
            write_list(&mut out, object.iter().copied());
        }

        let line_qty = out.lines().count() + 1; // including the LINE_QTY line itself
        write_field(&mut out, "LINE_QTY", line_qty);

        out
    }

    /// Parses an index previously serialized with [`NappIndex::save_to_string`].
    ///
    /// `space` must be the same metric the index was built with; this isn't
    /// re-derived from the saved name because `S` is a compile-time type
    /// parameter here (the type-erased equivalent lives on
    /// [`crate::AnnIndex`], which does pick the space from the saved name).
    ///
    /// # Errors
    ///
    /// Returns [`AnnError::Corruption`] if the text doesn't match the
    /// expected format, or [`AnnError::Parameter`] if `space.name()`
    /// disagrees with the name recorded at save time.
    pub fn load_from_str(text: &str, space: S) -> Result<Self, AnnError> {
        let mut lines = text.lines();

        let _method: String = read_field(&mut lines, "method")?;
        let saved_space: String = read_field(&mut lines, "space")?;
        if saved_space != space.name() {
            return Err(AnnError::Parameter(format!(
                "index was built with space '{saved_space}', got '{}'",
                space.name()
            )));
        }

        let dimensions: usize = read_field(&mut lines, "dimensions")?;
        let num_objects: usize = read_field(&mut lines, "numObjects")?;
        let num_pivot: usize = read_field(&mut lines, "numPivot")?;
        let num_prefix: usize = read_field(&mut lines, "numPrefix")?;
        let num_prefix_search: usize = read_field(&mut lines, "numPrefixSearch")?;
        let chunk_index_size: usize = read_field(&mut lines, "chunkIndexSize")?;
        let min_times: usize = read_field(&mut lines, "minTimes")?;
        let index_thread_qty: usize = read_field(&mut lines, "indexThreadQty")?;
        let skip_checking: u8 = read_field(&mut lines, "skipChecking")?;
        let chunk_qty: usize = read_field(&mut lines, "indexQty")?;

        let params = NappParams {
            num_pivot,
            num_prefix,
            num_prefix_search,
            chunk_index_size,
            min_times,
            index_thread_qty,
            skip_checking: skip_checking != 0,
        };
        params.validate().map_err(AnnError::Parameter)?;

        let pivots: Vec<Vec<f32>> =
            (0..num_pivot).map(|_| read_list(&mut lines)).collect::<Result<_, _>>()?;

        let mut chunk_postings: Vec<Vec<Vec<u32>>> = Vec::with_capacity(chunk_qty);
        for expected_chunk_id in 0..chunk_qty {
            let chunk_id: usize = read_field(&mut lines, "chunkId")?;
            if chunk_id != expected_chunk_id {
                return Err(AnnError::Corruption(format!(
                    "chunkId {chunk_id} read out of order, expected {expected_chunk_id}"
                )));
            }
            let pivot_postings: Vec<Vec<u32>> =
                (0..num_pivot).map(|_| read_list(&mut lines)).collect::<Result<_, _>>()?;
            chunk_postings.push(pivot_postings);
        }

        let objects: Vec<Vec<f32>> =
            (0..num_objects).map(|_| read_list(&mut lines)).collect::<Result<_, _>>()?;

        for (id, obj) in objects.iter().enumerate() {
            if obj.len() != dimensions {
                return Err(AnnError::Corruption(format!(
                    "object {id} has {} dimensions, expected {dimensions}",
                    obj.len()
                )));
            }
        }

        let declared_line_qty: usize = read_field(&mut lines, "LINE_QTY")?;
        let actual_line_qty = text.lines().count();
        if declared_line_qty != actual_line_qty {
            return Err(AnnError::Corruption(format!(
                "LINE_QTY declares {declared_line_qty} lines, file has {actual_line_qty} (truncated?)"
            )));
        }

        let postings = Self::merge_chunk_postings(&chunk_postings, num_pivot, chunk_index_size);

        Ok(Self {
            space,
            params,
            dimensions,
            objects,
            pivots,
            chunk_postings,
            postings,
            algorithm: IntersectionAlgorithm::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::EuclideanSpace;

    fn clustered_dataset() -> Vec<Vec<f32>> {
        let mut data = Vec::new();
        for i in 0..20 {
            data.push(vec![i as f32 * 0.01, 0.0]);
        }
        for i in 0..20 {
            data.push(vec![100.0 + i as f32 * 0.01, 0.0]);
        }
        data
    }

    fn small_params() -> NappParams {
        NappParams {
            num_pivot: 8,
            num_prefix: 3,
            num_prefix_search: 3,
            chunk_index_size: 10,
            min_times: 1,
            index_thread_qty: 2,
            skip_checking: false,
        }
    }

    #[test]
    fn test_build_rejects_empty_dataset() {
        let result = NappIndex::build(
            EuclideanSpace,
            NappParams::default(),
            Vec::new(),
            PivotSelectionStrategy::Random,
            0,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_build_rejects_ragged_dimensions() {
        let objects = vec![vec![0.0, 0.0], vec![0.0]];
        let params = NappParams { num_pivot: 1, ..small_params() };
        let result = NappIndex::build(EuclideanSpace, params, objects, PivotSelectionStrategy::Random, 0);
        assert!(result.is_err());
    }

    #[test]
    fn test_search_finds_nearby_cluster_member() {
        let data = clustered_dataset();
        let index =
            NappIndex::build(EuclideanSpace, small_params(), data, PivotSelectionStrategy::MaxVariance, 7)
                .unwrap();

        let results = index.search(&[0.05, 0.0], 5).unwrap();
        assert!(!results.is_empty());
        // every returned neighbor should come from the near cluster (ids 0..20)
        assert!(results.iter().all(|&(id, _)| id < 20));
    }

    #[test]
    fn test_search_dimension_mismatch_errors() {
        let data = clustered_dataset();
        let index =
            NappIndex::build(EuclideanSpace, small_params(), data, PivotSelectionStrategy::Random, 3)
                .unwrap();
        let err = index.search(&[0.0], 1).unwrap_err();
        assert!(matches!(err, AnnError::Parameter(_)));
    }

    #[test]
    fn test_search_k_zero_returns_empty() {
        let data = clustered_dataset();
        let index =
            NappIndex::build(EuclideanSpace, small_params(), data, PivotSelectionStrategy::Random, 3)
                .unwrap();
        assert!(index.search(&[0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_search_range_only_returns_matches_within_radius() {
        let data = clustered_dataset();
        let index =
            NappIndex::build(EuclideanSpace, small_params(), data, PivotSelectionStrategy::MaxVariance, 7)
                .unwrap();

        let matches = index.search_range(&[0.05, 0.0], 1.0).unwrap();
        assert!(!matches.is_empty());
        assert!(matches.iter().all(|&(_, dist)| dist <= 1.0));
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let data = clustered_dataset();
        let index =
            NappIndex::build(EuclideanSpace, small_params(), data, PivotSelectionStrategy::Random, 3)
                .unwrap();

        let query = [0.05, 0.0];
        let before = index.search(&query, 5).unwrap();

        let serialized = index.save_to_string();
        let reloaded = NappIndex::load_from_str(&serialized, EuclideanSpace).unwrap();
        let after = reloaded.search(&query, 5).unwrap();

        assert_eq!(before, after);
        assert_eq!(reloaded.len(), index.len());
    }

    #[test]
    fn test_load_rejects_mismatched_space() {
        let data = clustered_dataset();
        let index =
            NappIndex::build(EuclideanSpace, small_params(), data, PivotSelectionStrategy::Random, 3)
                .unwrap();
        let serialized = index.save_to_string();
        let err = NappIndex::load_from_str(&serialized, crate::space::CosineSpace).unwrap_err();
        assert!(matches!(err, AnnError::Parameter(_)));
    }
}
