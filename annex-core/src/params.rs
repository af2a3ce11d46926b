//! Typed, struct-of-fields parameter bags for both index families, kept as
//! plain `Default`-implementing structs rather than a stringly-typed config
//! map, matching the shape [`HnswParams`] already uses.

pub use crate::hnsw::HnswParams;

/// Build- and query-time parameters for a NAPP index.
///
/// Field names mirror nmslib's `napp_optim` parameter names (`numPivot`,
/// `numPrefix`/`numPivotIndex`, `minTimes`/`numPivotSearch`, ...) so anyone
/// porting tuned parameters from the original method finds them unchanged.
#[derive(Debug, Clone, Copy)]
pub struct NappParams {
    /// Total number of pivots selected at build time.
    pub num_pivot: usize,

    /// Number of closest pivots indexed per object (K in the original
    /// paper; `numPrefix`/`numPivotIndex`).
    pub num_prefix: usize,

    /// Number of closest pivots consulted per query at search time
    /// (`numPrefixSearch`). May differ from `num_prefix`.
    pub num_prefix_search: usize,

    /// Number of objects per posting-list build chunk, so the intersection
    /// counter array stays cache-resident during `IndexChunk`.
    pub chunk_index_size: usize,

    /// Minimum number of matching pivots (among the queried prefix) for a
    /// candidate to be returned (`minTimes`/`numPivotSearch`'s t in the
    /// original paper).
    pub min_times: usize,

    /// Number of threads used while building posting lists. `0` means "use
    /// all available cores" (see [`crate::worker::parallel_for`]).
    pub index_thread_qty: usize,

    /// Skip the exact re-ranking/checking step and return ScanCount
    /// candidates directly (`skipChecking`).
    pub skip_checking: bool,
}

impl Default for NappParams {
    fn default() -> Self {
        Self {
            num_pivot: 512,
            num_prefix: 32,
            num_prefix_search: 32,
            chunk_index_size: 16384,
            min_times: 2,
            index_thread_qty: 0,
            skip_checking: false,
        }
    }
}

impl NappParams {
    /// Validates cross-field constraints the original enforces at
    /// `CreateIndex`/`SetQueryTimeParams` time.
    ///
    /// # Errors
    ///
    /// Returns a message describing the violated constraint.
    pub fn validate(&self) -> Result<(), String> {
        if self.num_prefix > self.num_pivot {
            return Err(format!(
                "numPrefix ({}) must be <= numPivot ({})",
                self.num_prefix, self.num_pivot
            ));
        }
        if self.num_prefix_search > self.num_pivot {
            return Err(format!(
                "numPrefixSearch ({}) must be <= numPivot ({})",
                self.num_prefix_search, self.num_pivot
            ));
        }
        if self.min_times == 0 {
            return Err("minTimes must be > 0".to_string());
        }
        if self.chunk_index_size == 0 {
            return Err("chunkIndexSize must be > 0".to_string());
        }
        Ok(())
    }
}
