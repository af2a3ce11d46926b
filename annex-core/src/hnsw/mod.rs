pub mod builder;
pub mod delete;
pub mod graph;
pub mod link;
pub mod node;
pub mod search;

pub use builder::HnswBuilder;
pub use delete::DeleteStrategy;
pub use graph::{GraphHeader, HnswGraph};
pub use node::{NodeRecord, NodeRecordParams};
pub use search::SearchResult;

use node::DEFAULT_MAX_LAYERS;

/// HNSW construction parameters
#[derive(Debug, Clone, Copy)]
pub struct HnswParams {
    /// Maximum connections per node (M)
    pub max_connections: u16,

    /// Construction quality (efConstruction)
    pub ef_construction: usize,

    /// Search quality (efSearch)
    pub ef_search: usize,

    /// Layer selection multiplier
    pub ml: f32,

    /// Maximum number of layers the graph's fixed-size records reserve space for
    pub max_layers: u8,

    /// Number of threads used while building the graph. `0` means "use all
    /// available cores" (see [`crate::worker::parallel_for`]), matching
    /// `NappParams::index_thread_qty`.
    pub index_thread_qty: usize,

    /// Which neighbor-selection criterion `link::select_neighbors_heuristic`
    /// applies (`delaunayType` in the original ParamBag): `0` naive
    /// top-M nearest, `1` (default) diversity heuristic, `2` a documented
    /// stub that currently falls back to `1`.
    pub delaunay_type: u8,

    /// Post-processing pass applied after construction (`post` in the
    /// original ParamBag). `0` (default, and the only level implemented
    /// here) means no post-processing.
    pub post: u8,

    /// Selects among the original's construction algorithm variants
    /// (`algoType`). `0` (default, and the only variant implemented here)
    /// is the standard incremental HNSW builder this crate implements.
    pub algo_type: u8,
}

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            max_connections: 16,
            ef_construction: 200,
            ef_search: 50,
            ml: 1.0 / (16.0_f32).ln(),
            max_layers: DEFAULT_MAX_LAYERS,
            index_thread_qty: 0,
            delaunay_type: 1,
            post: 0,
            algo_type: 0,
        }
    }
}

impl HnswParams {
    /// Derive the fixed-size on-disk record parameters from these construction params.
    #[must_use]
    pub const fn to_record_params(&self) -> node::NodeRecordParams {
        node::NodeRecordParams::new(self.max_connections, self.max_connections * 2, self.max_layers)
    }
}
