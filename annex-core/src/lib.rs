//! Annex - Approximate nearest-neighbor search library
//!
//! Annex is a local-first ANN search library for embedding-based search in
//! edge devices, mobile apps, and local-first software. It's built in Rust
//! and runs anywhere from a Raspberry Pi to a data center.
//!
//! It implements two index families, selectable per use case:
//! - HNSW (Hierarchical Navigable Small World), a multi-layer proximity
//!   graph tuned for high recall at low-to-moderate dimensionality.
//! - NAPP (Neighborhood APProximation), a pivot-based inverted index tuned
//!   for high-dimensional data where graph traversal loses its locality
//!   advantage.
//!
//! # Features
//!
//! - On-disk storage using memory-mapped I/O
//! - Page-aligned file format (4KB boundaries)
//! - Single-writer, multi-reader concurrency (SWMR)
//! - Explicit durability control via commit()
//! - Zero external dependencies (no daemons or services)
//!
//! # Example
//!
//! ```no_run
//! use annex_core::{VectorIndex, IndexOptions};
//!
//! # fn main() -> anyhow::Result<()> {
//! // Open or create an index
//! let mut index = VectorIndex::open("embeddings.annex", 768, IndexOptions::default())?;
//!
//! // Insert vectors
//! let embedding = vec![0.1; 768];
//! let id = index.add(&embedding)?;
//!
//! // Commit to disk for durability
//! index.flush()?;
//!
//! // Query for nearest neighbors
//! let results = index.search(&embedding, 10)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Design Philosophy
//!
//! Annex is intentionally simple and focused. It does not aim to be:
//! - A database server
//! - A cloud service
//! - A distributed system
//! - A query engine
//!
//! These concerns are left to the application layer. Annex is a search
//! primitive, like SQLite for relational data.

mod ann_index;
mod distance;
mod error;
mod header;
mod heap;
mod hnsw;
mod index;
mod napp;
mod params;
mod persist;
mod pivot;
mod space;
mod storage;
mod visited;
mod worker;

pub use ann_index::{AnnIndex, Index, Neighbor};
pub use distance::{cosine_distance, euclidean_distance, DistanceMetric};
pub use error::AnnError;
pub use header::{Header, HEADER_SIZE, MAGIC, VERSION};
pub use heap::{KeyedMaxHeap, SortedInsertArray};
pub use hnsw::{
    DeleteStrategy, GraphHeader, HnswBuilder, HnswGraph, HnswParams, NodeRecord, NodeRecordParams,
    SearchResult,
};
pub use index::{IndexOptions, QueryResult, VectorIndex};
pub use napp::{intersect, scan_count, IntersectionAlgorithm, NappIndex};
pub use params::NappParams;
pub use pivot::{select_pivots, PivotSelectionStrategy};
pub use space::{AnySpace, CosineSpace, DotProductSpace, EuclideanSpace, Space};
pub use storage::Storage;
pub use visited::{VisitedList, VisitedPool};
pub use worker::parallel_for;
