//! The `Space` trait: the one seam both index families traverse through to
//! compare vectors, so a new metric can be added without touching either
//! `HnswGraph` or the NAPP inverted index.

use crate::distance::{cosine_distance, euclidean_distance, negative_inner_product};

/// A pairwise distance function over equal-length `f32` vectors.
///
/// Implementations are expected to be cheap to construct and `Send + Sync`
/// so a single instance can be shared across the worker pool in
/// [`crate::worker::parallel_for`].
pub trait Space: Send + Sync {
    /// Computes the distance between `a` and `b`. Smaller means more similar.
    ///
    /// # Panics
    ///
    /// May panic (via `debug_assert`) if `a.len() != b.len()` in debug
    /// builds; release builds read out of bounds through the underlying
    /// kernel's unchecked loop, so callers must enforce equal lengths.
    fn distance(&self, a: &[f32], b: &[f32]) -> f32;

    /// A short, stable name for diagnostics and persisted index headers.
    fn name(&self) -> &'static str;
}

/// Euclidean (L2) distance.
#[derive(Debug, Clone, Copy, Default)]
pub struct EuclideanSpace;

impl Space for EuclideanSpace {
    fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        euclidean_distance(a, b)
    }

    fn name(&self) -> &'static str {
        "euclidean"
    }
}

/// Cosine distance (`1 - cosine similarity`).
#[derive(Debug, Clone, Copy, Default)]
pub struct CosineSpace;

impl Space for CosineSpace {
    fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        cosine_distance(a, b)
    }

    fn name(&self) -> &'static str {
        "cosine"
    }
}

/// Negative inner product, for spaces where vectors are pre-normalized and
/// "more similar" means "larger dot product" (nmslib's `negdotprod`).
#[derive(Debug, Clone, Copy, Default)]
pub struct DotProductSpace;

impl Space for DotProductSpace {
    fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        negative_inner_product(a, b)
    }

    fn name(&self) -> &'static str {
        "dot_product"
    }
}

/// A boxed, type-erased [`Space`], for callers that need to pick a metric at
/// runtime (the `AnnIndex` enum's `Napp` variant fixes `NappIndex<S>`'s `S`
/// to this, since an enum variant can't itself be generic over `S`).
pub struct AnySpace(Box<dyn Space>);

impl std::fmt::Debug for AnySpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AnySpace").field(&self.0.name()).finish()
    }
}

impl AnySpace {
    /// Wraps a concrete space.
    pub fn new<S: Space + 'static>(space: S) -> Self {
        Self(Box::new(space))
    }

    /// Looks up a built-in space by the name [`Space::name`] returns for it.
    /// Used to reconstruct a space from a persisted index header.
    #[must_use]
    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "euclidean" => Some(Self::new(EuclideanSpace)),
            "cosine" => Some(Self::new(CosineSpace)),
            "dot_product" => Some(Self::new(DotProductSpace)),
            _ => None,
        }
    }
}

impl Space for AnySpace {
    fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        self.0.distance(a, b)
    }

    fn name(&self) -> &'static str {
        self.0.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_any_space_round_trips_by_name() {
        let space = AnySpace::by_name("cosine").unwrap();
        assert_eq!(space.name(), "cosine");
        assert!(AnySpace::by_name("bogus").is_none());
    }

    #[test]
    fn test_euclidean_space_matches_kernel() {
        let space = EuclideanSpace;
        let a = [1.0, 0.0, 0.0];
        let b = [0.0, 1.0, 0.0];
        assert_eq!(space.distance(&a, &b), euclidean_distance(&a, &b));
        assert_eq!(space.name(), "euclidean");
    }

    #[test]
    fn test_cosine_space_identical_vectors_zero_distance() {
        let space = CosineSpace;
        let a = [1.0, 2.0, 3.0];
        assert!(space.distance(&a, &a).abs() < 1e-5);
    }

    #[test]
    fn test_dot_product_space_orders_by_similarity() {
        let space = DotProductSpace;
        let query = [1.0, 0.0];
        let close = [0.9, 0.1];
        let far = [-1.0, 0.0];
        assert!(space.distance(&query, &close) < space.distance(&query, &far));
    }
}
