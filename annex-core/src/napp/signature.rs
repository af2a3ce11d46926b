//! Per-object pivot signatures: the permutation of pivots sorted by
//! distance to the object, truncated to the closest few.
//!
//! Grounded on `napp_optim.cc`'s `GetPermutationPPIndexEfficiently`: compute
//! the distance from an object to every pivot, sort pivot ids by ascending
//! distance, and take a prefix. The resulting `Permutation` is what both the
//! indexing pass (with `numPrefix`) and search (with `numPrefixSearch`) work
//! with.

use crate::space::Space;

/// Returns the ids of the `prefix_len` pivots closest to `vector`, ordered
/// by ascending distance.
///
/// `pivots[i]` is the vector for pivot id `i as u32`.
#[must_use]
pub fn closest_pivots(space: &dyn Space, vector: &[f32], pivots: &[Vec<f32>], prefix_len: usize) -> Vec<u32> {
    let mut dists: Vec<(f32, u32)> =
        pivots.iter().enumerate().map(|(id, p)| (space.distance(vector, p), id as u32)).collect();

    dists.sort_by(|a, b| a.0.total_cmp(&b.0));
    dists.truncate(prefix_len);
    dists.into_iter().map(|(_, id)| id).collect()
}
