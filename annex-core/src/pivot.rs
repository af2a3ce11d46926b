//! Pivot selection strategies for the NAPP inverted index: choosing which
//! stored objects serve as reference points that every other object's
//! signature is defined relative to.

use crate::distance::euclidean_distance;
use rand::seq::SliceRandom;
use rand::Rng;

/// How pivots are chosen from the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PivotSelectionStrategy {
    /// Uniformly sample `num_pivots` distinct ids at random. Cheap, and the
    /// strategy nmslib defaults to (`selectPivot = rand`).
    Random,
    /// Greedily grow a pivot set by repeatedly adding whichever unselected
    /// candidate has the largest distance to its nearest already-selected
    /// pivot, approximating max-variance coverage of the space.
    MaxVariance,
}

/// Selects `num_pivots` ids from `0..count` using `vectors` (row-major,
/// `dims`-wide) to compute distances for `MaxVariance`.
///
/// # Panics
///
/// Panics if `num_pivots > count` or `count == 0`.
pub fn select_pivots<R: Rng + ?Sized>(
    strategy: PivotSelectionStrategy,
    vectors: &dyn Fn(u64) -> Vec<f32>,
    count: u64,
    num_pivots: usize,
    rng: &mut R,
) -> Vec<u64> {
    assert!(count > 0, "cannot select pivots from an empty dataset");
    assert!(num_pivots as u64 <= count, "num_pivots exceeds dataset size");

    match strategy {
        PivotSelectionStrategy::Random => {
            let mut ids: Vec<u64> = (0..count).collect();
            ids.shuffle(rng);
            ids.truncate(num_pivots);
            ids
        }
        PivotSelectionStrategy::MaxVariance => {
            select_max_variance_pivots(vectors, count, num_pivots, rng)
        }
    }
}

fn select_max_variance_pivots<R: Rng + ?Sized>(
    vectors: &dyn Fn(u64) -> Vec<f32>,
    count: u64,
    num_pivots: usize,
    rng: &mut R,
) -> Vec<u64> {
    let first = rng.random_range(0..count);
    let mut selected = vec![first];
    let mut nearest_selected_dist = vec![f32::INFINITY; count as usize];

    let first_vec = vectors(first);

    for (id, slot) in nearest_selected_dist.iter_mut().enumerate() {
        if id as u64 != first {
            *slot = euclidean_distance(&first_vec, &vectors(id as u64));
        }
    }

    while selected.len() < num_pivots {
        let mut best_id = 0u64;
        let mut best_dist = -1.0f32;

        for id in 0..count {
            if selected.contains(&id) {
                continue;
            }
            let d = nearest_selected_dist[id as usize];
            if d > best_dist {
                best_dist = d;
                best_id = id;
            }
        }

        let best_vec = vectors(best_id);
        for id in 0..count {
            if selected.contains(&id) {
                continue;
            }
            let d = euclidean_distance(&best_vec, &vectors(id));
            if d < nearest_selected_dist[id as usize] {
                nearest_selected_dist[id as usize] = d;
            }
        }

        selected.push(best_id);
    }

    selected
}
