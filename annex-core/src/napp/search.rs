//! Posting-list intersection strategies for NAPP queries.
//!
//! `ScanCount` (delegating to [`crate::napp::scancount::scan_count`]) is the
//! default and, per the original paper's own benchmarking, rarely worth
//! replacing — but the original implementation kept three alternatives
//! around for comparison (`ALGO_SELECTOR` in `napp_optim.cc`), and this
//! module keeps the same menu: a textbook sorted-merge counter, a
//! binary-heap k-way merge, and a WAND-style early-terminating variant for
//! when only a handful of top candidates are wanted rather than the full
//! threshold set.

use crate::napp::scancount::scan_count;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;

/// Which posting-list intersection algorithm to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntersectionAlgorithm {
    /// Cache-blocked counting array. The default; see `scancount.rs`.
    #[default]
    ScanCount,
    /// Sequential merge across all lists with a dense counter array sized
    /// to the id range, rather than ScanCount's windowed counters.
    Merge,
    /// k-way merge driven by a binary heap over each list's current head,
    /// counting runs of equal ids as they're popped.
    PriorityQueue,
    /// Early-terminating variant: stops once `top_k` ids have reached the
    /// threshold, skipping the remainder of the lists. Correct only when
    /// the caller doesn't need the complete candidate set (i.e. when
    /// `skip_checking` is set and no further re-ranking happens).
    Wand,
}

/// Finds every id in `0..max_id` appearing in more than `threshold` of
/// `lists`, using `algorithm`. `top_k` bounds the result for [`IntersectionAlgorithm::Wand`]
/// (ignored by the other algorithms, which always return the full set).
#[must_use]
pub fn intersect(
    algorithm: IntersectionAlgorithm,
    lists: &[Arc<Vec<u32>>],
    max_id: u32,
    threshold: u8,
    top_k: usize,
) -> Vec<u32> {
    match algorithm {
        IntersectionAlgorithm::ScanCount => scan_count(lists, max_id, threshold),
        IntersectionAlgorithm::Merge => merge_intersect(lists, max_id, threshold),
        IntersectionAlgorithm::PriorityQueue => priority_queue_intersect(lists, threshold),
        IntersectionAlgorithm::Wand => wand_intersect(lists, threshold, top_k),
    }
}

/// Dense-counter merge: a straightforward `O(sum of list lengths)` pass
/// with one counter per id, no windowing. Simpler than ScanCount and a
/// useful correctness cross-check, at the cost of `O(max_id)` memory.
fn merge_intersect(lists: &[Arc<Vec<u32>>], max_id: u32, threshold: u8) -> Vec<u32> {
    let mut counters = vec![0u8; max_id as usize];
    for list in lists {
        for &id in list.iter() {
            if (id as usize) < counters.len() {
                counters[id as usize] = counters[id as usize].saturating_add(1);
            }
        }
    }

    counters
        .into_iter()
        .enumerate()
        .filter_map(|(id, c)| (c > threshold).then_some(id as u32))
        .collect()
}

/// k-way merge over the posting lists via a binary heap keyed on the
/// current head of each list, counting how many lists agree on each id as
/// it's popped in ascending order.
fn priority_queue_intersect(lists: &[Arc<Vec<u32>>], threshold: u8) -> Vec<u32> {
    let mut heap: BinaryHeap<Reverse<(u32, usize)>> = BinaryHeap::new();
    let mut cursors = vec![0usize; lists.len()];

    for (list_idx, list) in lists.iter().enumerate() {
        if let Some(&first) = list.first() {
            heap.push(Reverse((first, list_idx)));
            cursors[list_idx] = 1;
        }
    }

    let mut out = Vec::new();
    while let Some(Reverse((id, list_idx))) = heap.pop() {
        let mut count = 1u32;

        // Drain every other list currently pointing at the same id.
        while let Some(&Reverse((next_id, _))) = heap.peek() {
            if next_id != id {
                break;
            }
            let Reverse((_, other_list)) = heap.pop().unwrap();
            count += 1;
            advance(&lists, &mut cursors, other_list, &mut heap);
        }

        if count > threshold as u32 {
            out.push(id);
        }

        advance(&lists, &mut cursors, list_idx, &mut heap);
    }

    out
}

fn advance(
    lists: &[Arc<Vec<u32>>],
    cursors: &mut [usize],
    list_idx: usize,
    heap: &mut BinaryHeap<Reverse<(u32, usize)>>,
) {
    let cursor = cursors[list_idx];
    if let Some(&next) = lists[list_idx].get(cursor) {
        heap.push(Reverse((next, list_idx)));
        cursors[list_idx] = cursor + 1;
    }
}

/// WAND-style (Weak AND) early termination: processes ids in ascending
/// order via the same k-way merge as [`priority_queue_intersect`], but
/// stops as soon as `top_k` qualifying ids have been found. Suitable only
/// when the caller won't re-rank beyond what's returned.
fn wand_intersect(lists: &[Arc<Vec<u32>>], threshold: u8, top_k: usize) -> Vec<u32> {
    if top_k == 0 {
        return Vec::new();
    }

    let mut heap: BinaryHeap<Reverse<(u32, usize)>> = BinaryHeap::new();
    let mut cursors = vec![0usize; lists.len()];

    for (list_idx, list) in lists.iter().enumerate() {
        if let Some(&first) = list.first() {
            heap.push(Reverse((first, list_idx)));
            cursors[list_idx] = 1;
        }
    }

    let mut out: Vec<u32> = Vec::new();

    while let Some(Reverse((id, list_idx))) = heap.pop() {
        let mut count = 1u32;
        while let Some(&Reverse((next_id, _))) = heap.peek() {
            if next_id != id {
                break;
            }
            let Reverse((_, other_list)) = heap.pop().unwrap();
            count += 1;
            advance(&lists, &mut cursors, other_list, &mut heap);
        }

        if count > threshold as u32 {
            out.push(id);
            if out.len() >= top_k {
                break;
            }
        }

        advance(&lists, &mut cursors, list_idx, &mut heap);
    }

    out
}
