//! Fixed-size worker pool implementing a `ParallelFor`-style work
//! distribution: a shared atomic cursor over `[start, end)`, with each
//! thread pulling the next id until the range is exhausted.
//!
//! Grounded on `thread_pool.h`'s `ParallelFor`, the one concurrency helper
//! the original indexing code leans on for both per-node HNSW patching and
//! NAPP's per-chunk build.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

/// Runs `f(id)` for every `id` in `start..end`, distributed across
/// `num_threads` worker threads pulling from a shared atomic cursor.
///
/// `num_threads <= 1` runs the range on the calling thread with no spawning
/// overhead, which also keeps this usable from within an already-parallel
/// context (NAPP indexing a single small chunk, tests).
///
/// # Panics
///
/// If `f` panics on a worker thread, the first panic observed is
/// re-raised on the calling thread after every worker has finished; other
/// workers keep running to completion rather than being torn down
/// mid-work, matching the original's `lastException` bookkeeping.
pub fn parallel_for<F>(start: usize, end: usize, num_threads: usize, f: F)
where
    F: Fn(usize, usize) + Sync,
{
    if end <= start {
        return;
    }

    let num_threads = if num_threads == 0 {
        thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
    } else {
        num_threads
    };

    if num_threads == 1 {
        for id in start..end {
            f(id, 0);
        }
        return;
    }

    let cursor = AtomicUsize::new(start);
    let first_panic: std::sync::Mutex<Option<Box<dyn std::any::Any + Send>>> =
        std::sync::Mutex::new(None);

    thread::scope(|scope| {
        for thread_id in 0..num_threads {
            let cursor = &cursor;
            let f = &f;
            let first_panic = &first_panic;
            scope.spawn(move || loop {
                let id = cursor.fetch_add(1, Ordering::Relaxed);
                if id >= end {
                    break;
                }

                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| f(id, thread_id))) {
                    let mut slot = first_panic.lock().unwrap();
                    if slot.is_none() {
                        *slot = Some(payload);
                    }
                }
            });
        }
    });

    if let Some(payload) = first_panic.into_inner().unwrap() {
        panic::resume_unwind(payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_covers_every_id_exactly_once() {
        let seen = Mutex::new(vec![false; 100]);
        parallel_for(0, 100, 4, |id, _thread_id| {
            seen.lock().unwrap()[id] = true;
        });
        assert!(seen.into_inner().unwrap().iter().all(|&v| v));
    }

    #[test]
    fn test_single_thread_path() {
        let seen = Mutex::new(Vec::new());
        parallel_for(5, 10, 1, |id, thread_id| {
            assert_eq!(thread_id, 0);
            seen.lock().unwrap().push(id);
        });
        assert_eq!(seen.into_inner().unwrap(), vec![5, 6, 7, 8, 9]);
    }

    #[test]
    fn test_empty_range_is_a_no_op() {
        parallel_for(10, 10, 4, |_, _| panic!("should never run"));
    }

    #[test]
    #[should_panic(expected = "worker exploded")]
    fn test_panic_propagates_to_caller() {
        parallel_for(0, 8, 4, |id, _| {
            if id == 3 {
                panic!("worker exploded");
            }
        });
    }
}
