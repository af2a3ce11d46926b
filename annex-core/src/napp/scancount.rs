//! FastScanCount: counts, per candidate id, how many of a set of sorted
//! posting lists contain it, and returns the ids whose count exceeds a
//! threshold — the intersection-counting primitive NAPP search reduces to.
//!
//! Grounded on `fastscancount_avx2.h`: ids are processed in cache-sized
//! windows so the `u8` counter array stays resident, counters are
//! incremented unconditionally within a window, and the window is then
//! scanned for counts exceeding the threshold. The scan step additionally
//! dispatches to an AVX2 compare-and-movemask routine when available,
//! mirroring the distance kernels' runtime feature detection.

use std::sync::Arc;

/// Ids are processed in windows this wide so the `u8` counter array for a
/// window fits comfortably in L1/L2 cache.
const WINDOW_SIZE: usize = 32_768;

/// Counts occurrences of each id (in `0..max_id`) across `lists` (each
/// sorted ascending) and returns every id whose count is `> threshold`, in
/// ascending order.
#[must_use]
pub fn scan_count(lists: &[Arc<Vec<u32>>], max_id: u32, threshold: u8) -> Vec<u32> {
    let mut counters = vec![0u8; WINDOW_SIZE];
    let mut cursors = vec![0usize; lists.len()];
    let mut out = Vec::new();

    let mut start: u32 = 0;
    while start < max_id {
        let window_end = start.saturating_add(WINDOW_SIZE as u32).min(max_id);
        let window_len = (window_end - start) as usize;
        counters[..window_len].fill(0);

        for (list, cursor) in lists.iter().zip(cursors.iter_mut()) {
            let mut i = *cursor;
            while i < list.len() && list[i] < window_end {
                let idx = (list[i] - start) as usize;
                counters[idx] = counters[idx].saturating_add(1);
                i += 1;
            }
            *cursor = i;
        }

        find_above_threshold(&counters[..window_len], threshold, start, &mut out);
        start = window_end;
    }

    out
}

/// Appends every index in `counters` whose value is `> threshold` to `out`,
/// offset by `base`. Dispatches to an AVX2 routine on x86_64 when available.
fn find_above_threshold(counters: &[u8], threshold: u8, base: u32, out: &mut Vec<u32>) {
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx2") {
            unsafe { find_above_threshold_avx2(counters, threshold, base, out) };
            return;
        }
    }

    find_above_threshold_scalar(counters, threshold, base, out);
}

fn find_above_threshold_scalar(counters: &[u8], threshold: u8, base: u32, out: &mut Vec<u32>) {
    for (i, &c) in counters.iter().enumerate() {
        if c > threshold {
            out.push(base + i as u32);
        }
    }
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn find_above_threshold_avx2(counters: &[u8], threshold: u8, base: u32, out: &mut Vec<u32>) {
    use std::arch::x86_64::*;

    let comprand = unsafe { _mm256_set1_epi8(threshold as i8) };
    let vlen = counters.len() / 32;

    for v in 0..vlen {
        let offset = v * 32;
        // SAFETY: offset + 32 <= counters.len() because v < vlen = len / 32.
        let chunk = unsafe { _mm256_loadu_si256(counters.as_ptr().add(offset).cast()) };
        let cmp = unsafe { _mm256_cmpgt_epi8(chunk, comprand) };
        let mut bits = unsafe { _mm256_movemask_epi8(cmp) } as u32;
        while bits != 0 {
            let bit = bits.trailing_zeros();
            out.push(base + offset as u32 + bit);
            bits &= bits - 1;
        }
    }

    find_above_threshold_scalar(&counters[vlen * 32..], threshold, base + (vlen * 32) as u32, out);
}
