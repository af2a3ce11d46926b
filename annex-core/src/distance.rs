//! SIMD-accelerated distance metrics for vector comparison.
//!
//! # Performance Strategy
//!
//! Uses 4-way accumulator unrolling to break FMA dependency chains:
//! - FMA latency: ~4 cycles
//! - FMA throughput: 0.5 cycles (2 ops/cycle)
//! - Single accumulator: Pipeline stalls, limited by latency
//! - Four accumulators: Pipeline stays full, limited by throughput
//!
//! Expected speedup: 4-6x on high-dimensional vectors (768-1536D)

/// Distance metric for vector comparison
#[derive(Debug, Clone, Copy)]
pub enum DistanceMetric {
    Euclidean,
    Cosine,
    DotProduct,
}

/// Compute L2 (Euclidean) distance between two vectors with SIMD acceleration.
///
/// # Performance
///
/// - Scalar: ~2ns per dimension
/// - AVX2: ~0.3ns per dimension (6-7x faster)
/// - NEON: ~0.4ns per dimension (5x faster)
///
/// # Architecture Dispatch
///
/// - x86_64 + AVX2: Uses AVX2 intrinsics (runtime detection)
/// - aarch64: Uses NEON intrinsics (always available)
/// - Fallback: Portable scalar implementation
#[inline]
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());

    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx2") {
            return unsafe { euclidean_distance_avx2(a, b) };
        }
    }

    #[cfg(target_arch = "aarch64")]
    {
        return unsafe { euclidean_distance_neon(a, b) };
    }

    euclidean_distance_scalar(a, b)
}

/// Scalar implementation (portable fallback)
#[inline]
pub fn euclidean_distance_scalar(a: &[f32], b: &[f32]) -> f32 {
    let mut sum = 0.0_f32;

    for i in 0..a.len() {
        let diff = a[i] - b[i];
        sum += diff * diff;
    }

    sum.sqrt()
}

/// AVX2 implementation with 4-way accumulator unrolling (x86_64 only)
///
/// # Optimization Strategy
///
/// Uses 4 independent accumulators (sum0, sum1, sum2, sum3) to break
/// FMA dependency chains and maximize pipeline utilization.
///
/// # Pipeline Analysis
///
/// - Single accumulator: 1 FMA / 4 cycles = 0.25 ops/cycle (latency-bound)
/// - Four accumulators: 4 FMA / 4 cycles = 1 ops/cycle (approaching 2 ops/cycle theoretical max)
///
/// # Loop Structure
///
/// Main loop: Process 32 floats/iteration (4 accumulators × 8 floats/vector)
/// Tail loop: Process remaining 8-float chunks
/// Scalar tail: Process final <8 elements
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2", enable = "fma")]
unsafe fn euclidean_distance_avx2(a: &[f32], b: &[f32]) -> f32 {
    use std::arch::x86_64::*;

    let len = a.len();
    let mut i = 0;

    // Four independent accumulators to break dependency chains
    let mut sum0 = _mm256_setzero_ps();
    let mut sum1 = _mm256_setzero_ps();
    let mut sum2 = _mm256_setzero_ps();
    let mut sum3 = _mm256_setzero_ps();

    // Main loop: Process 32 floats per iteration (4 vectors × 8 floats)
    // This keeps 4 FMA units busy, hiding latency
    while i + 32 <= len {
        // Load and compute differences
        let va0 = unsafe { _mm256_loadu_ps(a.as_ptr().add(i)) };
        let vb0 = unsafe { _mm256_loadu_ps(b.as_ptr().add(i)) };
        let diff0 = _mm256_sub_ps(va0, vb0);

        let va1 = unsafe { _mm256_loadu_ps(a.as_ptr().add(i + 8)) };
        let vb1 = unsafe { _mm256_loadu_ps(b.as_ptr().add(i + 8)) };
        let diff1 = _mm256_sub_ps(va1, vb1);

        let va2 = unsafe { _mm256_loadu_ps(a.as_ptr().add(i + 16)) };
        let vb2 = unsafe { _mm256_loadu_ps(b.as_ptr().add(i + 16)) };
        let diff2 = _mm256_sub_ps(va2, vb2);

        let va3 = unsafe { _mm256_loadu_ps(a.as_ptr().add(i + 24)) };
        let vb3 = unsafe { _mm256_loadu_ps(b.as_ptr().add(i + 24)) };
        let diff3 = _mm256_sub_ps(va3, vb3);

        // Fused multiply-add: sum = diff * diff + sum
        // Each accumulator is independent, allowing parallel execution
        sum0 = _mm256_fmadd_ps(diff0, diff0, sum0);
        sum1 = _mm256_fmadd_ps(diff1, diff1, sum1);
        sum2 = _mm256_fmadd_ps(diff2, diff2, sum2);
        sum3 = _mm256_fmadd_ps(diff3, diff3, sum3);

        i += 32;
    }

    // Tail loop: Process remaining 8-float chunks
    while i + 8 <= len {
        let va = unsafe { _mm256_loadu_ps(a.as_ptr().add(i)) };
        let vb = unsafe { _mm256_loadu_ps(b.as_ptr().add(i)) };
        let diff = _mm256_sub_ps(va, vb);
        sum0 = _mm256_fmadd_ps(diff, diff, sum0);
        i += 8;
    }

    // Reduce accumulators: Combine the 4 independent sums
    let sum_combined = _mm256_add_ps(
        _mm256_add_ps(sum0, sum1),
        _mm256_add_ps(sum2, sum3),
    );

    // Horizontal reduction: Sum 8 lanes into a scalar
    // Extract high 128 bits and add to low 128 bits
    let sum_high = _mm256_extractf128_ps(sum_combined, 1);
    let sum_low = _mm256_castps256_ps128(sum_combined);
    let sum128 = _mm_add_ps(sum_low, sum_high);

    // Horizontal add within 128-bit register
    let sum64 = _mm_add_ps(sum128, _mm_movehl_ps(sum128, sum128));
    let sum32 = _mm_add_ss(sum64, _mm_shuffle_ps(sum64, sum64, 0x55));

    let mut total = _mm_cvtss_f32(sum32);

    // Scalar tail: Process remaining elements
    while i < len {
        let diff = a[i] - b[i];
        total += diff * diff;
        i += 1;
    }

    total.sqrt()
}

/// NEON implementation with 4-way accumulator unrolling (aarch64)
///
/// # Optimization Strategy
///
/// Same strategy as AVX2: 4 independent accumulators to maximize throughput.
/// NEON processes 4 floats per vector (vs 8 for AVX2), so main loop processes 16 floats.
#[cfg(target_arch = "aarch64")]
#[target_feature(enable = "neon")]
unsafe fn euclidean_distance_neon(a: &[f32], b: &[f32]) -> f32 {
    use std::arch::aarch64::*;

    let len = a.len();
    let mut i = 0;

    // Four independent accumulators
    let mut sum0 = vdupq_n_f32(0.0);
    let mut sum1 = vdupq_n_f32(0.0);
    let mut sum2 = vdupq_n_f32(0.0);
    let mut sum3 = vdupq_n_f32(0.0);

    // Main loop: Process 16 floats per iteration (4 vectors × 4 floats)
    while i + 16 <= len {
        let va0 = vld1q_f32(a.as_ptr().add(i));
        let vb0 = vld1q_f32(b.as_ptr().add(i));
        let diff0 = vsubq_f32(va0, vb0);

        let va1 = vld1q_f32(a.as_ptr().add(i + 4));
        let vb1 = vld1q_f32(b.as_ptr().add(i + 4));
        let diff1 = vsubq_f32(va1, vb1);

        let va2 = vld1q_f32(a.as_ptr().add(i + 8));
        let vb2 = vld1q_f32(b.as_ptr().add(i + 8));
        let diff2 = vsubq_f32(va2, vb2);

        let va3 = vld1q_f32(a.as_ptr().add(i + 12));
        let vb3 = vld1q_f32(b.as_ptr().add(i + 12));
        let diff3 = vsubq_f32(va3, vb3);

        // Fused multiply-add
        sum0 = vfmaq_f32(sum0, diff0, diff0);
        sum1 = vfmaq_f32(sum1, diff1, diff1);
        sum2 = vfmaq_f32(sum2, diff2, diff2);
        sum3 = vfmaq_f32(sum3, diff3, diff3);

        i += 16;
    }

    // Tail loop: Process remaining 4-float chunks
    while i + 4 <= len {
        let va = vld1q_f32(a.as_ptr().add(i));
        let vb = vld1q_f32(b.as_ptr().add(i));
        let diff = vsubq_f32(va, vb);
        sum0 = vfmaq_f32(sum0, diff, diff);
        i += 4;
    }

    // Reduce accumulators
    let sum_combined = vaddq_f32(vaddq_f32(sum0, sum1), vaddq_f32(sum2, sum3));

    // Horizontal reduction: Sum 4 lanes
    let sum_pair = vpadd_f32(vget_low_f32(sum_combined), vget_high_f32(sum_combined));
    let sum_total = vpadd_f32(sum_pair, sum_pair);

    let mut total = vget_lane_f32(sum_total, 0);

    // Scalar tail
    while i < len {
        let diff = a[i] - b[i];
        total += diff * diff;
        i += 1;
    }

    total.sqrt()
}

/// Compute cosine distance (1 - cosine_similarity)
#[inline]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    1.0 - (dot / (norm_a * norm_b))
}

/// Squared L2 distance. Skips the final `sqrt()`, which is monotonic and
/// therefore irrelevant for ranking — useful on search hot paths that only
/// compare distances rather than report their true magnitude.
#[inline]
pub fn squared_euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Negative inner product, expressed as a distance (smaller is "closer").
/// Matches nmslib's `negdotprod` space: ranking by this is equivalent to
/// ranking by raw dot product descending.
#[inline]
pub fn negative_inner_product(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    -a.iter().zip(b.iter()).map(|(x, y)| x * y).sum::<f32>()
}

/// Cosine distance against a pre-normalized vector, avoiding `b`'s norm
/// computation on every call. `a` is still normalized on the fly since
/// queries are rarely pre-normalized by callers.
#[inline]
pub fn cosine_distance_prenormalized(a: &[f32], b_normalized: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b_normalized.len());

    let dot: f32 = a.iter().zip(b_normalized.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 { 1.0 } else { 1.0 - (dot / norm_a) }
}

/// L2-normalizes `v` in place. Used to precompute the "prenormalized" side
/// of `cosine_distance_prenormalized` once per vector instead of per query.
pub fn normalize_in_place(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Hamming distance between two 32-bit fingerprints (popcount of the XOR).
#[inline]
pub fn hamming_distance_u32(a: u32, b: u32) -> u32 {
    (a ^ b).count_ones()
}

/// Prefetches the cache line containing `ptr` for a read that will happen
/// shortly. A no-op on architectures without an explicit prefetch intrinsic.
#[inline]
pub fn prefetch_ptr<T>(ptr: *const T) {
    #[cfg(target_arch = "x86_64")]
    unsafe {
        use std::arch::x86_64::{_mm_prefetch, _MM_HINT_T0};
        _mm_prefetch(ptr.cast::<i8>(), _MM_HINT_T0);
    }

    #[cfg(not(target_arch = "x86_64"))]
    {
        let _ = ptr;
    }
}

/// Prefetches a candidate's vector payload (e.g. the next neighbor during a
/// graph walk) before it's read for distance computation.
#[inline]
pub fn prefetch_read(data: &[f32]) {
    prefetch_ptr(data.as_ptr());
}
