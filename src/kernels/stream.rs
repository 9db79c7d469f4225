//! Copy and STREAM triad kernels
//!
//! Copy moves the aligned range between two buffers and counts both the read
//! and the write side. Triad computes `a[i] = b[i] + scalar * c[i]` over
//! double-precision elements; it aligns to `size_of::<f64>()` rather than a
//! full cache line and counts two reads plus one write.

use std::sync::atomic::{fence, AtomicBool, Ordering};
use std::time::Instant;

use crate::config::{CACHE_LINE_DOUBLES, DEFAULT_CACHE_LINE_SIZE, TRIAD_SCALAR};
use crate::layout::AccessRange;
use crate::stats::{calculate_stats, PerformanceStats};

/// Copy the aligned range from `src` to `dst`, `iterations` times
///
/// Delegates the move itself to `copy_from_slice` (memcpy), the fastest path
/// the platform offers; bytes_processed counts read + write (x2).
pub fn copy(
    src: &[u8],
    dst: &mut [u8],
    start_offset: usize,
    end_offset: usize,
    iterations: usize,
    cancel: &AtomicBool,
    ceiling_gbps: f64,
) -> PerformanceStats {
    let range = AccessRange::cache_aligned(start_offset, end_offset, DEFAULT_CACHE_LINE_SIZE);
    if range.is_empty() {
        return PerformanceStats::zero();
    }

    let working_set_size = range.len();
    let src_window = &src[range.start()..range.end()];
    let dst_window = &mut dst[range.start()..range.end()];

    let start_time = Instant::now();
    let mut completed = 0usize;

    for _ in 0..iterations {
        if cancel.load(Ordering::Relaxed) {
            break;
        }

        dst_window.copy_from_slice(src_window);

        fence(Ordering::SeqCst);
        completed += 1;
    }

    let time_seconds = start_time.elapsed().as_secs_f64();
    let bytes_processed = working_set_size * completed * 2;
    let operations = (working_set_size / DEFAULT_CACHE_LINE_SIZE) * completed;

    calculate_stats(bytes_processed, time_seconds, operations, ceiling_gbps)
}

/// STREAM triad: `a[i] = b[i] + scalar * c[i]` over f64 elements
///
/// Processed in 8-element chunks (one cache line of doubles) with a scalar
/// tail; bytes_processed counts read B, read C, write A (x3).
pub fn triad(
    a: &mut [u8],
    b: &[u8],
    c: &[u8],
    start_offset: usize,
    end_offset: usize,
    iterations: usize,
    cancel: &AtomicBool,
    ceiling_gbps: f64,
) -> PerformanceStats {
    let range = AccessRange::word_aligned(start_offset, end_offset, std::mem::size_of::<f64>());
    if range.is_empty() {
        return PerformanceStats::zero();
    }

    let working_set_size = range.len();

    // SAFETY: the windows start at 8-byte aligned offsets inside cache-line
    // aligned buffers and their rounded length is a multiple of 8.
    let (_, a_vals, _) = unsafe { a[range.start()..range.end()].align_to_mut::<f64>() };
    let (_, b_vals, _) = unsafe { b[range.start()..range.end()].align_to::<f64>() };
    let (_, c_vals, _) = unsafe { c[range.start()..range.end()].align_to::<f64>() };
    debug_assert_eq!(a_vals.len(), b_vals.len());
    debug_assert_eq!(a_vals.len(), c_vals.len());

    let num_elements = a_vals.len();

    let start_time = Instant::now();
    let mut completed = 0usize;

    for _ in 0..iterations {
        if cancel.load(Ordering::Relaxed) {
            break;
        }

        let mut i = 0;
        while i < num_elements {
            let chunk_end = (i + CACHE_LINE_DOUBLES).min(num_elements);
            for j in i..chunk_end {
                a_vals[j] = b_vals[j] + TRIAD_SCALAR * c_vals[j];
            }
            i = chunk_end;
        }

        fence(Ordering::SeqCst);
        completed += 1;
    }

    let time_seconds = start_time.elapsed().as_secs_f64();
    let bytes_processed = working_set_size * completed * 3;
    let operations = num_elements * completed;

    calculate_stats(bytes_processed, time_seconds, operations, ceiling_gbps)
}
