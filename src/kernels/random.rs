//! Random access kernels
//!
//! Poor-locality access over the rounded range: the list of cache-line
//! offsets is built once, shuffled once, and the same permutation is replayed
//! every iteration. Re-shuffling per iteration would fold permutation cost
//! into the measurement; replaying isolates the access-pattern cost itself.

use rand::seq::SliceRandom;
use std::hint::black_box;
use std::sync::atomic::{fence, AtomicBool, Ordering};
use std::time::Instant;

use crate::config::{CACHE_LINE_WORDS, DEFAULT_CACHE_LINE_SIZE, TEST_PATTERN_BASE};
use crate::kernels::{as_words, as_words_mut};
use crate::layout::AccessRange;
use crate::stats::{calculate_stats, PerformanceStats};

/// Cache-line offsets of the rounded range in a fixed random order
fn shuffled_line_offsets(range: AccessRange) -> Vec<usize> {
    let mut offsets: Vec<usize> = (range.start()..range.end())
        .step_by(DEFAULT_CACHE_LINE_SIZE)
        .collect();
    offsets.shuffle(&mut rand::thread_rng());
    offsets
}

/// Random read: full cache lines in a fixed permutation
pub fn random_read(
    buffer: &[u8],
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

    let offsets = shuffled_line_offsets(range);
    let words = as_words(&buffer[range.start()..range.end()]);
    let base = range.start();

    let start_time = Instant::now();
    let mut completed = 0usize;

    for _ in 0..iterations {
        if cancel.load(Ordering::Relaxed) {
            break;
        }

        let mut sum = 0u64;
        for &offset in &offsets {
            let w = (offset - base) / std::mem::size_of::<u64>();
            for j in 0..CACHE_LINE_WORDS {
                sum = sum.wrapping_add(words[w + j]);
            }
        }
        black_box(sum);

        fence(Ordering::SeqCst);
        completed += 1;
    }

    let time_seconds = start_time.elapsed().as_secs_f64();
    let bytes_processed = offsets.len() * DEFAULT_CACHE_LINE_SIZE * completed;
    let operations = offsets.len() * completed;

    calculate_stats(bytes_processed, time_seconds, operations, ceiling_gbps)
}

/// Random write: full cache lines in a fixed permutation
///
/// The stored pattern folds in the iteration and the line offset, so stores
/// differ across iterations and across lines.
pub fn random_write(
    buffer: &mut [u8],
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

    let offsets = shuffled_line_offsets(range);
    let base = range.start();
    let words = as_words_mut(&mut buffer[range.start()..range.end()]);

    let start_time = Instant::now();
    let mut completed = 0usize;

    for iter in 0..iterations {
        if cancel.load(Ordering::Relaxed) {
            break;
        }

        let pattern = TEST_PATTERN_BASE.wrapping_add(iter as u64);
        for &offset in &offsets {
            let w = (offset - base) / std::mem::size_of::<u64>();
            for j in 0..CACHE_LINE_WORDS {
                words[w + j] = pattern.wrapping_add(offset as u64).wrapping_add(j as u64);
            }
        }

        fence(Ordering::SeqCst);
        completed += 1;
    }

    let time_seconds = start_time.elapsed().as_secs_f64();
    let bytes_processed = offsets.len() * DEFAULT_CACHE_LINE_SIZE * completed;
    let operations = offsets.len() * completed;

    calculate_stats(bytes_processed, time_seconds, operations, ceiling_gbps)
}
