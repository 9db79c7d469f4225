//! Sequential read and write kernels
//!
//! Streaming access over the rounded range, one cache line per inner step.
//! No cache flushing and no interference: hardware prefetchers, cache
//! replacement, and the memory controller are left to work as designed.

use std::hint::black_box;
use std::sync::atomic::{fence, AtomicBool, Ordering};
use std::time::Instant;

use crate::config::{CACHE_LINE_WORDS, DEFAULT_CACHE_LINE_SIZE, TEST_PATTERN_BASE};
use crate::kernels::{as_words, as_words_mut};
use crate::layout::AccessRange;
use crate::stats::{calculate_stats, PerformanceStats};

/// Sequential read: sum 8-word groups across the range, `iterations` times
///
/// The accumulator is the side channel that forces the reads to happen; it
/// is kept live with `black_box` so the whole loop cannot be discarded as
/// dead code.
pub fn sequential_read(
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

    let words = as_words(&buffer[range.start()..range.end()]);
    let working_set_size = range.len();

    let start_time = Instant::now();
    let mut completed = 0usize;

    for _ in 0..iterations {
        if cancel.load(Ordering::Relaxed) {
            break;
        }

        let mut sum = 0u64;
        let mut i = 0;
        while i < words.len() {
            sum = sum
                .wrapping_add(words[i])
                .wrapping_add(words[i + 1])
                .wrapping_add(words[i + 2])
                .wrapping_add(words[i + 3])
                .wrapping_add(words[i + 4])
                .wrapping_add(words[i + 5])
                .wrapping_add(words[i + 6])
                .wrapping_add(words[i + 7]);
            i += CACHE_LINE_WORDS;
        }
        black_box(sum);

        fence(Ordering::SeqCst);
        completed += 1;
    }

    let time_seconds = start_time.elapsed().as_secs_f64();
    let bytes_processed = working_set_size * completed;
    let operations = (working_set_size / DEFAULT_CACHE_LINE_SIZE) * completed;

    calculate_stats(bytes_processed, time_seconds, operations, ceiling_gbps)
}

/// Sequential write: store an iteration-varying pattern per cache line
///
/// The pattern is `BASE + iteration + index`; varying it across iterations
/// defeats dead-store elimination: identical stores to the same location
/// could otherwise legally collapse to the final iteration.
pub fn sequential_write(
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

    let working_set_size = range.len();
    let words = as_words_mut(&mut buffer[range.start()..range.end()]);

    let start_time = Instant::now();
    let mut completed = 0usize;

    for iter in 0..iterations {
        if cancel.load(Ordering::Relaxed) {
            break;
        }

        let pattern = TEST_PATTERN_BASE.wrapping_add(iter as u64);
        let mut i = 0;
        while i < words.len() {
            words[i] = pattern.wrapping_add(i as u64);
            words[i + 1] = pattern.wrapping_add(i as u64 + 1);
            words[i + 2] = pattern.wrapping_add(i as u64 + 2);
            words[i + 3] = pattern.wrapping_add(i as u64 + 3);
            words[i + 4] = pattern.wrapping_add(i as u64 + 4);
            words[i + 5] = pattern.wrapping_add(i as u64 + 5);
            words[i + 6] = pattern.wrapping_add(i as u64 + 6);
            words[i + 7] = pattern.wrapping_add(i as u64 + 7);
            i += CACHE_LINE_WORDS;
        }

        fence(Ordering::SeqCst);
        completed += 1;
    }

    let time_seconds = start_time.elapsed().as_secs_f64();
    let bytes_processed = working_set_size * completed;
    let operations = (working_set_size / DEFAULT_CACHE_LINE_SIZE) * completed;

    calculate_stats(bytes_processed, time_seconds, operations, ceiling_gbps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::AlignedBuffer;

    fn no_cancel() -> AtomicBool {
        AtomicBool::new(false)
    }

    #[test]
    fn test_read_counts_bytes() {
        let buffer = AlignedBuffer::new(1024 * 1024, 64).unwrap();
        let stats = sequential_read(buffer.data(), 0, buffer.size(), 10, &no_cancel(), f64::INFINITY);
        assert_eq!(stats.bytes_processed, 1024 * 1024 * 10);
        assert!(stats.bandwidth_gbps > 0.0);
        assert!(stats.time_seconds > 0.0);
    }

    #[test]
    fn test_read_empty_range_is_noop() {
        let buffer = AlignedBuffer::new(4096, 64).unwrap();
        // 50 bytes between offsets, below one cache line
        let stats = sequential_read(buffer.data(), 10, 60, 100, &no_cancel(), 60.0);
        assert_eq!(stats, PerformanceStats::zero());
    }

    #[test]
    fn test_write_varies_pattern_across_iterations() {
        let mut buffer = AlignedBuffer::new(4096, 64).unwrap();
        sequential_write(buffer.data_mut(), 0, 4096, 1, &no_cancel(), 60.0);
        let first_word = u64::from_ne_bytes(buffer.data()[..8].try_into().unwrap());
        assert_eq!(first_word, TEST_PATTERN_BASE);

        sequential_write(buffer.data_mut(), 0, 4096, 2, &no_cancel(), 60.0);
        let first_word = u64::from_ne_bytes(buffer.data()[..8].try_into().unwrap());
        // Last completed iteration was iter == 1
        assert_eq!(first_word, TEST_PATTERN_BASE.wrapping_add(1));
    }

    #[test]
    fn test_write_rounds_range_inward() {
        let mut buffer = AlignedBuffer::new(4096, 64).unwrap();
        let before_first = buffer[0];
        let stats = sequential_write(buffer.data_mut(), 10, 200, 1, &no_cancel(), 60.0);
        // Rounded range is [64, 192): 2 cache lines
        assert_eq!(stats.bytes_processed, 128);
        // Byte 0 is outside the rounded range and untouched
        assert_eq!(buffer[0], before_first);
    }

    #[test]
    fn test_cancellation_before_first_iteration() {
        let buffer = AlignedBuffer::new(64 * 1024, 64).unwrap();
        let cancel = AtomicBool::new(true);
        let start = Instant::now();
        let stats = sequential_read(buffer.data(), 0, buffer.size(), 1_000_000, &cancel, 60.0);
        // No iteration ran: zero bytes and essentially zero elapsed time
        assert_eq!(stats.bytes_processed, 0);
        assert!(start.elapsed().as_secs_f64() < 1.0);
    }

    #[test]
    fn test_zero_iterations() {
        let buffer = AlignedBuffer::new(4096, 64).unwrap();
        let stats = sequential_read(buffer.data(), 0, 4096, 0, &no_cancel(), 60.0);
        assert_eq!(stats.bytes_processed, 0);
        assert_eq!(stats.bandwidth_gbps, 0.0);
    }
}
