//! Range alignment arithmetic and sizing helpers
//!
//! Every kernel inherits the [`AccessRange`] contract: the supplied byte
//! range is rounded to cache-line boundaries before the first access: start
//! rounds UP to the next boundary, end rounds DOWN to the previous one.
//! Partial cache lines waste bandwidth and confuse hardware prefetchers, so
//! they are trimmed rather than touched. A range that collapses to empty
//! after rounding is a legitimate "too small to test" outcome, not an error.

use crate::config::{
    LARGE_CACHE_ITER_MULTIPLIER, LARGE_CACHE_THRESHOLD, MEDIUM_CACHE_ITER_MULTIPLIER,
    MEDIUM_CACHE_THRESHOLD, MIN_BUFFER_SIZE, SMALL_CACHE_ITER_MULTIPLIER, SMALL_CACHE_THRESHOLD,
};

/// A half-open byte range `[start, end)` aligned to a power-of-two boundary
///
/// Rounding is idempotent: aligning an already-aligned range returns the
/// same range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessRange {
    start: usize,
    end: usize,
}

impl AccessRange {
    /// Round `[start, end)` to `line`-byte boundaries (start up, end down)
    ///
    /// `line` must be a power of two; this is the caller's contract, checked
    /// in debug builds only since kernels sit on the hot path.
    pub fn cache_aligned(start: usize, end: usize, line: usize) -> Self {
        debug_assert!(line.is_power_of_two());
        let aligned_start = (start + line - 1) & !(line - 1);
        let aligned_end = end & !(line - 1);
        Self {
            start: aligned_start,
            end: aligned_end.max(aligned_start),
        }
    }

    /// Round `[start, end)` to `word`-byte boundaries
    ///
    /// The triad kernel aligns to `size_of::<f64>()` rather than a full
    /// cache line; mechanically identical to [`Self::cache_aligned`].
    pub fn word_aligned(start: usize, end: usize, word: usize) -> Self {
        Self::cache_aligned(start, end, word)
    }

    /// Aligned start offset
    #[inline]
    pub fn start(&self) -> usize {
        self.start
    }

    /// Aligned end offset
    #[inline]
    pub fn end(&self) -> usize {
        self.end
    }

    /// Working set size of the aligned range; zero means "too small to test"
    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// True when the aligned range collapsed to nothing
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// Validate that `[start, end)` is a usable sub-range of a buffer
pub fn validate_range(start: usize, end: usize, buffer_size: usize, min_size: usize) -> bool {
    start < end && end <= buffer_size && (end - start) >= min_size
}

/// Per-buffer size for splitting `total_size` across `num_buffers`
///
/// Returns 0 when the parameters are invalid or the per-buffer share falls
/// below the minimum buffer size or the cache line size.
pub fn calculate_buffer_size(total_size: usize, num_buffers: usize, cache_line_size: usize) -> usize {
    if total_size == 0 || num_buffers == 0 {
        return 0;
    }
    let buffer_size = total_size / num_buffers;
    if buffer_size < MIN_BUFFER_SIZE || buffer_size < cache_line_size {
        return 0;
    }
    buffer_size
}

/// True when `size` is a multiple of the cache line size
#[inline]
pub fn is_cache_line_aligned(size: usize, cache_line_size: usize) -> bool {
    size & (cache_line_size - 1) == 0
}

/// Scale iteration count for cache-resident working sets
///
/// Small working sets complete one pass far below timer resolution; the
/// iteration count is scaled up so elapsed time stays measurable, then drops
/// back to the base count once the working set exceeds the largest cache
/// tier.
pub fn scale_iterations(base_iterations: usize, working_set_size: usize) -> usize {
    if working_set_size <= SMALL_CACHE_THRESHOLD {
        base_iterations * SMALL_CACHE_ITER_MULTIPLIER
    } else if working_set_size <= MEDIUM_CACHE_THRESHOLD {
        base_iterations * MEDIUM_CACHE_ITER_MULTIPLIER
    } else if working_set_size <= LARGE_CACHE_THRESHOLD {
        base_iterations * LARGE_CACHE_ITER_MULTIPLIER
    } else {
        base_iterations
    }
}
