//! Access-pattern kernels
//!
//! The kernels are the code that actually touches memory. They share a
//! discipline that keeps the measurement honest:
//!
//! - The supplied byte range is rounded to cache-line boundaries before the
//!   first access ([`crate::layout::AccessRange`] contract). An empty rounded
//!   range returns all-zero statistics, never an error.
//! - Memory is processed one cache line (8 native words) per inner step so
//!   hardware prefetchers see a regular stride.
//! - A `SeqCst` fence is issued after every iteration and read accumulators
//!   pass through [`std::hint::black_box`], so neither the optimizer nor the
//!   CPU can elide work with no externally observable effect.
//! - The cancellation flag is checked once per iteration, not per access;
//!   finer-grained checks would themselves perturb the measurement. A
//!   cancelled kernel reports the iterations it completed as partial
//!   statistics.
//!
//! Writers require exclusive slices; the engine hands each worker a disjoint
//! partition, so no synchronization crosses the timed loop.

mod random;
mod sequential;
mod stream;

pub use random::{random_read, random_write};
pub use sequential::{sequential_read, sequential_write};
pub use stream::{copy, triad};

use serde::{Deserialize, Serialize};

/// Memory access patterns the engine can run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TestPattern {
    /// Streaming read over the partition
    SequentialRead,
    /// Streaming write with an iteration-varying pattern
    SequentialWrite,
    /// Cache-line reads in a fixed random permutation
    RandomRead,
    /// Cache-line writes in a fixed random permutation
    RandomWrite,
    /// Buffer-to-buffer copy (bytes counted for both sides)
    Copy,
    /// STREAM triad `a[i] = b[i] + scalar * c[i]` over f64
    Triad,
    /// Dense matrix multiply via the GEMM capability (GFLOPS-primary)
    MatrixMultiply,
}

impl TestPattern {
    /// Human-readable pattern name for reports
    pub fn name(&self) -> &'static str {
        match self {
            TestPattern::SequentialRead => "Sequential Read",
            TestPattern::SequentialWrite => "Sequential Write",
            TestPattern::RandomRead => "Random Read",
            TestPattern::RandomWrite => "Random Write",
            TestPattern::Copy => "Copy",
            TestPattern::Triad => "Triad",
            TestPattern::MatrixMultiply => "Matrix Multiply",
        }
    }

    /// Parse a pattern from its CLI-style identifier
    pub fn from_str_id(id: &str) -> Option<Self> {
        match id {
            "sequential_read" => Some(TestPattern::SequentialRead),
            "sequential_write" => Some(TestPattern::SequentialWrite),
            "random_read" => Some(TestPattern::RandomRead),
            "random_write" => Some(TestPattern::RandomWrite),
            "copy" => Some(TestPattern::Copy),
            "triad" => Some(TestPattern::Triad),
            "matrix_multiply" => Some(TestPattern::MatrixMultiply),
            _ => None,
        }
    }

    /// Number of buffers this pattern reads or writes
    pub fn buffers_required(&self) -> usize {
        match self {
            TestPattern::Copy => 2,
            TestPattern::Triad => 3,
            TestPattern::MatrixMultiply => 0,
            _ => 1,
        }
    }

    /// All bandwidth patterns in report order
    pub fn all_bandwidth() -> [TestPattern; 6] {
        [
            TestPattern::SequentialRead,
            TestPattern::SequentialWrite,
            TestPattern::RandomRead,
            TestPattern::RandomWrite,
            TestPattern::Copy,
            TestPattern::Triad,
        ]
    }
}

impl std::fmt::Display for TestPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// View an aligned byte window as native words
///
/// The window must start on an 8-byte boundary and have a length that is a
/// multiple of 8, guaranteed by the cache-line rounding that produced it.
#[inline]
pub(crate) fn as_words(window: &[u8]) -> &[u64] {
    // SAFETY: the window comes from a cache-line aligned buffer at a
    // cache-line aligned offset, so the pointer satisfies u64 alignment and
    // the rounded length is a multiple of 8.
    let (prefix, words, suffix) = unsafe { window.align_to::<u64>() };
    debug_assert!(prefix.is_empty() && suffix.is_empty());
    words
}

/// Mutable counterpart of [`as_words`]
#[inline]
pub(crate) fn as_words_mut(window: &mut [u8]) -> &mut [u64] {
    // SAFETY: same alignment argument as `as_words`.
    let (prefix, words, suffix) = unsafe { window.align_to_mut::<u64>() };
    debug_assert!(prefix.is_empty() && suffix.is_empty());
    words
}
