//! # Membench: Memory Bandwidth and Latency Benchmark Engine
//!
//! This crate measures what the memory subsystem actually delivers: bandwidth
//! and latency across sequential, random, copy and STREAM-triad access
//! patterns, swept over working-set sizes derived from the detected cache
//! hierarchy, with multi-threaded scaling and plausibility validation of the
//! results.
//!
//! ## Key Features
//!
//! - **Aligned Buffers**: Cache-line aligned allocations with deterministic
//!   fill patterns, no partial-line edge effects
//! - **Honest Kernels**: Fenced, `black_box`-guarded access loops that the
//!   optimizer cannot elide
//! - **Cache-Aware Sweeps**: Working-set ladders sized from the detected L1,
//!   L2 and shared-cache topology, per thread
//! - **Multi-Threaded Scaling**: Disjoint cache-line partitions per worker,
//!   wall-clock aggregation, no locks in the timed region
//! - **Result Validation**: Plausibility flags for virtualized hosts, timer
//!   glitches and impossible measurements
//! - **Matrix Multiply**: Pluggable GEMM backends with a portable scalar
//!   fallback, reported in GFLOPS
//!
//! ## Quick Start
//!
//! ```rust
//! use membench::{BenchConfig, BenchmarkEngine, DetectedPlatform, TestPattern};
//!
//! let platform = DetectedPlatform::new();
//! let mut engine = BenchmarkEngine::new(&platform, BenchConfig::default()).unwrap();
//!
//! // One megabyte, one buffer, ten iterations, single thread
//! engine.allocate_buffers(1024 * 1024, 1).unwrap();
//! let stats = engine
//!     .run_test(TestPattern::SequentialRead, 10, 1, false)
//!     .unwrap();
//! assert_eq!(stats.bytes_processed, 1024 * 1024 * 10);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod buffer;
pub mod config;
pub mod engine;
pub mod error;
pub mod kernels;
pub mod layout;
pub mod matrix;
pub mod platform;
pub mod report;
pub mod stats;
pub mod validate;
pub mod working_set;

// Re-export core types
pub use buffer::AlignedBuffer;
pub use config::BenchConfig;
pub use engine::BenchmarkEngine;
pub use error::{BenchError, Result};
pub use kernels::TestPattern;
pub use layout::AccessRange;
pub use matrix::{MatrixConfig, MatrixMultiplier, MatrixStats, ScalarMultiplier};
pub use platform::{
    CacheInfo, CpuAffinity, DetectedPlatform, MemorySpecs, Platform, SystemInfo,
};
pub use report::{OutputFormat, OutputFormatter, TestResult};
pub use stats::PerformanceStats;
pub use validate::{ResultValidator, ValidationFlag};
pub use working_set::{WorkingSet, WorkingSetEntry};

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the library (currently no-op, for future use)
pub fn init() {
    log::debug!("Initializing membench v{}", VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_functionality() {
        init();
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_version_info() {
        // Version should be semver format like "0.3.0"
        let parts: Vec<&str> = VERSION.split('.').collect();
        assert!(parts.len() >= 2);
    }
}
