//! Benchmark configuration and tuning constants
//!
//! Centralizes the magic numbers of the benchmark (buffer minimums,
//! working-set bounds, iteration scaling thresholds) and provides a validated
//! [`BenchConfig`] that can be initialized from environment variables or a
//! JSON file.
//!
//! The bandwidth realism ceiling deserves a note: measured bandwidth above
//! the ceiling is *clamped*, not rejected, because on virtualized or
//! oversubscribed hosts a timer glitch can produce numbers far beyond what
//! the memory controller can deliver. The ceiling defaults to a conservative
//! value tuned for virtualized DDR5; set it to `f64::INFINITY` on bare metal
//! where genuine high-bandwidth measurements must survive untouched.

use crate::error::{BenchError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

/// One kibibyte
pub const KB: usize = 1024;
/// One mebibyte
pub const MB: usize = 1024 * KB;
/// One gibibyte
pub const GB: usize = 1024 * MB;

/// Minimum buffer size the engine will accept per buffer
pub const MIN_BUFFER_SIZE: usize = 4 * KB;
/// Minimum working set size produced by the generator
pub const MIN_WORKING_SET_SIZE: usize = 4 * KB;
/// Maximum working set size produced by the generator
pub const MAX_WORKING_SET_SIZE: usize = 4 * GB;

/// Default cache line size when detection is unavailable
pub const DEFAULT_CACHE_LINE_SIZE: usize = 64;
/// Number of u64 words in one 64-byte cache line
pub const CACHE_LINE_WORDS: usize = 8;
/// Number of f64 elements in one 64-byte cache line
pub const CACHE_LINE_DOUBLES: usize = 8;

/// Working set fractions of a cache tier: 1/8, 1/4, 1/2, full
pub const WORKING_SET_FRACTIONS: [usize; 4] = [8, 4, 2, 1];
/// Beyond-cache multipliers of the shared cache: 2x, 4x, 8x
pub const WORKING_SET_MULTIPLIERS: [usize; 3] = [2, 4, 8];
/// Fixed beyond-cache working set sizes
pub const STANDARD_WORKING_SETS: [usize; 7] = [
    64 * MB,
    128 * MB,
    256 * MB,
    512 * MB,
    GB,
    2 * GB,
    4 * GB,
];

/// Iteration multiplier for working sets at or below [`SMALL_CACHE_THRESHOLD`]
pub const SMALL_CACHE_ITER_MULTIPLIER: usize = 100_000;
/// Iteration multiplier for working sets at or below [`MEDIUM_CACHE_THRESHOLD`]
pub const MEDIUM_CACHE_ITER_MULTIPLIER: usize = 100_000;
/// Iteration multiplier for working sets at or below [`LARGE_CACHE_THRESHOLD`]
pub const LARGE_CACHE_ITER_MULTIPLIER: usize = 1_000;

/// Working sets up to this size get the small-cache iteration multiplier
pub const SMALL_CACHE_THRESHOLD: usize = 64 * KB;
/// Working sets up to this size get the medium-cache iteration multiplier
pub const MEDIUM_CACHE_THRESHOLD: usize = 4 * MB;
/// Working sets up to this size get the large-cache iteration multiplier
pub const LARGE_CACHE_THRESHOLD: usize = 8 * MB;

/// Base value for the iteration-varying write pattern
pub const TEST_PATTERN_BASE: u64 = 0x0123_4567_89AB_CDEF;
/// Scalar used by the STREAM triad kernel
pub const TRIAD_SCALAR: f64 = 3.14159;

/// Default number of iterations per test
pub const DEFAULT_ITERATIONS: usize = 10;
/// Default square matrix dimension for the matrix multiply test
pub const DEFAULT_MATRIX_SIZE: usize = 1024;
/// Allowed thread oversubscription factor over logical cores
pub const MAX_THREAD_OVERSUBSCRIPTION: usize = 2;

/// Minimum plausible memory latency in nanoseconds
pub const MIN_LATENCY_NS: f64 = 0.1;
/// Maximum plausible efficiency percentage inside a VM
pub const MAX_EFFICIENCY_VIRTUALIZED: f64 = 50.0;
/// Default bandwidth realism ceiling in GB/s (virtualized DDR5 assumption)
pub const DEFAULT_BANDWIDTH_CEILING_GBPS: f64 = 60.0;

/// Validated benchmark configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchConfig {
    /// Cache line size in bytes used for range alignment
    pub cache_line_size: usize,
    /// Minimum per-buffer size accepted by the engine
    pub min_buffer_size: usize,
    /// Minimum working set size kept by the generator
    pub min_working_set: usize,
    /// Maximum working set size kept by the generator
    pub max_working_set: usize,
    /// Base iteration count before cache-resident scaling
    pub base_iterations: usize,
    /// Bandwidth realism ceiling in GB/s; `f64::INFINITY` disables clamping
    pub bandwidth_ceiling_gbps: f64,
    /// Allowed thread oversubscription factor over logical cores
    pub thread_oversubscription: usize,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            cache_line_size: DEFAULT_CACHE_LINE_SIZE,
            min_buffer_size: MIN_BUFFER_SIZE,
            min_working_set: MIN_WORKING_SET_SIZE,
            max_working_set: MAX_WORKING_SET_SIZE,
            base_iterations: DEFAULT_ITERATIONS,
            bandwidth_ceiling_gbps: DEFAULT_BANDWIDTH_CEILING_GBPS,
            thread_oversubscription: MAX_THREAD_OVERSUBSCRIPTION,
        }
    }
}

impl BenchConfig {
    /// Preset for virtualized hosts: conservative ceiling, default sizes
    pub fn virtualized() -> Self {
        Self {
            bandwidth_ceiling_gbps: DEFAULT_BANDWIDTH_CEILING_GBPS,
            ..Self::default()
        }
    }

    /// Preset for bare-metal hosts: no bandwidth clamping
    pub fn bare_metal() -> Self {
        Self {
            bandwidth_ceiling_gbps: f64::INFINITY,
            ..Self::default()
        }
    }

    /// Validate the configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        if self.cache_line_size == 0 || !self.cache_line_size.is_power_of_two() {
            return Err(BenchError::configuration(format!(
                "cache_line_size must be a power of two, got {}",
                self.cache_line_size
            )));
        }
        if self.min_buffer_size < self.cache_line_size {
            return Err(BenchError::configuration(
                "min_buffer_size must be at least one cache line",
            ));
        }
        if self.min_working_set > self.max_working_set {
            return Err(BenchError::configuration(format!(
                "min_working_set {} exceeds max_working_set {}",
                self.min_working_set, self.max_working_set
            )));
        }
        if self.base_iterations == 0 {
            return Err(BenchError::configuration("base_iterations must be > 0"));
        }
        if !(self.bandwidth_ceiling_gbps > 0.0) {
            return Err(BenchError::configuration(
                "bandwidth_ceiling_gbps must be positive (use INFINITY to disable)",
            ));
        }
        if self.thread_oversubscription == 0 {
            return Err(BenchError::configuration(
                "thread_oversubscription must be > 0",
            ));
        }
        Ok(())
    }

    /// Initialize from environment variables with the `MEMBENCH_` prefix
    pub fn from_env() -> Result<Self> {
        Self::from_env_with_prefix("MEMBENCH_")
    }

    /// Initialize from environment variables with a custom prefix
    ///
    /// Recognized variables: `{PREFIX}CACHE_LINE_SIZE`, `{PREFIX}ITERATIONS`,
    /// `{PREFIX}BANDWIDTH_CEILING_GBPS`, `{PREFIX}MIN_WORKING_SET`,
    /// `{PREFIX}MAX_WORKING_SET`.
    pub fn from_env_with_prefix(prefix: &str) -> Result<Self> {
        let mut config = Self::default();
        config.cache_line_size =
            parse_env_var(&format!("{}CACHE_LINE_SIZE", prefix), config.cache_line_size);
        config.base_iterations =
            parse_env_var(&format!("{}ITERATIONS", prefix), config.base_iterations);
        config.bandwidth_ceiling_gbps = parse_env_var(
            &format!("{}BANDWIDTH_CEILING_GBPS", prefix),
            config.bandwidth_ceiling_gbps,
        );
        config.min_working_set =
            parse_env_var(&format!("{}MIN_WORKING_SET", prefix), config.min_working_set);
        config.max_working_set =
            parse_env_var(&format!("{}MAX_WORKING_SET", prefix), config.max_working_set);
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let serialized = serde_json::to_string_pretty(self).map_err(|e| {
            BenchError::configuration(format!("Failed to serialize config: {}", e))
        })?;
        std::fs::write(path, serialized)?;
        Ok(())
    }

    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| BenchError::configuration(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }
}

fn parse_env_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = BenchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cache_line_size, 64);
        assert_eq!(config.bandwidth_ceiling_gbps, 60.0);
    }

    #[test]
    fn test_presets() {
        assert!(BenchConfig::virtualized().validate().is_ok());
        let bare = BenchConfig::bare_metal();
        assert!(bare.validate().is_ok());
        assert!(bare.bandwidth_ceiling_gbps.is_infinite());
    }

    #[test]
    fn test_rejects_bad_cache_line() {
        let mut config = BenchConfig::default();
        config.cache_line_size = 48;
        assert!(config.validate().is_err());
        config.cache_line_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_inverted_working_set_bounds() {
        let mut config = BenchConfig::default();
        config.min_working_set = 2 * GB;
        config.max_working_set = MB;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_iterations_and_ceiling() {
        let mut config = BenchConfig::default();
        config.base_iterations = 0;
        assert!(config.validate().is_err());

        let mut config = BenchConfig::default();
        config.bandwidth_ceiling_gbps = 0.0;
        assert!(config.validate().is_err());
        config.bandwidth_ceiling_gbps = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_prefix_roundtrip() {
        // Unset variables fall back to defaults
        let config = BenchConfig::from_env_with_prefix("MEMBENCH_TEST_UNSET_").unwrap();
        assert_eq!(config, BenchConfig::default());
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bench.json");
        let mut config = BenchConfig::default();
        config.base_iterations = 42;
        config.save_to_file(&path).unwrap();
        let loaded = BenchConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_constants_sanity() {
        assert_eq!(CACHE_LINE_WORDS * std::mem::size_of::<u64>(), 64);
        assert_eq!(CACHE_LINE_DOUBLES * std::mem::size_of::<f64>(), 64);
        assert!(MIN_WORKING_SET_SIZE <= MAX_WORKING_SET_SIZE);
        assert_eq!(STANDARD_WORKING_SETS[0], 64 * MB);
        assert_eq!(STANDARD_WORKING_SETS[6], 4 * GB);
    }
}
