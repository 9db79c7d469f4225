//! Dense matrix multiply capability
//!
//! Matrix multiply is the one compute-bound test in the suite: it is not
//! memory-bandwidth-bound by design and is reported separately with GFLOPS
//! as the primary metric. Platforms with accelerated GEMM (AMX, NEON,
//! AVX-512 backends) plug in through the [`MatrixMultiplier`] trait; the
//! [`ScalarMultiplier`] triple-nested-loop fallback is always available.

use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::error::{BenchError, Result};

/// Matrix dimensions and run configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatrixConfig {
    /// Rows of A and C
    pub m: usize,
    /// Columns of A / rows of B
    pub k: usize,
    /// Columns of B and C
    pub n: usize,
    /// Number of multiply iterations
    pub iterations: usize,
    /// Use double precision (false = single precision)
    pub use_double: bool,
}

impl MatrixConfig {
    /// Square `size x size` configuration
    pub fn square(size: usize, iterations: usize, use_double: bool) -> Self {
        Self {
            m: size,
            k: size,
            n: size,
            iterations,
            use_double,
        }
    }

    /// Total bytes of A, B and C at the configured precision
    pub fn memory_footprint(&self) -> usize {
        let element_size = if self.use_double { 8 } else { 4 };
        (self.m * self.k + self.k * self.n + self.m * self.n) * element_size
    }

    /// Floating-point operations for one multiply (multiply + add per cell)
    pub fn flops_per_iteration(&self) -> usize {
        2 * self.m * self.k * self.n
    }
}

/// Performance statistics for a matrix multiply run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatrixStats {
    /// Performance in GFLOPS (primary metric)
    pub gflops: f64,
    /// Memory bandwidth in GB/s (secondary)
    pub bandwidth_gbps: f64,
    /// Average per-operation latency in nanoseconds
    pub latency_ns: f64,
    /// Total bytes processed
    pub bytes_processed: usize,
    /// Total wall-clock time in seconds
    pub time_seconds: f64,
    /// Total floating-point operations performed
    pub operations: usize,
    /// Name of the acceleration backend used
    pub acceleration: String,
}

/// Derive matrix statistics from raw measurement data
pub fn calculate_matrix_stats(
    bytes_processed: usize,
    time_seconds: f64,
    operations: usize,
    acceleration: &str,
) -> MatrixStats {
    MatrixStats {
        gflops: if time_seconds > 0.0 {
            operations as f64 / (time_seconds * 1e9)
        } else {
            0.0
        },
        bandwidth_gbps: if time_seconds > 0.0 {
            bytes_processed as f64 / (time_seconds * 1e9)
        } else {
            0.0
        },
        latency_ns: if operations > 0 {
            (time_seconds * 1e9) / operations as f64
        } else {
            0.0
        },
        bytes_processed,
        time_seconds,
        operations,
        acceleration: acceleration.to_string(),
    }
}

/// Abstract GEMM capability (one implementation per backend)
pub trait MatrixMultiplier: Send + Sync {
    /// Single precision `C = A * B`
    fn multiply_f32(
        &self,
        c: &mut [f32],
        a: &[f32],
        b: &[f32],
        config: &MatrixConfig,
        cancel: &AtomicBool,
    ) -> MatrixStats;

    /// Double precision `C = A * B`
    fn multiply_f64(
        &self,
        c: &mut [f64],
        a: &[f64],
        b: &[f64],
        config: &MatrixConfig,
        cancel: &AtomicBool,
    ) -> MatrixStats;

    /// Name of the acceleration backend
    fn acceleration_name(&self) -> &'static str;

    /// Whether this multiplier can run on the current hardware
    fn is_available(&self) -> bool;
}

/// Portable triple-nested-loop fallback, always available
#[derive(Debug, Default)]
pub struct ScalarMultiplier;

impl ScalarMultiplier {
    /// Create the scalar fallback multiplier
    pub fn new() -> Self {
        Self
    }
}

macro_rules! scalar_gemm {
    ($fn_name:ident, $ty:ty) => {
        fn $fn_name(
            &self,
            c: &mut [$ty],
            a: &[$ty],
            b: &[$ty],
            config: &MatrixConfig,
            cancel: &AtomicBool,
        ) -> MatrixStats {
            let (m, k, n) = (config.m, config.k, config.n);
            debug_assert_eq!(a.len(), m * k);
            debug_assert_eq!(b.len(), k * n);
            debug_assert_eq!(c.len(), m * n);

            let start_time = Instant::now();
            let mut completed = 0usize;

            for _ in 0..config.iterations {
                if cancel.load(Ordering::Relaxed) {
                    break;
                }

                for row in 0..m {
                    for col in 0..n {
                        let mut acc: $ty = 0.0;
                        for inner in 0..k {
                            acc += a[row * k + inner] * b[inner * n + col];
                        }
                        c[row * n + col] = acc;
                    }
                }

                completed += 1;
            }

            let time_seconds = start_time.elapsed().as_secs_f64();
            let operations = config.flops_per_iteration() * completed;
            let bytes_processed = config.memory_footprint() * completed;
            calculate_matrix_stats(bytes_processed, time_seconds, operations, "scalar")
        }
    };
}

impl MatrixMultiplier for ScalarMultiplier {
    scalar_gemm!(multiply_f32, f32);
    scalar_gemm!(multiply_f64, f64);

    fn acceleration_name(&self) -> &'static str {
        "scalar"
    }

    fn is_available(&self) -> bool {
        true
    }
}

/// Fill a matrix with uniform random values in `[-scale, scale]`
pub fn initialize_matrix_random_f32(matrix: &mut [f32], scale: f32) {
    let mut rng = rand::thread_rng();
    for value in matrix.iter_mut() {
        *value = rng.gen_range(-scale..=scale);
    }
}

/// Fill a matrix with uniform random values in `[-scale, scale]`
pub fn initialize_matrix_random_f64(matrix: &mut [f64], scale: f64) {
    let mut rng = rand::thread_rng();
    for value in matrix.iter_mut() {
        *value = rng.gen_range(-scale..=scale);
    }
}

/// Element-wise comparison of a result against a reference with tolerance
pub fn validate_matrix_result(c_test: &[f32], c_reference: &[f32], tolerance: f32) -> bool {
    c_test.len() == c_reference.len()
        && c_test
            .iter()
            .zip(c_reference)
            .all(|(t, r)| (t - r).abs() <= tolerance)
}

/// Run a single-precision multiply end to end with the given backend
///
/// Allocates and randomly initializes A and B, runs the configured number of
/// iterations, and returns the backend's statistics. Fails before any timed
/// work when the backend is unavailable or the config is degenerate.
pub fn matrix_multiply_test(
    multiplier: &dyn MatrixMultiplier,
    config: &MatrixConfig,
    cancel: &AtomicBool,
) -> Result<MatrixStats> {
    if !multiplier.is_available() {
        return Err(BenchError::platform(format!(
            "matrix multiplier '{}' unavailable on this hardware",
            multiplier.acceleration_name()
        )));
    }
    if config.m == 0 || config.k == 0 || config.n == 0 {
        return Err(BenchError::configuration("matrix dimensions must be non-zero"));
    }

    let mut a = vec![0.0f32; config.m * config.k];
    let mut b = vec![0.0f32; config.k * config.n];
    let mut c = vec![0.0f32; config.m * config.n];
    initialize_matrix_random_f32(&mut a, 1.0);
    initialize_matrix_random_f32(&mut b, 1.0);

    Ok(multiplier.multiply_f32(&mut c, &a, &b, config, cancel))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_cancel() -> AtomicBool {
        AtomicBool::new(false)
    }

    #[test]
    fn test_config_helpers() {
        let config = MatrixConfig::square(64, 10, false);
        assert_eq!(config.m, 64);
        assert_eq!(config.memory_footprint(), 3 * 64 * 64 * 4);
        assert_eq!(config.flops_per_iteration(), 2 * 64 * 64 * 64);

        let config = MatrixConfig::square(8, 1, true);
        assert_eq!(config.memory_footprint(), 3 * 8 * 8 * 8);
    }

    #[test]
    fn test_scalar_gemm_identity() {
        // A * I == A
        let n = 4;
        let config = MatrixConfig::square(n, 1, false);
        let a: Vec<f32> = (0..n * n).map(|i| i as f32).collect();
        let mut identity = vec![0.0f32; n * n];
        for i in 0..n {
            identity[i * n + i] = 1.0;
        }
        let mut c = vec![0.0f32; n * n];

        let multiplier = ScalarMultiplier::new();
        let stats = multiplier.multiply_f32(&mut c, &a, &identity, &config, &no_cancel());
        assert!(validate_matrix_result(&c, &a, 1e-6));
        assert_eq!(stats.operations, 2 * n * n * n);
        assert_eq!(stats.acceleration, "scalar");
    }

    #[test]
    fn test_scalar_gemm_f64_known_product() {
        // [[1,2],[3,4]] * [[5,6],[7,8]] = [[19,22],[43,50]]
        let config = MatrixConfig::square(2, 1, true);
        let a = vec![1.0, 2.0, 3.0, 4.0];
        let b = vec![5.0, 6.0, 7.0, 8.0];
        let mut c = vec![0.0; 4];

        ScalarMultiplier::new().multiply_f64(&mut c, &a, &b, &config, &no_cancel());
        assert_eq!(c, vec![19.0, 22.0, 43.0, 50.0]);
    }

    #[test]
    fn test_gflops_primary_metric() {
        let stats = calculate_matrix_stats(1_000_000, 0.5, 2_000_000_000, "scalar");
        assert!((stats.gflops - 4.0).abs() < 1e-9);
        assert!(stats.bandwidth_gbps > 0.0);
    }

    #[test]
    fn test_cancelled_multiply_reports_partial() {
        let config = MatrixConfig::square(16, 100, false);
        let cancel = AtomicBool::new(true);
        let stats = matrix_multiply_test(&ScalarMultiplier::new(), &config, &cancel).unwrap();
        assert_eq!(stats.operations, 0);
        assert_eq!(stats.gflops, 0.0);
    }

    #[test]
    fn test_rejects_degenerate_config() {
        let config = MatrixConfig {
            m: 0,
            k: 4,
            n: 4,
            iterations: 1,
            use_double: false,
        };
        assert!(matrix_multiply_test(&ScalarMultiplier::new(), &config, &no_cancel()).is_err());
    }

    #[test]
    fn test_end_to_end_square_multiply() {
        let config = MatrixConfig::square(32, 2, false);
        let stats = matrix_multiply_test(&ScalarMultiplier::new(), &config, &no_cancel()).unwrap();
        assert_eq!(stats.operations, 2 * 32 * 32 * 32 * 2);
        assert!(stats.gflops > 0.0);
        assert!(stats.time_seconds > 0.0);
    }

    #[test]
    fn test_validate_matrix_result_tolerance() {
        assert!(validate_matrix_result(&[1.0, 2.0], &[1.00001, 2.0], 1e-4));
        assert!(!validate_matrix_result(&[1.0, 2.0], &[1.1, 2.0], 1e-4));
        assert!(!validate_matrix_result(&[1.0], &[1.0, 2.0], 1e-4));
    }
}
