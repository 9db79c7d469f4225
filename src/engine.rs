//! Benchmark orchestration
//!
//! [`BenchmarkEngine`] owns the buffers, the cancellation flag and the worker
//! threads. A run partitions the first buffer across the requested threads at
//! cache-line boundaries, pins each worker, runs the kernel over the worker's
//! disjoint range and aggregates the per-thread statistics against wall-clock
//! time. Setup and aggregation happen outside the timed region; inside it
//! there are no locks and no shared mutable state beyond the cancel flag.

use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::buffer::AlignedBuffer;
use crate::config::{BenchConfig, DEFAULT_MATRIX_SIZE};
use crate::error::{BenchError, Result};
use crate::kernels::{self, TestPattern};
use crate::layout::{calculate_buffer_size, scale_iterations};
use crate::matrix::{matrix_multiply_test, MatrixConfig, MatrixMultiplier, MatrixStats, ScalarMultiplier};
use crate::platform::{CacheInfo, CpuAffinity, Platform, SystemInfo};
use crate::stats::{aggregate_stats, PerformanceStats};
use crate::working_set::WorkingSet;

/// Cache-line aligned thread partition of `[0, buffer_size)`
///
/// Boundaries are multiples of `cache_line_size` so every worker's range
/// starts on a line; the last thread absorbs the rounding remainder. Returns
/// `None` when the buffer cannot give every thread at least one line.
pub fn partition_boundaries(
    buffer_size: usize,
    num_threads: usize,
    cache_line_size: usize,
) -> Option<Vec<(usize, usize)>> {
    if num_threads == 0 || cache_line_size == 0 {
        return None;
    }
    let chunk = (buffer_size / num_threads) / cache_line_size * cache_line_size;
    if chunk == 0 {
        return None;
    }
    Some(
        (0..num_threads)
            .map(|i| {
                let start = i * chunk;
                let end = if i == num_threads - 1 {
                    buffer_size
                } else {
                    (i + 1) * chunk
                };
                (start, end)
            })
            .collect(),
    )
}

/// Memory benchmark engine
///
/// Holds a platform capability by reference; detection runs once at
/// construction and the resulting [`SystemInfo`] snapshot is cached for the
/// engine's lifetime.
pub struct BenchmarkEngine<'p> {
    platform: &'p dyn Platform,
    config: BenchConfig,
    affinity: CpuAffinity,
    cache_info: CacheInfo,
    system_info: SystemInfo,
    buffers: Vec<AlignedBuffer>,
    buffer_size: usize,
    cancel: CachePadded<AtomicBool>,
    matrix: Box<dyn MatrixMultiplier>,
}

impl<'p> BenchmarkEngine<'p> {
    /// Create an engine with default core affinity
    pub fn new(platform: &'p dyn Platform, config: BenchConfig) -> Result<Self> {
        Self::with_affinity(platform, config, CpuAffinity::Default)
    }

    /// Create an engine pinned to a specific core class
    pub fn with_affinity(
        platform: &'p dyn Platform,
        config: BenchConfig,
        affinity: CpuAffinity,
    ) -> Result<Self> {
        config.validate()?;
        let cache_info = platform.core_specific_cache_info(affinity);
        let system_info = platform.system_info();
        log::debug!(
            "engine ready on {} ({} threads, L1d {} KB, L2 {} KB, L3 {} KB)",
            platform.name(),
            system_info.cpu_threads,
            cache_info.l1_data_size / 1024,
            cache_info.l2_size / 1024,
            cache_info.l3_size / 1024
        );
        Ok(Self {
            platform,
            config,
            affinity,
            cache_info,
            system_info,
            buffers: Vec::new(),
            buffer_size: 0,
            cancel: CachePadded::new(AtomicBool::new(false)),
            matrix: Box::new(ScalarMultiplier::new()),
        })
    }

    /// Replace the matrix multiply backend
    pub fn set_matrix_multiplier(&mut self, multiplier: Box<dyn MatrixMultiplier>) {
        self.matrix = multiplier;
    }

    /// Cached system snapshot taken at construction
    pub fn system_info(&self) -> &SystemInfo {
        &self.system_info
    }

    /// Cache hierarchy the working-set sweeps are sized against
    pub fn cache_info(&self) -> &CacheInfo {
        &self.cache_info
    }

    /// Engine configuration
    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// Per-buffer size of the current allocation, 0 before any allocation
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Number of currently allocated buffers
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Request cancellation; workers finish their current iteration
    ///
    /// The flag is sticky: subsequent runs on this engine return immediately
    /// with partial (zero) statistics.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Allocate `num_buffers` equally sized, cache-line aligned buffers
    ///
    /// `total_size` is divided across the buffers and each per-buffer size is
    /// rounded down to a cache-line multiple. Replaces any previous
    /// allocation.
    pub fn allocate_buffers(&mut self, total_size: usize, num_buffers: usize) -> Result<()> {
        if total_size == 0 || num_buffers == 0 {
            return Err(BenchError::memory(format!(
                "invalid buffer allocation parameters: total_size={}, num_buffers={}",
                total_size, num_buffers
            )));
        }

        let buffer_size =
            calculate_buffer_size(total_size, num_buffers, self.config.cache_line_size);
        if buffer_size == 0 {
            return Err(BenchError::memory(format!(
                "buffer size too small: {} bytes across {} buffers, minimum {} bytes each",
                total_size, num_buffers, self.config.min_buffer_size
            )));
        }

        self.buffers.clear();
        self.buffer_size = 0;

        let mut buffers = Vec::with_capacity(num_buffers);
        for index in 0..num_buffers {
            let buffer = AlignedBuffer::new(buffer_size, self.config.cache_line_size)?;
            if !buffer.is_aligned() {
                return Err(BenchError::memory(format!(
                    "failed to achieve cache line alignment for buffer {}",
                    index
                )));
            }
            buffers.push(buffer);
        }

        log::debug!(
            "allocated {} buffers of {} bytes ({} byte alignment)",
            num_buffers,
            buffer_size,
            self.config.cache_line_size
        );
        self.buffers = buffers;
        self.buffer_size = buffer_size;
        Ok(())
    }

    /// Run one pattern across `num_threads` workers
    ///
    /// Requires a prior [`allocate_buffers`](Self::allocate_buffers) call for
    /// every pattern except matrix multiply, which sizes its own matrices.
    /// `in_sweep` marks runs that are part of a cache-aware sweep (trace
    /// output only; the kernels behave identically).
    pub fn run_test(
        &mut self,
        pattern: TestPattern,
        iterations: usize,
        num_threads: usize,
        in_sweep: bool,
    ) -> Result<PerformanceStats> {
        if pattern == TestPattern::MatrixMultiply {
            let stats = self.run_matrix_multiply(&MatrixConfig::square(
                DEFAULT_MATRIX_SIZE,
                iterations,
                false,
            ))?;
            return Ok(PerformanceStats {
                bandwidth_gbps: stats.bandwidth_gbps,
                latency_ns: stats.latency_ns,
                bytes_processed: stats.bytes_processed,
                time_seconds: stats.time_seconds,
            });
        }

        if self.buffers.is_empty() {
            return Err(BenchError::test(
                "run_test called before allocate_buffers",
            ));
        }
        if self.buffers.len() < pattern.buffers_required() {
            return Err(BenchError::test(format!(
                "{} requires {} buffers, {} allocated",
                pattern,
                pattern.buffers_required(),
                self.buffers.len()
            )));
        }
        self.platform.validate_thread_count(num_threads, self.affinity)?;

        let line = self.config.cache_line_size;
        let buffer_size = self.buffer_size;
        let boundaries = partition_boundaries(buffer_size, num_threads, line).ok_or_else(|| {
            BenchError::test(format!(
                "buffer of {} bytes cannot be partitioned across {} threads",
                buffer_size, num_threads
            ))
        })?;

        log::debug!(
            "running {} with {} threads over {} bytes x{} iterations{}",
            pattern,
            num_threads,
            buffer_size,
            iterations,
            if in_sweep { " (cache-aware sweep)" } else { "" }
        );

        let ceiling = self.config.bandwidth_ceiling_gbps;
        let cancel: &AtomicBool = &self.cancel;
        let platform = self.platform;
        let affinity = self.affinity;

        let pin = move |thread_id: usize| {
            if let Err(err) = platform.set_thread_affinity(thread_id, affinity, num_threads) {
                log::warn!("thread {} affinity request failed: {}", thread_id, err);
            }
        };

        let wall_start = Instant::now();

        let thread_stats: Vec<PerformanceStats> = match pattern {
            TestPattern::SequentialRead | TestPattern::RandomRead => {
                let data = self.buffers[0].data();
                run_scoped(&boundaries, |i, (start, end)| {
                    pin(i);
                    match pattern {
                        TestPattern::SequentialRead => {
                            kernels::sequential_read(data, start, end, iterations, cancel, ceiling)
                        }
                        _ => kernels::random_read(data, start, end, iterations, cancel, ceiling),
                    }
                })?
            }
            TestPattern::SequentialWrite | TestPattern::RandomWrite => {
                let chunks = split_mut(self.buffers[0].data_mut(), &boundaries);
                run_scoped_mut(chunks, |i, chunk| {
                    pin(i);
                    let len = chunk.len();
                    match pattern {
                        TestPattern::SequentialWrite => {
                            kernels::sequential_write(chunk, 0, len, iterations, cancel, ceiling)
                        }
                        _ => kernels::random_write(chunk, 0, len, iterations, cancel, ceiling),
                    }
                })?
            }
            TestPattern::Copy => {
                let (src_buf, rest) = self.buffers.split_first_mut().ok_or_else(|| {
                    BenchError::test("copy requires an allocated source buffer")
                })?;
                let src = src_buf.data();
                let chunks = split_mut(rest[0].data_mut(), &boundaries);
                let pairs: Vec<(&[u8], &mut [u8])> = boundaries
                    .iter()
                    .zip(chunks)
                    .map(|(&(start, end), dst)| (&src[start..end], dst))
                    .collect();
                run_scoped_mut(pairs, |i, (src_window, dst_chunk)| {
                    pin(i);
                    let len = dst_chunk.len();
                    kernels::copy(src_window, dst_chunk, 0, len, iterations, cancel, ceiling)
                })?
            }
            TestPattern::Triad => {
                let (a_buf, rest) = self.buffers.split_first_mut().ok_or_else(|| {
                    BenchError::test("triad requires an allocated destination buffer")
                })?;
                let b = rest[0].data();
                let c = rest[1].data();
                let chunks = split_mut(a_buf.data_mut(), &boundaries);
                let triples: Vec<(&mut [u8], &[u8], &[u8])> = boundaries
                    .iter()
                    .zip(chunks)
                    .map(|(&(start, end), a_chunk)| (a_chunk, &b[start..end], &c[start..end]))
                    .collect();
                run_scoped_mut(triples, |i, (a_chunk, b_window, c_window)| {
                    pin(i);
                    let len = a_chunk.len();
                    kernels::triad(
                        a_chunk, b_window, c_window, 0, len, iterations, cancel, ceiling,
                    )
                })?
            }
            TestPattern::MatrixMultiply => unreachable!("handled above"),
        };

        let wall_seconds = wall_start.elapsed().as_secs_f64();
        Ok(aggregate_stats(&thread_stats, wall_seconds, line))
    }

    /// Run the matrix multiply backend once with an explicit configuration
    pub fn run_matrix_multiply(&self, config: &MatrixConfig) -> Result<MatrixStats> {
        let stats = matrix_multiply_test(self.matrix.as_ref(), config, &self.cancel)?;
        log::debug!(
            "matrix multiply {}x{}x{}: {:.2} GFLOPS via {}",
            config.m,
            config.k,
            config.n,
            stats.gflops,
            stats.acceleration
        );
        Ok(stats)
    }

    /// Sweep the thread-aware working-set ladder for one pattern
    ///
    /// For each working-set size: reallocate four buffers, scale iterations
    /// up for cache-resident sizes, run, and collect `(label, stats)` in
    /// ladder order. A size whose allocation fails recoverably is skipped
    /// with a warning. After cancellation the remaining sizes still produce
    /// entries, with zero statistics, so the ladder stays complete.
    pub fn run_cache_aware_test(
        &mut self,
        pattern: TestPattern,
        iterations: usize,
        num_threads: usize,
    ) -> Result<Vec<(String, PerformanceStats)>> {
        let entries = WorkingSet::thread_aware(&self.cache_info, num_threads)
            .entries()
            .to_vec();
        let mut results = Vec::with_capacity(entries.len());

        for entry in entries {
            match self.allocate_buffers(entry.size, 4) {
                Ok(()) => {}
                Err(err) if err.is_recoverable() => {
                    log::warn!(
                        "skipping working set {} ({} bytes): {}",
                        entry.label,
                        entry.size,
                        err
                    );
                    continue;
                }
                Err(err) => return Err(err),
            }

            let scaled_iterations = scale_iterations(iterations, entry.size);
            let stats = self.run_test(pattern, scaled_iterations, num_threads, true)?;
            results.push((entry.label, stats));
        }

        Ok(results)
    }
}

/// Split a buffer into the disjoint per-thread chunks the boundaries describe
fn split_mut<'a>(mut data: &'a mut [u8], boundaries: &[(usize, usize)]) -> Vec<&'a mut [u8]> {
    let mut chunks = Vec::with_capacity(boundaries.len());
    let mut consumed = 0;
    for &(start, end) in boundaries {
        debug_assert_eq!(start, consumed);
        let (head, tail) = data.split_at_mut(end - start);
        chunks.push(head);
        data = tail;
        consumed = end;
    }
    chunks
}

/// Run one worker per boundary over shared data
fn run_scoped<F>(boundaries: &[(usize, usize)], work: F) -> Result<Vec<PerformanceStats>>
where
    F: Fn(usize, (usize, usize)) -> PerformanceStats + Sync,
{
    std::thread::scope(|scope| {
        let handles: Vec<_> = boundaries
            .iter()
            .enumerate()
            .map(|(i, &range)| {
                let work = &work;
                scope.spawn(move || work(i, range))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .map_err(|_| BenchError::test("worker thread panicked"))
            })
            .collect()
    })
}

/// Run one worker per item, moving exclusive data into each worker
fn run_scoped_mut<T, F>(items: Vec<T>, work: F) -> Result<Vec<PerformanceStats>>
where
    T: Send,
    F: Fn(usize, T) -> PerformanceStats + Sync,
{
    std::thread::scope(|scope| {
        let handles: Vec<_> = items
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                let work = &work;
                scope.spawn(move || work(i, item))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .map_err(|_| BenchError::test("worker thread panicked"))
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedPlatform {
        cache_info: CacheInfo,
    }

    impl FixedPlatform {
        fn small() -> Self {
            Self {
                cache_info: CacheInfo {
                    l1_data_size: 32 * 1024,
                    l2_size: 256 * 1024,
                    l3_size: 1024 * 1024,
                    ..CacheInfo::default()
                },
            }
        }
    }

    impl Platform for FixedPlatform {
        fn detect_processor_info(&self) -> (String, String) {
            ("test".to_string(), "test".to_string())
        }
        fn detect_cache_line_size(&self) -> usize {
            64
        }
        fn detect_cache_info(&self) -> CacheInfo {
            self.cache_info
        }
        fn core_specific_cache_info(&self, _affinity: CpuAffinity) -> CacheInfo {
            self.cache_info
        }
        fn memory_specs(&self) -> crate::platform::MemorySpecs {
            crate::platform::MemorySpecs::default()
        }
        fn system_info(&self) -> SystemInfo {
            SystemInfo {
                total_ram_gb: 1,
                available_ram_gb: 1,
                cpu_cores: 4,
                cpu_threads: 4,
                cache_line_size: 64,
                cpu_name: "test".to_string(),
                memory_specs: crate::platform::MemorySpecs::default(),
                cache_info: self.cache_info,
            }
        }
        fn max_threads_for_affinity(&self, _affinity: CpuAffinity) -> usize {
            4
        }
        fn set_thread_affinity(
            &self,
            _thread_id: usize,
            _affinity: CpuAffinity,
            _total_threads: usize,
        ) -> Result<()> {
            Ok(())
        }
        fn validate_thread_count(&self, num_threads: usize, _affinity: CpuAffinity) -> Result<()> {
            if num_threads == 0 || num_threads > 8 {
                return Err(BenchError::configuration("bad thread count"));
            }
            Ok(())
        }
        fn name(&self) -> &'static str {
            "fixed"
        }
        fn supports_cpu_affinity(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_partition_boundaries_cover_buffer_exactly() {
        let bounds = partition_boundaries(1_048_576 + 100, 3, 64).unwrap();
        assert_eq!(bounds.len(), 3);
        assert_eq!(bounds[0].0, 0);
        assert_eq!(bounds[2].1, 1_048_576 + 100);
        for pair in bounds.windows(2) {
            assert_eq!(pair[0].1, pair[1].0);
        }
        // Interior boundaries are line multiples
        assert_eq!(bounds[0].1 % 64, 0);
        assert_eq!(bounds[1].1 % 64, 0);
    }

    #[test]
    fn test_partition_rejects_oversubscribed_tiny_buffer() {
        assert!(partition_boundaries(128, 4, 64).is_none());
        assert!(partition_boundaries(4096, 0, 64).is_none());
    }

    #[test]
    fn test_run_before_allocate_is_an_error() {
        let platform = FixedPlatform::small();
        let mut engine = BenchmarkEngine::new(&platform, BenchConfig::default()).unwrap();
        let err = engine
            .run_test(TestPattern::SequentialRead, 1, 1, false)
            .unwrap_err();
        assert_eq!(err.category(), "test");
    }

    #[test]
    fn test_pattern_buffer_requirements_enforced() {
        let platform = FixedPlatform::small();
        let mut engine = BenchmarkEngine::new(&platform, BenchConfig::default()).unwrap();
        engine.allocate_buffers(64 * 1024, 1).unwrap();
        assert!(engine.run_test(TestPattern::Copy, 1, 1, false).is_err());
        assert!(engine.run_test(TestPattern::Triad, 1, 1, false).is_err());
    }

    #[test]
    fn test_single_thread_sequential_read_counts() {
        let platform = FixedPlatform::small();
        let mut engine = BenchmarkEngine::new(&platform, BenchConfig::default()).unwrap();
        engine.allocate_buffers(1024 * 1024, 1).unwrap();
        let stats = engine
            .run_test(TestPattern::SequentialRead, 10, 1, false)
            .unwrap();
        assert_eq!(stats.bytes_processed, 1024 * 1024 * 10);
        assert!(stats.bandwidth_gbps > 0.0);
    }

    #[test]
    fn test_multi_thread_partitions_account_for_every_byte() {
        let platform = FixedPlatform::small();
        let mut engine = BenchmarkEngine::new(&platform, BenchConfig::default()).unwrap();
        engine.allocate_buffers(1024 * 1024, 1).unwrap();
        let stats = engine
            .run_test(TestPattern::SequentialWrite, 4, 3, false)
            .unwrap();
        // Three disjoint partitions cover the buffer exactly, 4 iterations each
        assert_eq!(stats.bytes_processed, 1024 * 1024 * 4);
    }

    #[test]
    fn test_copy_uses_two_buffers() {
        let platform = FixedPlatform::small();
        let mut engine = BenchmarkEngine::new(&platform, BenchConfig::default()).unwrap();
        engine.allocate_buffers(256 * 1024, 2).unwrap();
        let stats = engine.run_test(TestPattern::Copy, 2, 2, false).unwrap();
        // Per-buffer size is 128 KB; copy counts both sides
        assert_eq!(stats.bytes_processed, 128 * 1024 * 2 * 2);
    }

    #[test]
    fn test_allocate_rejects_zero_params() {
        let platform = FixedPlatform::small();
        let mut engine = BenchmarkEngine::new(&platform, BenchConfig::default()).unwrap();
        assert!(engine.allocate_buffers(0, 1).is_err());
        assert!(engine.allocate_buffers(1024 * 1024, 0).is_err());
    }

    #[test]
    fn test_cancelled_engine_reports_partial_stats() {
        let platform = FixedPlatform::small();
        let mut engine = BenchmarkEngine::new(&platform, BenchConfig::default()).unwrap();
        engine.allocate_buffers(64 * 1024, 1).unwrap();
        engine.cancel();
        let stats = engine
            .run_test(TestPattern::SequentialRead, 1_000_000, 1, false)
            .unwrap();
        assert_eq!(stats.bytes_processed, 0);
    }

    #[test]
    fn test_cache_aware_sweep_orders_results() {
        let platform = FixedPlatform::small();
        let mut engine = BenchmarkEngine::new(&platform, BenchConfig::default()).unwrap();
        // Cancel up front: each size allocates and returns immediately, so
        // the ladder structure can be checked without a full measurement run.
        engine.cancel();
        let results = engine
            .run_cache_aware_test(TestPattern::SequentialRead, 1, 2)
            .unwrap();
        assert!(!results.is_empty());
        let labels: Vec<&str> = results.iter().map(|(label, _)| label.as_str()).collect();
        // Sizes whose quarter-share falls below the buffer minimum are
        // skipped, so the ladder starts at the first allocatable L1 tier
        assert!(labels[0].contains("L1"));
        assert!(labels.iter().any(|l| l.contains("SLC")));
        for (_, stats) in &results {
            assert_eq!(stats.bytes_processed, 0);
        }
    }

    #[test]
    fn test_matrix_multiply_runs_without_buffers() {
        let platform = FixedPlatform::small();
        let engine = BenchmarkEngine::new(&platform, BenchConfig::default()).unwrap();
        let stats = engine
            .run_matrix_multiply(&MatrixConfig::square(16, 1, false))
            .unwrap();
        assert_eq!(stats.operations, 2 * 16 * 16 * 16);
    }
}
