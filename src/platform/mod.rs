//! Platform capability boundary
//!
//! Everything the engine needs from the host (cache topology, memory
//! specifications, thread pinning) crosses through the [`Platform`] trait.
//! The engine never touches OS interfaces directly, so tests can inject a
//! synthetic platform with hand-picked cache sizes and the default
//! [`DetectedPlatform`] stays the only file with `cfg`-gated OS code.

mod detected;

pub use detected::DetectedPlatform;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// CPU cache hierarchy description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheInfo {
    /// L1 data cache size in bytes (per core)
    pub l1_data_size: usize,
    /// L1 instruction cache size in bytes (per core)
    pub l1_instruction_size: usize,
    /// L2 cache size in bytes (per core)
    pub l2_size: usize,
    /// L3 / system-level cache size in bytes (shared)
    pub l3_size: usize,
    /// L1 data cache associativity
    pub l1d_assoc: usize,
    /// L1 instruction cache associativity
    pub l1i_assoc: usize,
    /// L2 cache associativity
    pub l2_assoc: usize,
    /// L3 cache associativity
    pub l3_assoc: usize,
    /// L1 cache line size in bytes
    pub l1_line_size: usize,
    /// L2 cache line size in bytes
    pub l2_line_size: usize,
    /// L3 cache line size in bytes
    pub l3_line_size: usize,
}

impl Default for CacheInfo {
    /// Conservative defaults for a modern 64-bit core when detection fails
    fn default() -> Self {
        Self {
            l1_data_size: 32 * 1024,
            l1_instruction_size: 32 * 1024,
            l2_size: 256 * 1024,
            l3_size: 8 * 1024 * 1024,
            l1d_assoc: 8,
            l1i_assoc: 8,
            l2_assoc: 8,
            l3_assoc: 16,
            l1_line_size: 64,
            l2_line_size: 64,
            l3_line_size: 64,
        }
    }
}

/// Memory subsystem specifications
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemorySpecs {
    /// Memory type (DDR4, DDR5, LPDDR5, ...)
    pub memory_type: String,
    /// Memory speed in MT/s
    pub speed_mtps: usize,
    /// Data width in bits
    pub data_width_bits: usize,
    /// Total width including ECC in bits
    pub total_width_bits: usize,
    /// Total memory size in GB
    pub total_size_gb: usize,
    /// Number of memory channels
    pub num_channels: usize,
    /// Theoretical bandwidth in GB/s; negative means not applicable
    pub theoretical_bandwidth_gbps: f64,
    /// Whether the system runs under a hypervisor
    pub is_virtualized: bool,
    /// Whether data width was detected rather than defaulted
    pub data_width_detected: bool,
    /// Whether total width was detected rather than defaulted
    pub total_width_detected: bool,
    /// Whether channel count was detected rather than defaulted
    pub num_channels_detected: bool,
    /// Whether the platform uses a unified memory architecture
    pub is_unified_memory: bool,
    /// Human-readable architecture description
    pub architecture: String,
}

impl Default for MemorySpecs {
    fn default() -> Self {
        Self {
            memory_type: "DDR4".to_string(),
            speed_mtps: 3200,
            data_width_bits: 64,
            total_width_bits: 72,
            total_size_gb: 0,
            num_channels: 2,
            theoretical_bandwidth_gbps: 3200.0 * 64.0 * 2.0 / 8.0 / 1000.0,
            is_virtualized: false,
            data_width_detected: false,
            total_width_detected: false,
            num_channels_detected: false,
            is_unified_memory: false,
            architecture: "Traditional NUMA Architecture".to_string(),
        }
    }
}

/// Full system snapshot the engine caches at construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    /// Total RAM in GB
    pub total_ram_gb: usize,
    /// Available RAM in GB
    pub available_ram_gb: usize,
    /// Number of physical CPU cores
    pub cpu_cores: usize,
    /// Number of logical CPU threads
    pub cpu_threads: usize,
    /// Cache line size in bytes
    pub cache_line_size: usize,
    /// CPU model name
    pub cpu_name: String,
    /// Memory specifications
    pub memory_specs: MemorySpecs,
    /// Cache hierarchy description
    pub cache_info: CacheInfo,
}

/// Core affinity request for heterogeneous CPUs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CpuAffinity {
    /// No specific core class
    Default,
    /// Performance cores only
    Performance,
    /// Efficiency cores only
    Efficiency,
}

/// Host capabilities the benchmark engine depends on
pub trait Platform: Send + Sync {
    /// CPU vendor and model name
    fn detect_processor_info(&self) -> (String, String);

    /// Cache line size in bytes
    fn detect_cache_line_size(&self) -> usize;

    /// Cache hierarchy of the whole package
    fn detect_cache_info(&self) -> CacheInfo;

    /// Cache hierarchy as seen from the requested core class
    fn core_specific_cache_info(&self, affinity: CpuAffinity) -> CacheInfo;

    /// Memory subsystem specifications
    fn memory_specs(&self) -> MemorySpecs;

    /// Full system snapshot
    fn system_info(&self) -> SystemInfo;

    /// Maximum sensible thread count for the requested core class
    fn max_threads_for_affinity(&self, affinity: CpuAffinity) -> usize;

    /// Pin the calling thread for its position in the worker set
    ///
    /// A platform without pinning support treats this as a no-op; pinning is
    /// an optimization request, not a correctness requirement.
    fn set_thread_affinity(
        &self,
        thread_id: usize,
        affinity: CpuAffinity,
        total_threads: usize,
    ) -> Result<()>;

    /// Reject thread counts beyond what the core class can sensibly run
    fn validate_thread_count(&self, num_threads: usize, affinity: CpuAffinity) -> Result<()>;

    /// Platform implementation name
    fn name(&self) -> &'static str;

    /// Whether `set_thread_affinity` actually pins
    fn supports_cpu_affinity(&self) -> bool;
}
