//! Result plausibility checks
//!
//! Measurements on virtualized or oversubscribed hosts can be distorted by
//! timer granularity and hypervisor scheduling. The validator cross-checks a
//! result against the memory specifications and flags what looks implausible.
//! Flags are advisory: a flagged result is still reported, annotated, never
//! discarded.

use crate::config::{MAX_EFFICIENCY_VIRTUALIZED, MIN_LATENCY_NS};
use crate::platform::MemorySpecs;
use crate::stats::PerformanceStats;

/// Sentinel efficiency when no theoretical bandwidth is available
pub const EFFICIENCY_NOT_APPLICABLE: f64 = -1.0;

/// One plausibility concern about a measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationFlag {
    /// Efficiency above the ceiling a hypervisor can plausibly deliver
    EfficiencyAboveVirtualizedCeiling,
    /// Measured bandwidth exceeds the theoretical memory bandwidth
    ExceedsTheoreticalBandwidth,
    /// Latency below what a cache hit physically takes
    ImplausiblyLowLatency,
    /// Zero or negative bandwidth, latency or time
    NonPositiveMeasurement,
}

impl ValidationFlag {
    /// Short description for report annotations
    pub fn description(&self) -> &'static str {
        match self {
            Self::EfficiencyAboveVirtualizedCeiling => {
                "efficiency implausibly high for a virtualized host"
            }
            Self::ExceedsTheoreticalBandwidth => "bandwidth exceeds theoretical maximum",
            Self::ImplausiblyLowLatency => "latency below plausible minimum",
            Self::NonPositiveMeasurement => "non-positive measurement",
        }
    }
}

/// Measurement plausibility validator
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultValidator;

impl ResultValidator {
    /// Create a validator
    pub fn new() -> Self {
        Self
    }

    /// Check one measurement against the memory specifications
    ///
    /// Returns every applicable flag; an empty vector means the result passed
    /// all checks.
    pub fn validate(&self, stats: &PerformanceStats, specs: &MemorySpecs) -> Vec<ValidationFlag> {
        let mut flags = Vec::new();

        if stats.bandwidth_gbps <= 0.0 || stats.latency_ns <= 0.0 || stats.time_seconds <= 0.0 {
            flags.push(ValidationFlag::NonPositiveMeasurement);
            // Further checks would flag the same degenerate numbers again
            return flags;
        }

        let efficiency = calculate_efficiency(stats.bandwidth_gbps, specs);
        if specs.is_virtualized
            && efficiency != EFFICIENCY_NOT_APPLICABLE
            && efficiency > MAX_EFFICIENCY_VIRTUALIZED
        {
            flags.push(ValidationFlag::EfficiencyAboveVirtualizedCeiling);
        }

        if specs.theoretical_bandwidth_gbps > 0.0
            && stats.bandwidth_gbps > specs.theoretical_bandwidth_gbps
        {
            flags.push(ValidationFlag::ExceedsTheoreticalBandwidth);
        }

        if stats.latency_ns < MIN_LATENCY_NS {
            flags.push(ValidationFlag::ImplausiblyLowLatency);
        }

        flags
    }

    /// Whether a measurement passes every check
    pub fn is_plausible(&self, stats: &PerformanceStats, specs: &MemorySpecs) -> bool {
        self.validate(stats, specs).is_empty()
    }
}

/// Bandwidth as a percentage of the theoretical maximum, uncapped
///
/// Values above 100 are reported as-is so the validator can flag them.
/// Returns [`EFFICIENCY_NOT_APPLICABLE`] when no theoretical bandwidth is
/// known (virtualized hosts report a negative theoretical figure).
pub fn calculate_efficiency(bandwidth_gbps: f64, specs: &MemorySpecs) -> f64 {
    if specs.theoretical_bandwidth_gbps <= 0.0 {
        return EFFICIENCY_NOT_APPLICABLE;
    }
    bandwidth_gbps / specs.theoretical_bandwidth_gbps * 100.0
}
