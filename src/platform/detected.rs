//! Default host platform detection
//!
//! Cache topology comes from CPUID leaf 4 on x86_64 and from sysfs on Linux;
//! where neither yields an answer the conservative [`CacheInfo::default`]
//! values are used. Detection runs once in [`DetectedPlatform::new`] and the
//! result is immutable afterwards.

use crate::config::MAX_THREAD_OVERSUBSCRIPTION;
use crate::error::{BenchError, Result};
use crate::platform::{CacheInfo, CpuAffinity, MemorySpecs, Platform, SystemInfo};

/// Host platform detected at construction time
#[derive(Debug, Clone)]
pub struct DetectedPlatform {
    vendor: String,
    model: String,
    cache_info: CacheInfo,
    cache_line_size: usize,
    logical_cpus: usize,
    is_virtualized: bool,
}

impl DetectedPlatform {
    /// Detect the current host
    pub fn new() -> Self {
        let (vendor, model) = detect_processor();
        let cache_info = detect_caches();
        let is_virtualized = detect_virtualization();
        let logical_cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        log::debug!(
            "detected platform: {} {} ({} logical cpus, L1d {} KB, L2 {} KB, L3 {} KB{})",
            vendor,
            model,
            logical_cpus,
            cache_info.l1_data_size / 1024,
            cache_info.l2_size / 1024,
            cache_info.l3_size / 1024,
            if is_virtualized { ", virtualized" } else { "" }
        );

        Self {
            vendor,
            model,
            cache_line_size: cache_info.l1_line_size,
            cache_info,
            logical_cpus,
            is_virtualized,
        }
    }
}

impl Default for DetectedPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for DetectedPlatform {
    fn detect_processor_info(&self) -> (String, String) {
        (self.vendor.clone(), self.model.clone())
    }

    fn detect_cache_line_size(&self) -> usize {
        self.cache_line_size
    }

    fn detect_cache_info(&self) -> CacheInfo {
        self.cache_info
    }

    fn core_specific_cache_info(&self, _affinity: CpuAffinity) -> CacheInfo {
        // No per-core-class topology here: homogeneous cores report the same
        // hierarchy for every affinity request.
        self.cache_info
    }

    fn memory_specs(&self) -> MemorySpecs {
        let mut specs = MemorySpecs {
            is_virtualized: self.is_virtualized,
            total_size_gb: detect_total_ram_gb(),
            ..MemorySpecs::default()
        };
        if self.is_virtualized {
            // Channel topology is not observable through a hypervisor
            specs.num_channels = 0;
            specs.theoretical_bandwidth_gbps = -1.0;
            specs.architecture =
                "Virtualized Environment - Memory channels not accessible".to_string();
        }
        specs
    }

    fn system_info(&self) -> SystemInfo {
        SystemInfo {
            total_ram_gb: detect_total_ram_gb(),
            available_ram_gb: detect_available_ram_gb(),
            cpu_cores: self.logical_cpus,
            cpu_threads: self.logical_cpus,
            cache_line_size: self.cache_line_size,
            cpu_name: self.model.clone(),
            memory_specs: self.memory_specs(),
            cache_info: self.cache_info,
        }
    }

    fn max_threads_for_affinity(&self, _affinity: CpuAffinity) -> usize {
        self.logical_cpus
    }

    fn set_thread_affinity(
        &self,
        thread_id: usize,
        _affinity: CpuAffinity,
        _total_threads: usize,
    ) -> Result<()> {
        pin_to_cpu(thread_id % self.logical_cpus)
    }

    fn validate_thread_count(&self, num_threads: usize, affinity: CpuAffinity) -> Result<()> {
        if num_threads == 0 {
            return Err(BenchError::configuration("thread count must be non-zero"));
        }
        let max_threads = self.max_threads_for_affinity(affinity) * MAX_THREAD_OVERSUBSCRIPTION;
        if num_threads > max_threads {
            return Err(BenchError::configuration(format!(
                "thread count ({}) is too high (system supports max {} threads)",
                num_threads, max_threads
            )));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        if cfg!(target_arch = "x86_64") {
            "x86_64"
        } else if cfg!(target_arch = "aarch64") {
            "aarch64"
        } else {
            "generic"
        }
    }

    fn supports_cpu_affinity(&self) -> bool {
        cfg!(target_os = "linux")
    }
}

#[cfg(target_arch = "x86_64")]
fn detect_processor() -> (String, String) {
    let cpuid = raw_cpuid::CpuId::new();
    let vendor = cpuid
        .get_vendor_info()
        .map(|v| v.as_str().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let model = cpuid
        .get_processor_brand_string()
        .map(|b| b.as_str().trim().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    (vendor, model)
}

#[cfg(not(target_arch = "x86_64"))]
fn detect_processor() -> (String, String) {
    ("unknown".to_string(), cpu_model_from_proc())
}

#[cfg(all(not(target_arch = "x86_64"), target_os = "linux"))]
fn cpu_model_from_proc() -> String {
    std::fs::read_to_string("/proc/cpuinfo")
        .ok()
        .and_then(|content| {
            content.lines().find_map(|line| {
                line.strip_prefix("model name")
                    .and_then(|rest| rest.split(':').nth(1))
                    .map(|name| name.trim().to_string())
            })
        })
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(all(not(target_arch = "x86_64"), not(target_os = "linux")))]
fn cpu_model_from_proc() -> String {
    "unknown".to_string()
}

fn detect_caches() -> CacheInfo {
    let mut info = CacheInfo::default();

    #[cfg(target_arch = "x86_64")]
    fill_from_cpuid(&mut info);

    #[cfg(target_os = "linux")]
    fill_from_sysfs(&mut info);

    info
}

#[cfg(target_arch = "x86_64")]
fn fill_from_cpuid(info: &mut CacheInfo) {
    use raw_cpuid::CacheType;

    let cpuid = raw_cpuid::CpuId::new();
    let params = match cpuid.get_cache_parameters() {
        Some(params) => params,
        None => return,
    };

    for cache in params {
        let size = cache.associativity()
            * cache.physical_line_partitions()
            * cache.coherency_line_size()
            * cache.sets();
        if size == 0 {
            continue;
        }
        match (cache.level(), cache.cache_type()) {
            (1, CacheType::Data) => {
                info.l1_data_size = size;
                info.l1d_assoc = cache.associativity();
                info.l1_line_size = cache.coherency_line_size();
            }
            (1, CacheType::Instruction) => {
                info.l1_instruction_size = size;
                info.l1i_assoc = cache.associativity();
            }
            (2, CacheType::Data | CacheType::Unified) => {
                info.l2_size = size;
                info.l2_assoc = cache.associativity();
                info.l2_line_size = cache.coherency_line_size();
            }
            (3, CacheType::Data | CacheType::Unified) => {
                info.l3_size = size;
                info.l3_assoc = cache.associativity();
                info.l3_line_size = cache.coherency_line_size();
            }
            _ => {}
        }
    }
}

/// Parse sysfs cache size strings like `32K` or `8M`
#[cfg(target_os = "linux")]
fn parse_sysfs_size(text: &str) -> Option<usize> {
    let text = text.trim();
    if let Some(kb) = text.strip_suffix(['K', 'k']) {
        kb.parse::<usize>().ok().map(|n| n * 1024)
    } else if let Some(mb) = text.strip_suffix(['M', 'm']) {
        mb.parse::<usize>().ok().map(|n| n * 1024 * 1024)
    } else {
        text.parse().ok()
    }
}

#[cfg(target_os = "linux")]
fn fill_from_sysfs(info: &mut CacheInfo) {
    let base = std::path::Path::new("/sys/devices/system/cpu/cpu0/cache");
    let entries = match std::fs::read_dir(base) {
        Ok(entries) => entries,
        Err(_) => return,
    };

    let read = |dir: &std::path::Path, file: &str| -> Option<String> {
        std::fs::read_to_string(dir.join(file))
            .ok()
            .map(|s| s.trim().to_string())
    };

    for entry in entries.flatten() {
        let dir = entry.path();
        let level: usize = match read(&dir, "level").and_then(|s| s.parse().ok()) {
            Some(level) => level,
            None => continue,
        };
        let kind = read(&dir, "type").unwrap_or_default();
        let size = match read(&dir, "size").and_then(|s| parse_sysfs_size(&s)) {
            Some(size) => size,
            None => continue,
        };
        let assoc = read(&dir, "ways_of_associativity").and_then(|s| s.parse().ok());
        let line = read(&dir, "coherency_line_size").and_then(|s| s.parse().ok());

        match (level, kind.as_str()) {
            (1, "Data") => {
                info.l1_data_size = size;
                if let Some(assoc) = assoc {
                    info.l1d_assoc = assoc;
                }
                if let Some(line) = line {
                    info.l1_line_size = line;
                }
            }
            (1, "Instruction") => {
                info.l1_instruction_size = size;
                if let Some(assoc) = assoc {
                    info.l1i_assoc = assoc;
                }
            }
            (2, "Data" | "Unified") => {
                info.l2_size = size;
                if let Some(assoc) = assoc {
                    info.l2_assoc = assoc;
                }
                if let Some(line) = line {
                    info.l2_line_size = line;
                }
            }
            (3, "Data" | "Unified") => {
                info.l3_size = size;
                if let Some(assoc) = assoc {
                    info.l3_assoc = assoc;
                }
                if let Some(line) = line {
                    info.l3_line_size = line;
                }
            }
            _ => {}
        }
    }
}

#[cfg(target_os = "linux")]
fn detect_virtualization() -> bool {
    std::fs::read_to_string("/proc/cpuinfo")
        .map(|content| content.contains("hypervisor"))
        .unwrap_or(false)
}

#[cfg(all(not(target_os = "linux"), target_arch = "x86_64"))]
fn detect_virtualization() -> bool {
    raw_cpuid::CpuId::new()
        .get_feature_info()
        .map(|f| f.has_hypervisor())
        .unwrap_or(false)
}

#[cfg(all(not(target_os = "linux"), not(target_arch = "x86_64")))]
fn detect_virtualization() -> bool {
    false
}

#[cfg(target_os = "linux")]
fn meminfo_field_gb(field: &str) -> usize {
    std::fs::read_to_string("/proc/meminfo")
        .ok()
        .and_then(|content| {
            content.lines().find_map(|line| {
                line.strip_prefix(field)?
                    .trim_start_matches(':')
                    .split_whitespace()
                    .next()?
                    .parse::<usize>()
                    .ok()
            })
        })
        .map(|kb| kb / (1024 * 1024))
        .unwrap_or(0)
}

#[cfg(target_os = "linux")]
fn detect_total_ram_gb() -> usize {
    meminfo_field_gb("MemTotal")
}

#[cfg(target_os = "linux")]
fn detect_available_ram_gb() -> usize {
    meminfo_field_gb("MemAvailable")
}

#[cfg(not(target_os = "linux"))]
fn detect_total_ram_gb() -> usize {
    0
}

#[cfg(not(target_os = "linux"))]
fn detect_available_ram_gb() -> usize {
    0
}

#[cfg(target_os = "linux")]
fn pin_to_cpu(cpu: usize) -> Result<()> {
    // SAFETY: cpu_set_t is plain data; zeroed is its documented empty state,
    // and the set/getaffinity calls only read the set we build here.
    unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut set);
        libc::CPU_SET(cpu, &mut set);
        let rc = libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set);
        if rc != 0 {
            return Err(BenchError::platform(format!(
                "sched_setaffinity to cpu {} failed: {}",
                cpu,
                std::io::Error::last_os_error()
            )));
        }
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn pin_to_cpu(_cpu: usize) -> Result<()> {
    // Pinning is best-effort; unsupported hosts run unpinned.
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_yields_sane_topology() {
        let platform = DetectedPlatform::new();
        let info = platform.detect_cache_info();
        assert!(info.l1_data_size >= 4 * 1024);
        assert!(info.l2_size >= info.l1_data_size);
        assert!(info.l3_size > 0);
        assert!(info.l1_line_size.is_power_of_two());
        assert!(platform.detect_cache_line_size() >= 32);
    }

    #[test]
    fn test_thread_count_validation() {
        let platform = DetectedPlatform::new();
        assert!(platform.validate_thread_count(0, CpuAffinity::Default).is_err());
        assert!(platform.validate_thread_count(1, CpuAffinity::Default).is_ok());
        assert!(platform
            .validate_thread_count(usize::MAX / 4, CpuAffinity::Default)
            .is_err());
    }

    #[test]
    fn test_affinity_request_is_best_effort() {
        let platform = DetectedPlatform::new();
        // Wraps modulo logical cpus, so a large id still targets a real cpu
        let result = platform.set_thread_affinity(3, CpuAffinity::Default, 4);
        if platform.supports_cpu_affinity() {
            assert!(result.is_ok());
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_sysfs_size_parsing() {
        assert_eq!(parse_sysfs_size("32K"), Some(32 * 1024));
        assert_eq!(parse_sysfs_size("8M"), Some(8 * 1024 * 1024));
        assert_eq!(parse_sysfs_size("512"), Some(512));
        assert_eq!(parse_sysfs_size("garbage"), None);
    }

    #[test]
    fn test_virtualized_specs_disable_theoretical_bandwidth() {
        let platform = DetectedPlatform::new();
        let specs = platform.memory_specs();
        if specs.is_virtualized {
            assert!(specs.theoretical_bandwidth_gbps < 0.0);
        } else {
            assert!(specs.theoretical_bandwidth_gbps > 0.0);
        }
    }
}
