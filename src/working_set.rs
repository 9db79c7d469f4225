//! Working-set size generation
//!
//! Translates a cache hierarchy into the ordered list of buffer sizes the
//! cache-aware sweep walks: fractions of each cache level, then sizes beyond
//! the last level. Sizes outside the configured bounds are silently dropped,
//! never reported as errors; a tiny cache simply yields a shorter sweep.

use crate::config::{
    MAX_WORKING_SET_SIZE, MIN_WORKING_SET_SIZE, STANDARD_WORKING_SETS, WORKING_SET_FRACTIONS,
    WORKING_SET_MULTIPLIERS,
};
use crate::platform::CacheInfo;

/// One size in a sweep with its human-readable label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingSetEntry {
    /// Buffer size in bytes
    pub size: usize,
    /// Label for reports, e.g. `"1/2 L2 cache"` or `"256MB"`
    pub label: String,
}

impl WorkingSetEntry {
    fn new(size: usize, label: impl Into<String>) -> Self {
        Self {
            size,
            label: label.into(),
        }
    }
}

/// Ordered list of working-set sizes for a sweep
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WorkingSet {
    entries: Vec<WorkingSetEntry>,
}

impl WorkingSet {
    /// Single-thread sweep: fractions of L1, L2 and SLC, then beyond-cache
    ///
    /// Each cache level contributes 1/8, 1/4, 1/2 and full-size entries; the
    /// beyond-cache block is 2x/4x/8x SLC followed by the standard sizes from
    /// 64MB to 4GB. Entries outside `[MIN, MAX]` are filtered out, order
    /// preserved.
    pub fn build(cache_info: &CacheInfo) -> Self {
        let mut entries = Vec::new();

        for (level_size, level_name) in [
            (cache_info.l1_data_size, "L1 cache"),
            (cache_info.l2_size, "L2 cache"),
            (cache_info.l3_size, "SLC"),
        ] {
            for fraction in WORKING_SET_FRACTIONS {
                let label = match fraction {
                    1 => format!("Full {}", level_name),
                    f => format!("1/{} {}", f, level_name),
                };
                entries.push(WorkingSetEntry::new(level_size / fraction, label));
            }
        }

        for multiplier in WORKING_SET_MULTIPLIERS {
            entries.push(WorkingSetEntry::new(
                cache_info.l3_size * multiplier,
                format!("{}x SLC", multiplier),
            ));
        }
        for size in STANDARD_WORKING_SETS {
            entries.push(WorkingSetEntry::new(size, standard_label(size)));
        }

        entries.retain(|e| (MIN_WORKING_SET_SIZE..=MAX_WORKING_SET_SIZE).contains(&e.size));
        Self { entries }
    }

    /// Multi-thread sweep: per-thread sizes sized so the aggregate fits
    ///
    /// L1 and L2 are per-core, so each thread gets the full cache; the shared
    /// SLC is divided by the thread count before taking fractions. A tier
    /// whose per-thread size falls below the minimum is omitted. Beyond-cache
    /// uses 2x/4x SLC and a reduced standard-size ladder.
    pub fn thread_aware(cache_info: &CacheInfo, num_threads: usize) -> Self {
        debug_assert!(num_threads > 0);
        let mut entries = Vec::new();

        let mut push_tier = |per_thread: usize, level_name: &str| {
            for fraction in [4usize, 2, 1] {
                let size = per_thread / fraction;
                if size >= MIN_WORKING_SET_SIZE {
                    let label = match fraction {
                        1 => format!("{} per thread", level_name),
                        f => format!("1/{} {} per thread", f, level_name),
                    };
                    entries.push(WorkingSetEntry::new(size, label));
                }
            }
        };

        push_tier(cache_info.l1_data_size, "L1");
        push_tier(cache_info.l2_size, "L2");
        push_tier(cache_info.l3_size / num_threads.max(1), "SLC");

        let beyond = [
            (cache_info.l3_size * 2, "2x SLC".to_string()),
            (cache_info.l3_size * 4, "4x SLC".to_string()),
        ];
        for (size, label) in beyond {
            if (MIN_WORKING_SET_SIZE..=MAX_WORKING_SET_SIZE).contains(&size) {
                entries.push(WorkingSetEntry::new(size, label));
            }
        }
        for size in [
            STANDARD_WORKING_SETS[0], // 64MB
            STANDARD_WORKING_SETS[2], // 256MB
            STANDARD_WORKING_SETS[4], // 1GB
            STANDARD_WORKING_SETS[5], // 2GB
            STANDARD_WORKING_SETS[6], // 4GB
        ] {
            if (MIN_WORKING_SET_SIZE..=MAX_WORKING_SET_SIZE).contains(&size) {
                entries.push(WorkingSetEntry::new(size, standard_label(size)));
            }
        }

        Self { entries }
    }

    /// Entries in sweep order
    pub fn entries(&self) -> &[WorkingSetEntry] {
        &self.entries
    }

    /// Number of sizes in the sweep
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the bounds filtered everything out
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in sweep order
    pub fn iter(&self) -> std::slice::Iter<'_, WorkingSetEntry> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a WorkingSet {
    type Item = &'a WorkingSetEntry;
    type IntoIter = std::slice::Iter<'a, WorkingSetEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

fn standard_label(size: usize) -> String {
    const MB: usize = 1024 * 1024;
    const GB: usize = 1024 * MB;
    if size >= GB {
        format!("{}GB", size / GB)
    } else {
        format!("{}MB", size / MB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GB, KB, MB};

    fn typical_cache() -> CacheInfo {
        CacheInfo {
            l1_data_size: 32 * KB,
            l2_size: 256 * KB,
            l3_size: 8 * MB,
            ..CacheInfo::default()
        }
    }

    #[test]
    fn test_build_orders_and_bounds() {
        let set = WorkingSet::build(&typical_cache());
        assert!(!set.is_empty());
        for entry in &set {
            assert!(entry.size >= MIN_WORKING_SET_SIZE);
            assert!(entry.size <= MAX_WORKING_SET_SIZE);
        }
        // 1/8 of 32KB L1 is 4KB, exactly the minimum: kept as the first entry
        assert_eq!(set.entries()[0].size, 4 * KB);
        assert_eq!(set.entries()[0].label, "1/8 L1 cache");
        // Largest standard size survives the filter
        assert_eq!(set.entries().last().unwrap().size, 4 * GB);
        assert_eq!(set.entries().last().unwrap().label, "4GB");
    }

    #[test]
    fn test_build_filters_below_minimum() {
        let tiny = CacheInfo {
            l1_data_size: 8 * KB, // fractions 1KB..4KB fall below the 4KB floor
            ..typical_cache()
        };
        let set = WorkingSet::build(&tiny);
        assert!(set.iter().all(|e| e.size >= MIN_WORKING_SET_SIZE));
        assert!(!set.iter().any(|e| e.label == "1/8 L1 cache"));
        assert!(set.iter().any(|e| e.label == "Full L1 cache"));
    }

    #[test]
    fn test_thread_aware_divides_shared_cache() {
        let cache = typical_cache();
        let set = WorkingSet::thread_aware(&cache, 4);
        // SLC tier is per-thread: 8MB / 4 threads = 2MB full per thread
        let slc = set
            .iter()
            .find(|e| e.label == "SLC per thread")
            .expect("shared tier present");
        assert_eq!(slc.size, 2 * MB);
        // L1/L2 are per-core: not divided
        let l1 = set.iter().find(|e| e.label == "L1 per thread").unwrap();
        assert_eq!(l1.size, 32 * KB);
    }

    #[test]
    fn test_thread_aware_omits_sub_minimum_tiers() {
        let cache = typical_cache();
        // 8MB SLC / 1024 threads = 8KB; its 1/4 fraction (2KB) is below floor
        let set = WorkingSet::thread_aware(&cache, 1024);
        assert!(!set.iter().any(|e| e.label == "1/4 SLC per thread"));
        assert!(set.iter().any(|e| e.label == "SLC per thread"));
    }

    #[test]
    fn test_thread_aware_beyond_cache_ladder() {
        let set = WorkingSet::thread_aware(&typical_cache(), 2);
        let labels: Vec<&str> = set.iter().map(|e| e.label.as_str()).collect();
        let beyond_start = labels.iter().position(|&l| l == "2x SLC").unwrap();
        assert_eq!(
            &labels[beyond_start..],
            &["2x SLC", "4x SLC", "64MB", "256MB", "1GB", "2GB", "4GB"]
        );
    }

    #[test]
    fn test_single_thread_matches_undivided_slc() {
        let cache = typical_cache();
        let set = WorkingSet::thread_aware(&cache, 1);
        let slc = set.iter().find(|e| e.label == "SLC per thread").unwrap();
        assert_eq!(slc.size, cache.l3_size);
    }
}
