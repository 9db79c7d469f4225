//! Result rendering
//!
//! Pure string generation for Markdown, JSON and CSV output; the caller
//! decides where the text goes. A CLI front end or harness sits on top of
//! this module. Suspicious results (per [`crate::validate`]) are annotated,
//! never dropped.

use serde::Serialize;

use crate::error::{BenchError, Result};
use crate::platform::MemorySpecs;
use crate::stats::PerformanceStats;
use crate::validate::{calculate_efficiency, ResultValidator, EFFICIENCY_NOT_APPLICABLE};

/// Output format for rendered results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Markdown tables (default)
    #[default]
    Markdown,
    /// JSON document
    Json,
    /// CSV rows with a header line
    Csv,
}

impl OutputFormat {
    /// Parse a format from its CLI-style identifier
    pub fn from_str_id(id: &str) -> Option<Self> {
        match id {
            "markdown" | "md" => Some(Self::Markdown),
            "json" => Some(Self::Json),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Markdown => "markdown",
            Self::Json => "json",
            Self::Csv => "csv",
        })
    }
}

/// One row of output: a measurement plus its context
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestResult {
    /// Test name, e.g. `"Sequential Read"`
    pub test_name: String,
    /// Working-set description, e.g. `"1/2 L2 per thread"` or `"1GB"`
    pub working_set_desc: String,
    /// Number of worker threads used
    pub num_threads: usize,
    /// Measured statistics
    pub stats: PerformanceStats,
}

impl TestResult {
    /// Build the result rows of a cache-aware sweep
    pub fn from_sweep(
        test_name: &str,
        num_threads: usize,
        sweep: Vec<(String, PerformanceStats)>,
    ) -> Vec<Self> {
        sweep
            .into_iter()
            .map(|(working_set_desc, stats)| Self {
                test_name: test_name.to_string(),
                working_set_desc,
                num_threads,
                stats,
            })
            .collect()
    }
}

/// Renders results in the configured output format
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputFormatter {
    format: OutputFormat,
    validator: ResultValidator,
}

impl OutputFormatter {
    /// Create a formatter for the given output format
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            validator: ResultValidator::new(),
        }
    }

    /// The configured output format
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Render a set of results
    pub fn format_test_results(
        &self,
        results: &[TestResult],
        specs: &MemorySpecs,
    ) -> Result<String> {
        match self.format {
            OutputFormat::Markdown => Ok(self.markdown_table(results, specs)),
            OutputFormat::Json => self.json_document(None, results, specs),
            OutputFormat::Csv => Ok(self.csv_rows(results, specs)),
        }
    }

    /// Render a cache-aware sweep under a pattern heading
    pub fn format_cache_aware_results(
        &self,
        pattern_name: &str,
        results: &[TestResult],
        specs: &MemorySpecs,
    ) -> Result<String> {
        match self.format {
            OutputFormat::Markdown => {
                let mut out = format!("\n## {} - Cache-Aware Working Sets\n\n", pattern_name);
                out.push_str(&self.markdown_table(results, specs));
                Ok(out)
            }
            OutputFormat::Json => self.json_document(Some(pattern_name), results, specs),
            OutputFormat::Csv => Ok(self.csv_rows(results, specs)),
        }
    }

    /// Closing line after all tests finished
    pub fn format_completion_message(&self) -> String {
        match self.format {
            OutputFormat::Markdown => "\n---\n\nBenchmark complete.\n".to_string(),
            OutputFormat::Json => String::new(),
            OutputFormat::Csv => String::new(),
        }
    }

    fn markdown_table(&self, results: &[TestResult], specs: &MemorySpecs) -> String {
        let mut out = String::new();
        out.push_str(
            "| Test | Working Set | Threads | Bandwidth (GB/s) | Latency (ns) | Efficiency |\n",
        );
        out.push_str(
            "|------|-------------|---------|------------------|--------------|------------|\n",
        );
        for result in results {
            let flagged = !self.validator.validate(&result.stats, specs).is_empty();
            out.push_str(&format!(
                "| {}{} | {} | {} | {:.2} | {:.2} | {} |\n",
                result.test_name,
                if flagged { " \u{26a0}" } else { "" },
                result.working_set_desc,
                result.num_threads,
                result.stats.bandwidth_gbps,
                result.stats.latency_ns,
                efficiency_cell(result.stats.bandwidth_gbps, specs),
            ));
        }
        out
    }

    fn json_document(
        &self,
        pattern_name: Option<&str>,
        results: &[TestResult],
        specs: &MemorySpecs,
    ) -> Result<String> {
        #[derive(Serialize)]
        struct JsonRow<'a> {
            #[serde(flatten)]
            result: &'a TestResult,
            efficiency_percent: Option<f64>,
            flags: Vec<&'static str>,
        }

        #[derive(Serialize)]
        struct JsonDoc<'a> {
            #[serde(skip_serializing_if = "Option::is_none")]
            pattern: Option<&'a str>,
            results: Vec<JsonRow<'a>>,
        }

        let doc = JsonDoc {
            pattern: pattern_name,
            results: results
                .iter()
                .map(|result| {
                    let efficiency = calculate_efficiency(result.stats.bandwidth_gbps, specs);
                    JsonRow {
                        result,
                        efficiency_percent: (efficiency != EFFICIENCY_NOT_APPLICABLE)
                            .then_some(efficiency),
                        flags: self
                            .validator
                            .validate(&result.stats, specs)
                            .iter()
                            .map(|flag| flag.description())
                            .collect(),
                    }
                })
                .collect(),
        };

        serde_json::to_string_pretty(&doc)
            .map_err(|e| BenchError::test(format!("failed to serialize results: {}", e)))
    }

    fn csv_rows(&self, results: &[TestResult], specs: &MemorySpecs) -> String {
        let mut out = String::from(
            "test,working_set,threads,bandwidth_gbps,latency_ns,bytes_processed,time_seconds,efficiency_percent,flagged\n",
        );
        for result in results {
            let flagged = !self.validator.validate(&result.stats, specs).is_empty();
            let efficiency = calculate_efficiency(result.stats.bandwidth_gbps, specs);
            out.push_str(&format!(
                "{},{},{},{:.4},{:.4},{},{:.6},{},{}\n",
                result.test_name,
                result.working_set_desc,
                result.num_threads,
                result.stats.bandwidth_gbps,
                result.stats.latency_ns,
                result.stats.bytes_processed,
                result.stats.time_seconds,
                if efficiency == EFFICIENCY_NOT_APPLICABLE {
                    "N/A".to_string()
                } else {
                    format!("{:.2}", efficiency)
                },
                flagged,
            ));
        }
        out
    }
}

fn efficiency_cell(bandwidth_gbps: f64, specs: &MemorySpecs) -> String {
    let efficiency = calculate_efficiency(bandwidth_gbps, specs);
    if efficiency == EFFICIENCY_NOT_APPLICABLE {
        "N/A".to_string()
    } else {
        format!("{:.1}%", efficiency)
    }
}
