#![warn(missing_docs)]
//! litbench Report
//!
//! Serialisable result of a variance analysis, plus output format selection:
//! - JSON (machine-readable)
//! - Human (terminal text, rendered by the CLI)

mod json;
mod report;

pub use json::{ReportSchema, SCHEMA_VERSION, generate_json_report};
pub use report::{
    MetricReport, MetricStats, MetricStatus, ReportConfig, ReportMeta, ReportSummary, RunRecord,
    SystemInfo, VarianceReport,
};

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON with full schema
    Json,
    /// Human-readable terminal output
    Human,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" | "text" => Ok(OutputFormat::Human),
            other => Err(format!("Unknown output format: {}", other)),
        }
    }
}
