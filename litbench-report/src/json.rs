//! JSON Output

use crate::report::VarianceReport;
use serde::{Deserialize, Serialize};

/// Version of the JSON layout written by [`generate_json_report`]
pub const SCHEMA_VERSION: u32 = 1;

/// Schema information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSchema {
    /// Schema identifier
    pub schema: String,
    /// Schema version
    pub version: u32,
}

impl Default for ReportSchema {
    fn default() -> Self {
        Self {
            schema: "litbench-variance".to_string(),
            version: SCHEMA_VERSION,
        }
    }
}

/// Generate a prettified JSON report.
pub fn generate_json_report(report: &VarianceReport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}
