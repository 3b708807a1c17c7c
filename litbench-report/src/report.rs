//! Report Data Structures

use crate::json::ReportSchema;
use chrono::{DateTime, Utc};
use litbench_stats::{MetricVariance, VarianceStats};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Complete variance report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarianceReport {
    pub meta: ReportMeta,
    pub config: ReportConfig,
    pub runs: Vec<RunRecord>,
    pub metrics: Vec<MetricReport>,
    pub summary: ReportSummary,
}

impl VarianceReport {
    /// Assemble a report, deriving the summary from the metric entries.
    pub fn new(
        meta: ReportMeta,
        config: ReportConfig,
        runs: Vec<RunRecord>,
        metrics: Vec<MetricReport>,
    ) -> Self {
        let summary = ReportSummary::from_metrics(&metrics);
        Self {
            meta,
            config,
            runs,
            metrics,
            summary,
        }
    }

    /// Metrics flagged as noisy
    pub fn high_variance_metrics(&self) -> impl Iterator<Item = &MetricReport> {
        self.metrics
            .iter()
            .filter(|m| m.stats.as_ref().is_some_and(|s| s.high_variance))
    }
}

/// Report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMeta {
    pub schema: ReportSchema,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub system: SystemInfo,
}

/// Host the runs executed on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os: String,
    pub arch: String,
    pub cpu: String,
    pub cpu_cores: u32,
}

/// Configuration shared by every run of the analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub label_prefix: String,
    pub test_path: String,
    pub target: String,
    pub cflags: String,
    pub cxxflags: String,
    pub ldflags: String,
    pub num_runs: u32,
    pub cv_threshold: f64,
}

/// One repeated run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    /// 1-based run index
    pub index: u32,
    pub label: String,
    pub results_file: PathBuf,
    /// Timings this run contributed
    pub samples: usize,
    /// Why the result file contributed nothing, if it could not be read
    pub error: Option<String>,
}

/// Whether statistics were computed for a metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricStatus {
    Analyzed,
    InsufficientData,
}

/// Dispersion of one metric, in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricStats {
    pub mean_ms: f64,
    pub std_dev_ms: f64,
    pub cv_percent: f64,
    pub high_variance: bool,
}

impl From<&VarianceStats> for MetricStats {
    fn from(stats: &VarianceStats) -> Self {
        Self {
            mean_ms: stats.summary.mean,
            std_dev_ms: stats.summary.std_dev,
            cv_percent: stats.cv_percent,
            high_variance: stats.high_variance,
        }
    }
}

/// One micro-benchmark across all runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricReport {
    pub name: String,
    /// Timings in run order
    pub times_ms: Vec<f64>,
    pub status: MetricStatus,
    pub stats: Option<MetricStats>,
}

impl MetricReport {
    pub fn new(name: impl Into<String>, times_ms: &[f64], variance: &MetricVariance) -> Self {
        let (status, stats) = match variance {
            MetricVariance::Computed(stats) => (MetricStatus::Analyzed, Some(MetricStats::from(stats))),
            MetricVariance::Insufficient { .. } => (MetricStatus::InsufficientData, None),
        };
        Self {
            name: name.into(),
            times_ms: times_ms.to_vec(),
            status,
            stats,
        }
    }
}

/// Report summary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_metrics: usize,
    pub analyzed: usize,
    pub insufficient_data: usize,
    pub high_variance: usize,
}

impl ReportSummary {
    pub fn from_metrics(metrics: &[MetricReport]) -> Self {
        let mut summary = ReportSummary {
            total_metrics: metrics.len(),
            ..Default::default()
        };
        for metric in metrics {
            match metric.status {
                MetricStatus::Analyzed => summary.analyzed += 1,
                MetricStatus::InsufficientData => summary.insufficient_data += 1,
            }
            if metric.stats.as_ref().is_some_and(|s| s.high_variance) {
                summary.high_variance += 1;
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate_json_report;
    use litbench_stats::{VarianceSettings, analyze_metric};

    fn dummy_meta() -> ReportMeta {
        ReportMeta {
            schema: ReportSchema::default(),
            version: "0.1.0".to_string(),
            timestamp: Utc::now(),
            system: SystemInfo {
                os: "linux".to_string(),
                arch: "x86_64".to_string(),
                cpu: "test".to_string(),
                cpu_cores: 1,
            },
        }
    }

    fn dummy_config() -> ReportConfig {
        ReportConfig {
            label_prefix: "blur".to_string(),
            test_path: "MicroBenchmarks/ImageProcessing/Blur".to_string(),
            target: "native".to_string(),
            cflags: "-O2".to_string(),
            cxxflags: "-O2".to_string(),
            ldflags: String::new(),
            num_runs: 3,
            cv_threshold: 2.0,
        }
    }

    fn metric(name: &str, times: &[f64]) -> MetricReport {
        MetricReport::new(name, times, &analyze_metric(times, &VarianceSettings::default()))
    }

    #[test]
    fn summary_counts_statuses() {
        let metrics = vec![
            metric("steady", &[10.0, 10.0, 10.0]),
            metric("noisy", &[10.0, 12.0, 8.0]),
            metric("lonely", &[5.0]),
        ];
        let report = VarianceReport::new(dummy_meta(), dummy_config(), vec![], metrics);

        assert_eq!(
            report.summary,
            ReportSummary {
                total_metrics: 3,
                analyzed: 2,
                insufficient_data: 1,
                high_variance: 1,
            }
        );
        let noisy: Vec<_> = report.high_variance_metrics().map(|m| m.name.as_str()).collect();
        assert_eq!(noisy, vec!["noisy"]);
    }

    #[test]
    fn insufficient_metric_has_no_stats() {
        let m = metric("lonely", &[5.0]);
        assert_eq!(m.status, MetricStatus::InsufficientData);
        assert!(m.stats.is_none());
        assert_eq!(m.times_ms, vec![5.0]);
    }

    #[test]
    fn json_uses_snake_case_status() {
        let report = VarianceReport::new(
            dummy_meta(),
            dummy_config(),
            vec![RunRecord {
                index: 1,
                label: "blur_run_1".to_string(),
                results_file: PathBuf::from("/out/results_blur_run_1.json"),
                samples: 1,
                error: None,
            }],
            vec![metric("lonely", &[5.0])],
        );

        let json = generate_json_report(&report).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["metrics"][0]["status"], "insufficient_data");
        assert_eq!(value["meta"]["schema"]["schema"], "litbench-variance");
        assert_eq!(value["runs"][0]["label"], "blur_run_1");
        assert_eq!(value["summary"]["insufficient_data"], 1);
    }
}
