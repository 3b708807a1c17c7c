//! Output Formatting
//!
//! Human-readable rendering of a variance report: one block per
//! micro-benchmark with its raw timings, mean, standard deviation and CV,
//! followed by a summary.

use litbench_report::{MetricReport, MetricStatus, VarianceReport};

/// Format a report for human-readable terminal display
pub fn format_human_output(report: &VarianceReport) -> String {
    let mut output = String::new();
    let threshold = report.config.cv_threshold;

    output.push('\n');
    output.push_str("--- Variance Analysis ---\n");
    output.push_str(&format!("Benchmark: {}\n", report.config.test_path));
    output.push_str(&format!(
        "Config: target={}, cflags='{}', cxxflags='{}', ldflags='{}'\n",
        report.config.target, report.config.cflags, report.config.cxxflags, report.config.ldflags
    ));
    output.push_str(&format!("Runs: {}\n", report.config.num_runs));
    output.push_str(&"-".repeat(60));
    output.push('\n');

    for metric in &report.metrics {
        format_metric(&mut output, metric, threshold);
    }

    for run in report.runs.iter().filter(|r| r.error.is_some()) {
        output.push_str(&format!(
            "\nRun {} ({}) contributed no data: {}\n",
            run.index,
            run.label,
            run.error.as_deref().unwrap_or_default()
        ));
    }

    let summary = &report.summary;
    output.push('\n');
    output.push_str("Summary\n");
    output.push_str(&"-".repeat(60));
    output.push('\n');
    output.push_str(&format!(
        "  Metrics: {}  Analyzed: {}  Insufficient data: {}  High variance: {}\n",
        summary.total_metrics, summary.analyzed, summary.insufficient_data, summary.high_variance
    ));
    let noisy: Vec<&str> = report
        .high_variance_metrics()
        .map(|m| m.name.as_str())
        .collect();
    if !noisy.is_empty() {
        output.push_str(&format!("  Noisy: {}\n", noisy.join(", ")));
    }
    output.push_str("\nVariance analysis complete.\n");

    output
}

fn format_metric(output: &mut String, metric: &MetricReport, threshold: f64) {
    output.push_str(&format!("\nMicro-Benchmark: {}\n", metric.name));

    match (metric.status, &metric.stats) {
        (MetricStatus::Analyzed, Some(stats)) => {
            output.push_str(&format!("  Runs: {}\n", metric.times_ms.len()));
            output.push_str(&format!("  Times (ms): {:?}\n", metric.times_ms));
            output.push_str(&format!("  Mean: {:.4} ms\n", stats.mean_ms));
            output.push_str(&format!("  StdDev: {:.4} ms\n", stats.std_dev_ms));
            output.push_str(&format!("  CV (%): {:.2}%\n", stats.cv_percent));
            if stats.high_variance {
                output.push_str(&format!(
                    "  WARNING: High variance detected (CV > {}%)!\n",
                    threshold
                ));
            }
        }
        _ => {
            output.push_str(&format!(
                "  Only {} result(s), cannot calculate variance.\n",
                metric.times_ms.len()
            ));
        }
    }
}
