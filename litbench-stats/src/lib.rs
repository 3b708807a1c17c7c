#![warn(missing_docs)]
//! litbench Statistical Engine
//!
//! Run-to-run noise analysis for repeated benchmark executions:
//! - Per-metric time series collected across runs, in run order
//! - Mean and sample standard deviation (n - 1)
//! - Coefficient of variation with a configurable high-variance threshold

mod series;
mod summary;
mod variance;

pub use series::MetricSeries;
pub use summary::{SummaryStatistics, compute_summary};
pub use variance::{
    MetricVariance, VarianceSettings, VarianceStats, analyze_metric, is_high_variance,
};

/// Default CV (percent) above which a metric is flagged as noisy
pub const DEFAULT_CV_THRESHOLD: f64 = 2.0;

/// Fewest samples for which a standard deviation is computed
pub const MIN_SAMPLES: usize = 2;

/// Slack applied when comparing a CV against the threshold, absorbing
/// floating-point error so a CV that equals the threshold is not flagged
pub const CV_TOLERANCE: f64 = 1e-9;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert!((DEFAULT_CV_THRESHOLD - 2.0).abs() < f64::EPSILON);
        assert_eq!(MIN_SAMPLES, 2);
        assert!(CV_TOLERANCE > 0.0 && CV_TOLERANCE < 1e-6);
    }
}
