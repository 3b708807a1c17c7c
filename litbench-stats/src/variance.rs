//! Variance Classification
//!
//! Turns one metric's series into either a computed noise estimate or an
//! "insufficient data" marker. A standard deviation from a single run is
//! meaningless, so nothing is computed below [`MIN_SAMPLES`](crate::MIN_SAMPLES).

use crate::summary::{SummaryStatistics, compute_summary};
use crate::{CV_TOLERANCE, DEFAULT_CV_THRESHOLD, MIN_SAMPLES};
use serde::{Deserialize, Serialize};

/// Thresholds applied when classifying a series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VarianceSettings {
    /// CV percentage above which a metric is flagged
    pub cv_threshold: f64,
    /// Fewest samples needed for statistics
    pub min_samples: usize,
}

impl Default for VarianceSettings {
    fn default() -> Self {
        Self {
            cv_threshold: DEFAULT_CV_THRESHOLD,
            min_samples: MIN_SAMPLES,
        }
    }
}

/// Computed noise estimate for one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarianceStats {
    /// Mean, standard deviation and sample count
    pub summary: SummaryStatistics,
    /// Coefficient of variation in percent
    pub cv_percent: f64,
    /// CV exceeds the configured threshold
    pub high_variance: bool,
}

/// Outcome of analysing one metric
#[derive(Debug, Clone, PartialEq)]
pub enum MetricVariance {
    /// Too few samples to estimate dispersion
    Insufficient {
        /// Samples that were collected
        samples: usize,
    },
    /// Dispersion statistics
    Computed(VarianceStats),
}

impl MetricVariance {
    /// Statistics, if they were computed
    pub fn stats(&self) -> Option<&VarianceStats> {
        match self {
            MetricVariance::Computed(stats) => Some(stats),
            MetricVariance::Insufficient { .. } => None,
        }
    }

    /// Whether the metric was flagged as noisy
    pub fn is_high_variance(&self) -> bool {
        self.stats().is_some_and(|s| s.high_variance)
    }
}

/// `true` iff `cv` is above `threshold`. A CV equal to the threshold, up to
/// [`CV_TOLERANCE`], is not high variance.
pub fn is_high_variance(cv: f64, threshold: f64) -> bool {
    cv - threshold > CV_TOLERANCE
}

/// Classify one metric's samples.
pub fn analyze_metric(samples: &[f64], settings: &VarianceSettings) -> MetricVariance {
    if samples.len() < settings.min_samples.max(MIN_SAMPLES) {
        return MetricVariance::Insufficient {
            samples: samples.len(),
        };
    }

    let summary = compute_summary(samples);
    MetricVariance::Computed(VarianceStats {
        high_variance: !summary.is_stable(settings.cv_threshold),
        cv_percent: summary.coefficient_of_variation(),
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_sample_is_insufficient() {
        let result = analyze_metric(&[12.0], &VarianceSettings::default());
        assert_eq!(result, MetricVariance::Insufficient { samples: 1 });
        assert!(result.stats().is_none());
        assert!(!result.is_high_variance());
    }

    #[test]
    fn test_boundary_cv_is_not_high_variance() {
        // mean 10.0, stddev 0.2, CV 2.0% (up to rounding)
        let result = analyze_metric(&[10.0, 10.2, 9.8], &VarianceSettings::default());
        let stats = result.stats().unwrap();

        assert!((stats.summary.mean - 10.0).abs() < 1e-9);
        assert!((stats.summary.std_dev - 0.2).abs() < 1e-9);
        assert!((stats.cv_percent - 2.0).abs() < 1e-9);
        assert!(!stats.high_variance);
    }

    #[test]
    fn test_threshold_comparison() {
        assert!(!is_high_variance(2.0, 2.0));
        assert!(!is_high_variance(2.0 + 1e-12, 2.0));
        assert!(is_high_variance(2.001, 2.0));
        assert!(!is_high_variance(1.999, 2.0));
    }

    #[test]
    fn test_noisy_metric_flagged() {
        let result = analyze_metric(&[10.0, 11.0, 9.0, 10.5], &VarianceSettings::default());
        assert!(result.is_high_variance());
    }

    #[test]
    fn test_custom_threshold() {
        let settings = VarianceSettings {
            cv_threshold: 5.0,
            ..VarianceSettings::default()
        };
        let samples = [10.0, 10.4, 9.6];
        assert!(!analyze_metric(&samples, &settings).is_high_variance());
        assert!(analyze_metric(&samples, &VarianceSettings::default()).is_high_variance());
    }

    #[test]
    fn test_min_samples_never_below_two() {
        let settings = VarianceSettings {
            min_samples: 1,
            ..VarianceSettings::default()
        };
        assert!(matches!(
            analyze_metric(&[3.0], &settings),
            MetricVariance::Insufficient { samples: 1 }
        ));

        let strict = VarianceSettings {
            min_samples: 4,
            ..VarianceSettings::default()
        };
        assert!(matches!(
            analyze_metric(&[3.0, 3.1, 3.2], &strict),
            MetricVariance::Insufficient { samples: 3 }
        ));
    }

    #[test]
    fn test_zero_mean_series() {
        let result = analyze_metric(&[0.0, 0.0, 0.0], &VarianceSettings::default());
        let stats = result.stats().unwrap();
        assert_eq!(stats.cv_percent, 0.0);
        assert!(!stats.high_variance);
    }
}
