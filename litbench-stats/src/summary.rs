//! Summary Statistics
//!
//! Central tendency and dispersion of one metric's samples. The standard
//! deviation uses the sample (n - 1) denominator since the runs are a sample
//! of all possible runs on the machine.

use serde::{Deserialize, Serialize};

/// Mean and dispersion of a set of timings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStatistics {
    /// Arithmetic mean
    pub mean: f64,
    /// Sample standard deviation; 0 with fewer than two samples
    pub std_dev: f64,
    /// Number of samples
    pub sample_count: usize,
}

/// Compute mean and sample standard deviation
pub fn compute_summary(samples: &[f64]) -> SummaryStatistics {
    if samples.is_empty() {
        return SummaryStatistics {
            mean: 0.0,
            std_dev: 0.0,
            sample_count: 0,
        };
    }

    let n = samples.len();
    let mean = samples.iter().sum::<f64>() / n as f64;

    let std_dev = if n < 2 {
        0.0
    } else {
        let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        variance.sqrt()
    };

    SummaryStatistics {
        mean,
        std_dev,
        sample_count: n,
    }
}

impl SummaryStatistics {
    /// Coefficient of variation (stddev as a percentage of the mean); 0 when the mean is 0
    pub fn coefficient_of_variation(&self) -> f64 {
        if self.mean == 0.0 {
            0.0
        } else {
            (self.std_dev / self.mean) * 100.0
        }
    }

    /// Check if the distribution appears stable (CV at or under the threshold)
    pub fn is_stable(&self, cv_threshold: f64) -> bool {
        !crate::is_high_variance(self.coefficient_of_variation(), cv_threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_summary() {
        let samples = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let summary = compute_summary(&samples);

        assert!((summary.mean - 3.0).abs() < 1e-12);
        // sum of squares 10, n - 1 = 4
        assert!((summary.std_dev - 2.5f64.sqrt()).abs() < 1e-12);
        assert_eq!(summary.sample_count, 5);
    }

    #[test]
    fn test_coefficient_of_variation() {
        let samples = vec![100.0, 100.0, 100.0, 100.0, 100.0];
        let summary = compute_summary(&samples);

        // Zero variance = zero CV
        assert!((summary.coefficient_of_variation() - 0.0).abs() < f64::EPSILON);
        assert!(summary.is_stable(2.0));

        let spread = compute_summary(&[90.0, 110.0]);
        let expected = 100.0 * 200.0f64.sqrt() / 100.0;
        assert!((spread.coefficient_of_variation() - expected).abs() < 1e-9);
        assert!(!spread.is_stable(2.0));
    }

    #[test]
    fn test_zero_mean_has_zero_cv() {
        let summary = compute_summary(&[-1.0, 1.0]);
        assert_eq!(summary.mean, 0.0);
        assert!(summary.std_dev > 0.0);
        assert_eq!(summary.coefficient_of_variation(), 0.0);
    }

    #[test]
    fn test_single_and_empty_samples() {
        let single = compute_summary(&[42.0]);
        assert_eq!(single.mean, 42.0);
        assert_eq!(single.std_dev, 0.0);
        assert_eq!(single.sample_count, 1);

        let empty = compute_summary(&[]);
        assert_eq!(empty.sample_count, 0);
        assert!((empty.mean - 0.0).abs() < f64::EPSILON);
    }
}
