//! Metric Series
//!
//! Per-metric timings gathered across repeated runs. Runs are recorded in
//! run-index order, so each series is ordered by run index. A metric missing
//! from a run simply gets a shorter series.

use std::collections::BTreeMap;

/// Metric name → timings, one per run that reported the metric
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricSeries {
    series: BTreeMap<String, Vec<f64>>,
}

impl MetricSeries {
    /// Create an empty series set
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one run's timings. Must be called in run-index order.
    pub fn record_run<I, S>(&mut self, timings: I)
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        for (name, value) in timings {
            self.series.entry(name.into()).or_default().push(value);
        }
    }

    /// Timings for one metric
    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.series.get(name).map(Vec::as_slice)
    }

    /// Number of distinct metrics
    pub fn len(&self) -> usize {
        self.series.len()
    }

    /// No metric has any sample
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Metrics in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.series
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }
}
