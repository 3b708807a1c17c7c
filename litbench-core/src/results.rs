//! lit Result Files
//!
//! lit writes a JSON document with a `tests` array when run with `-o`.
//! Each entry may carry a `metrics` object; benchmarks built on the
//! micro-benchmark library report a `MicroBenchmarks` count plus one
//! `exec_time.<name>` key per micro-benchmark, everything else reports a
//! single scalar `exec_time`.
//!
//! Only the timing metrics are read. Other keys (`compile_time`, `hash`,
//! `link_time`, ...) are ignored.

use crate::{EXEC_TIME_KEY, EXEC_TIME_PREFIX};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Metric key holding the number of micro-benchmarks in a test
pub const MICRO_BENCHMARK_COUNT_KEY: &str = "MicroBenchmarks";

#[derive(Debug, Error)]
pub enum ResultsError {
    #[error("Results file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not decode JSON from {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Metric '{key}' of test '{test}' is not a number: {value}")]
    InvalidValue {
        test: String,
        key: String,
        value: Value,
    },
}

/// Which `tests` entries contribute samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryPolicy {
    /// Only the first entry; a run targets a single test
    #[default]
    First,
    /// Every entry, earliest entry wins on duplicate metric names
    All,
}

/// Top level of a lit `-o` file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LitResults {
    #[serde(default)]
    pub tests: Vec<LitTest>,
}

/// One `tests` entry
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LitTest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub metrics: Option<LitMetrics>,
}

/// The `metrics` object, kept loosely typed because its keys are test-defined
pub type LitMetrics = serde_json::Map<String, Value>;

/// One timing measurement, in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub name: String,
    pub time_ms: f64,
}

impl LitTest {
    /// Timing samples reported by this entry.
    ///
    /// With a micro-benchmark count present, every `exec_time.<name>` key is a
    /// sample named `<name>`; otherwise a scalar `exec_time` becomes one
    /// sample named after the test. Anything else yields nothing.
    pub fn samples(&self) -> Result<Vec<MetricSample>, ResultsError> {
        let Some(metrics) = &self.metrics else {
            return Ok(Vec::new());
        };

        if metrics.contains_key(MICRO_BENCHMARK_COUNT_KEY) {
            let mut samples = Vec::new();
            for (key, value) in metrics {
                if let Some(name) = key.strip_prefix(EXEC_TIME_PREFIX) {
                    samples.push(MetricSample {
                        name: name.to_string(),
                        time_ms: self.numeric(key, value)?,
                    });
                }
            }
            Ok(samples)
        } else if let Some(value) = metrics.get(EXEC_TIME_KEY) {
            Ok(vec![MetricSample {
                name: self.name.clone(),
                time_ms: self.numeric(EXEC_TIME_KEY, value)?,
            }])
        } else {
            Ok(Vec::new())
        }
    }

    fn numeric(&self, key: &str, value: &Value) -> Result<f64, ResultsError> {
        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        parsed.ok_or_else(|| ResultsError::InvalidValue {
            test: self.name.clone(),
            key: key.to_string(),
            value: value.clone(),
        })
    }
}

impl LitResults {
    /// Metric name → time for the selected entries.
    pub fn timings(&self, policy: EntryPolicy) -> Result<BTreeMap<String, f64>, ResultsError> {
        let entries = match policy {
            EntryPolicy::First => &self.tests[..self.tests.len().min(1)],
            EntryPolicy::All => &self.tests[..],
        };

        let mut timings = BTreeMap::new();
        for entry in entries {
            for sample in entry.samples()? {
                timings.entry(sample.name).or_insert(sample.time_ms);
            }
        }
        Ok(timings)
    }
}

/// Read a lit result file and return metric name → time.
pub fn parse_results(
    path: &Path,
    policy: EntryPolicy,
) -> Result<BTreeMap<String, f64>, ResultsError> {
    let content = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ResultsError::NotFound(path.to_path_buf())
        } else {
            ResultsError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    parse_results_str(&content, policy).map_err(|e| match e {
        ResultsError::Malformed { source, .. } => ResultsError::Malformed {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    })
}

/// Parse lit result JSON held in memory.
pub fn parse_results_str(
    json: &str,
    policy: EntryPolicy,
) -> Result<BTreeMap<String, f64>, ResultsError> {
    let results: LitResults =
        serde_json::from_str(json).map_err(|source| ResultsError::Malformed {
            path: PathBuf::from("<memory>"),
            source,
        })?;
    results.timings(policy)
}
