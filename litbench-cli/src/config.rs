//! Configuration loading from litbench.toml
//!
//! Suite location, tool names and analysis defaults can be specified in a
//! `litbench.toml` file. The file is found by walking up from the current
//! directory unless a path is given explicitly with `--config`. Every field
//! has a default, and command-line flags override file values.

use anyhow::Context;
use litbench_core::{EntryPolicy, SuiteConfig};
use litbench_stats::{DEFAULT_CV_THRESHOLD, MIN_SAMPLES, VarianceSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name looked up during discovery
pub const CONFIG_FILE_NAME: &str = "litbench.toml";

/// litbench configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct LitConfig {
    /// Test-suite location and external tools
    #[serde(default)]
    pub suite: SuiteConfig,
    /// Variance analysis defaults
    #[serde(default)]
    pub variance: VarianceConfig,
    /// Output locations and format
    #[serde(default)]
    pub output: OutputConfig,
}

/// Variance analysis defaults
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VarianceConfig {
    /// Number of repeated runs
    #[serde(default = "default_num_runs")]
    pub num_runs: u32,
    /// CV percentage above which a metric is flagged
    #[serde(default = "default_cv_threshold")]
    pub cv_threshold: f64,
    /// Fewest samples for computed statistics (never below 2)
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,
    /// Which result-file entries contribute samples
    #[serde(default)]
    pub entry_policy: EntryPolicy,
    /// Single-run binary invoked per run; defaults to `litbench-run` next to the current executable
    #[serde(default)]
    pub orchestrator: Option<PathBuf>,
}

impl Default for VarianceConfig {
    fn default() -> Self {
        Self {
            num_runs: default_num_runs(),
            cv_threshold: default_cv_threshold(),
            min_samples: default_min_samples(),
            entry_policy: EntryPolicy::default(),
            orchestrator: None,
        }
    }
}

impl VarianceConfig {
    /// Thresholds for classifying metrics, with an optional CLI override
    pub fn settings(&self, cv_threshold: Option<f64>) -> VarianceSettings {
        VarianceSettings {
            cv_threshold: cv_threshold.unwrap_or(self.cv_threshold),
            min_samples: self.min_samples.max(MIN_SAMPLES),
        }
    }
}

fn default_num_runs() -> u32 {
    5
}
fn default_cv_threshold() -> f64 {
    DEFAULT_CV_THRESHOLD
}
fn default_min_samples() -> usize {
    MIN_SAMPLES
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputConfig {
    /// Result directory for single runs
    #[serde(default = "default_run_directory")]
    pub run_directory: PathBuf,
    /// Result directory for variance runs
    #[serde(default = "default_variance_directory")]
    pub variance_directory: PathBuf,
    /// Report format: "human" or "json"
    #[serde(default = "default_format")]
    pub format: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            run_directory: default_run_directory(),
            variance_directory: default_variance_directory(),
            format: default_format(),
        }
    }
}

fn default_run_directory() -> PathBuf {
    PathBuf::from("/home/ubuntu/benchmark_results")
}
fn default_variance_directory() -> PathBuf {
    PathBuf::from("/home/ubuntu/variance_results")
}
fn default_format() -> String {
    "human".to_string()
}

impl LitConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// Try to discover and load configuration by walking up from current directory
    pub fn discover() -> Option<(PathBuf, Self)> {
        let mut dir = std::env::current_dir().ok()?;
        loop {
            let config_path = dir.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                return match Self::load(&config_path) {
                    Ok(config) => Some((config_path, config)),
                    Err(e) => {
                        warn!("Ignoring {}: {:#}", config_path.display(), e);
                        None
                    }
                };
            }
            if !dir.pop() {
                break;
            }
        }
        None
    }

    /// Explicit path if given (errors propagate), else discovery, else defaults.
    ///
    /// Also returns the path the configuration came from, if any.
    pub fn resolve(explicit: Option<&Path>) -> anyhow::Result<(Self, Option<PathBuf>)> {
        if let Some(path) = explicit {
            let config = Self::load(path)?;
            debug!("Loaded configuration from {}", path.display());
            return Ok((config, Some(path.to_path_buf())));
        }
        match Self::discover() {
            Some((path, config)) => {
                debug!("Discovered configuration at {}", path.display());
                Ok((config, Some(path)))
            }
            None => Ok((Self::default(), None)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LitConfig::default();
        assert_eq!(config.variance.num_runs, 5);
        assert!((config.variance.cv_threshold - 2.0).abs() < f64::EPSILON);
        assert_eq!(config.variance.entry_policy, EntryPolicy::First);
        assert_eq!(config.suite.lit, "lit");
        assert_eq!(config.output.format, "human");
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
            [suite]
            source_dir = "/opt/llvm-test-suite"
            build_root = "/scratch"
            run_under = "qemu-arm -L /opt/sysroot"

            [suite.env]
            QEMU_CPU = "cortex-a15"

            [variance]
            num_runs = 10
            entry_policy = "all"
        "#;

        let config: LitConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.suite.source_dir, PathBuf::from("/opt/llvm-test-suite"));
        assert_eq!(config.suite.build_dir_for("x"), PathBuf::from("/scratch/build_x"));
        assert_eq!(config.suite.run_under, "qemu-arm -L /opt/sysroot");
        assert_eq!(config.suite.env["QEMU_CPU"], "cortex-a15");
        assert_eq!(config.variance.num_runs, 10);
        assert_eq!(config.variance.entry_policy, EntryPolicy::All);
        // Defaults should still apply
        assert_eq!(config.suite.generator, "Ninja");
        assert!((config.variance.cv_threshold - 2.0).abs() < f64::EPSILON);
        assert_eq!(config.output.format, "human");
    }

    #[test]
    fn test_settings_override() {
        let config = VarianceConfig {
            min_samples: 0,
            ..VarianceConfig::default()
        };
        let settings = config.settings(Some(5.0));
        assert!((settings.cv_threshold - 5.0).abs() < f64::EPSILON);
        assert_eq!(settings.min_samples, 2);
        assert!((config.settings(None).cv_threshold - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_resolve_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[output]\nformat = \"json\"\n").unwrap();

        let (config, source) = LitConfig::resolve(Some(&path)).unwrap();
        assert_eq!(config.output.format, "json");
        assert_eq!(source, Some(path));
    }

    #[test]
    fn test_resolve_explicit_path_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(LitConfig::resolve(Some(&missing)).is_err());

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "[variance]\nnum_runs = \"many\"\n").unwrap();
        assert!(LitConfig::resolve(Some(&broken)).is_err());
    }
}
