//! Variance Analysis
//!
//! Repeats one benchmark configuration `num_runs` times by invoking the
//! single-run binary as an external process, then merges the per-run result
//! files and computes the dispersion of every micro-benchmark.
//!
//! Runs are strictly sequential. A run whose configure or build stage fails
//! aborts the whole sequence; a result file that cannot be read only costs
//! that run's samples.

use crate::metadata::build_report_meta;
use litbench_core::{
    CommandSpec, ConfigError, EntryPolicy, ProcessError, ProcessRunner, Target, parse_results,
    results_file_for, validate_label,
};
use litbench_report::{MetricReport, ReportConfig, RunRecord, VarianceReport};
use litbench_stats::{MetricSeries, VarianceSettings, analyze_metric};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Name of the single-run binary
pub const ORCHESTRATOR_BIN: &str = "litbench-run";

#[derive(Debug, Error)]
pub enum VarianceError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Number of runs must be at least 1")]
    InvalidRunCount,

    #[error("Run {index} could not be launched: {source}")]
    Launch {
        index: u32,
        #[source]
        source: ProcessError,
    },

    #[error("Benchmark run {index} ('{label}') failed with exit code {exit_code}. Aborting variance analysis.")]
    RunFailed {
        index: u32,
        label: String,
        exit_code: i32,
    },

    #[error("No data collected from {runs} run(s); cannot perform variance analysis.")]
    NoData { runs: u32 },
}

/// One variance analysis: the configuration shared by every run
#[derive(Debug, Clone, PartialEq)]
pub struct VarianceRequest {
    pub label_prefix: String,
    pub test_path: String,
    pub cflags: String,
    pub cxxflags: String,
    pub ldflags: String,
    pub target: Target,
    pub num_runs: u32,
    pub output_dir: PathBuf,
}

impl VarianceRequest {
    /// Label of the run with the given 1-based index
    pub fn run_label(&self, index: u32) -> String {
        format!("{}_run_{}", self.label_prefix, index)
    }
}

/// Drives repeated runs through a [`ProcessRunner`] and aggregates the results
pub struct VarianceAnalyzer<R> {
    runner: R,
    orchestrator: PathBuf,
    settings: VarianceSettings,
    entry_policy: EntryPolicy,
    config_path: Option<PathBuf>,
    cwd: PathBuf,
}

impl<R: ProcessRunner> VarianceAnalyzer<R> {
    pub fn new(runner: R, orchestrator: impl Into<PathBuf>, settings: VarianceSettings) -> Self {
        Self {
            runner,
            orchestrator: orchestrator.into(),
            settings,
            entry_policy: EntryPolicy::default(),
            config_path: None,
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    pub fn with_entry_policy(mut self, policy: EntryPolicy) -> Self {
        self.entry_policy = policy;
        self
    }

    /// Configuration file forwarded to every run
    pub fn with_config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    /// Working directory of the spawned runs
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }

    /// Run the benchmark `num_runs` times and analyze every metric.
    pub fn analyze(&self, request: &VarianceRequest) -> Result<VarianceReport, VarianceError> {
        validate_label(&request.label_prefix)?;
        if request.num_runs == 0 {
            return Err(VarianceError::InvalidRunCount);
        }
        // Runs and the aggregation below must agree on where result files live.
        let request = &VarianceRequest {
            output_dir: self.cwd.join(&request.output_dir),
            ..request.clone()
        };

        info!("--- Starting Variance Analysis ---");
        info!("Benchmark: {}", request.test_path);
        info!(
            "Config: target={}, cflags='{}', cxxflags='{}', ldflags='{}'",
            request.target, request.cflags, request.cxxflags, request.ldflags
        );
        info!("Number of runs: {}", request.num_runs);

        let mut runs = Vec::with_capacity(request.num_runs as usize);
        for index in 1..=request.num_runs {
            let label = request.run_label(index);
            info!("--- Starting Run {}/{}: {} ---", index, request.num_runs, label);

            let spec = self.run_command(request, &label);
            let output = self
                .runner
                .run(&spec)
                .map_err(|source| VarianceError::Launch { index, source })?;
            if !output.success() {
                return Err(VarianceError::RunFailed {
                    index,
                    label,
                    exit_code: output.exit_code,
                });
            }

            runs.push(RunRecord {
                index,
                results_file: results_file_for(&request.output_dir, &label),
                label,
                samples: 0,
                error: None,
            });
        }

        info!("--- Aggregating Results ---");
        let mut series = MetricSeries::new();
        for run in &mut runs {
            match parse_results(&run.results_file, self.entry_policy) {
                Ok(timings) => {
                    debug!(
                        "{} contributed {} sample(s)",
                        run.results_file.display(),
                        timings.len()
                    );
                    run.samples = timings.len();
                    series.record_run(timings);
                }
                Err(e) => {
                    warn!("{}", e);
                    run.error = Some(e.to_string());
                }
            }
        }

        if series.is_empty() {
            return Err(VarianceError::NoData {
                runs: request.num_runs,
            });
        }

        let metrics = series
            .iter()
            .map(|(name, times)| {
                let variance = analyze_metric(times, &self.settings);
                if variance.is_high_variance() {
                    warn!("High variance detected for {}", name);
                }
                MetricReport::new(name, times, &variance)
            })
            .collect();

        let config = ReportConfig {
            label_prefix: request.label_prefix.clone(),
            test_path: request.test_path.clone(),
            target: request.target.to_string(),
            cflags: request.cflags.clone(),
            cxxflags: request.cxxflags.clone(),
            ldflags: request.ldflags.clone(),
            num_runs: request.num_runs,
            cv_threshold: self.settings.cv_threshold,
        };

        Ok(VarianceReport::new(build_report_meta(), config, runs, metrics))
    }

    /// Command line invoking the single-run binary for one run.
    pub fn run_command(&self, request: &VarianceRequest, label: &str) -> CommandSpec {
        let mut spec = CommandSpec::new(self.orchestrator.display().to_string(), &self.cwd).args([
            format!("--label={}", label),
            format!("--cflags={}", request.cflags),
            format!("--cxxflags={}", request.cxxflags),
            format!("--ldflags={}", request.ldflags),
            format!("--target={}", request.target),
            format!("--test-path={}", request.test_path),
            format!("--output-dir={}", request.output_dir.display()),
        ]);
        if let Some(path) = &self.config_path {
            spec = spec.arg(format!("--config={}", path.display()));
        }
        spec
    }
}

/// `litbench-run` next to the current executable, else whatever `PATH` resolves.
pub fn default_orchestrator() -> PathBuf {
    std::env::current_exe()
        .ok()
        .map(|exe| exe.with_file_name(ORCHESTRATOR_BIN))
        .filter(|path| path.exists())
        .unwrap_or_else(|| PathBuf::from(ORCHESTRATOR_BIN))
}

#[cfg(test)]
mod tests {
    use super::*;
    use litbench_core::ProcessOutput;
    use std::cell::RefCell;
    use std::path::Path;

    /// Records every command and exits with a fixed code
    struct RecordingRunner {
        calls: RefCell<Vec<CommandSpec>>,
        exit_code: i32,
    }

    impl RecordingRunner {
        fn exiting(exit_code: i32) -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
                exit_code,
            }
        }
    }

    impl ProcessRunner for RecordingRunner {
        fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput, ProcessError> {
            self.calls.borrow_mut().push(spec.clone());
            Ok(ProcessOutput {
                exit_code: self.exit_code,
                output: String::new(),
            })
        }
    }

    fn request(output_dir: &Path) -> VarianceRequest {
        VarianceRequest {
            label_prefix: "blur".to_string(),
            test_path: "MicroBenchmarks/ImageProcessing/Blur".to_string(),
            cflags: "-O2".to_string(),
            cxxflags: "-O2 -march=native".to_string(),
            ldflags: String::new(),
            target: Target::Native,
            num_runs: 2,
            output_dir: output_dir.to_path_buf(),
        }
    }

    #[test]
    fn test_run_command_shape() {
        let runner = RecordingRunner::exiting(0);
        let analyzer = VarianceAnalyzer::new(&runner, "/opt/bin/litbench-run", VarianceSettings::default())
            .with_cwd("/work")
            .with_config_path(Some(PathBuf::from("/work/litbench.toml")));
        let spec = analyzer.run_command(&request(Path::new("/out")), "blur_run_3");

        assert_eq!(spec.program, "/opt/bin/litbench-run");
        assert_eq!(spec.cwd, PathBuf::from("/work"));
        assert_eq!(spec.flag_value("label"), Some("blur_run_3"));
        assert_eq!(spec.flag_value("cxxflags"), Some("-O2 -march=native"));
        assert_eq!(spec.flag_value("ldflags"), Some(""));
        assert_eq!(spec.flag_value("target"), Some("native"));
        assert_eq!(spec.flag_value("output-dir"), Some("/out"));
        assert_eq!(spec.flag_value("config"), Some("/work/litbench.toml"));
    }

    #[test]
    fn test_zero_runs_rejected_before_launch() {
        let runner = RecordingRunner::exiting(0);
        let analyzer = VarianceAnalyzer::new(&runner, ORCHESTRATOR_BIN, VarianceSettings::default());
        let mut req = request(Path::new("/out"));
        req.num_runs = 0;

        assert!(matches!(analyzer.analyze(&req), Err(VarianceError::InvalidRunCount)));
        assert!(runner.calls.borrow().is_empty());
    }

    #[test]
    fn test_invalid_prefix_rejected_before_launch() {
        let runner = RecordingRunner::exiting(0);
        let analyzer = VarianceAnalyzer::new(&runner, ORCHESTRATOR_BIN, VarianceSettings::default());
        let mut req = request(Path::new("/out"));
        req.label_prefix = "../escape".to_string();

        assert!(matches!(analyzer.analyze(&req), Err(VarianceError::Config(_))));
        assert!(runner.calls.borrow().is_empty());
    }

    #[test]
    fn test_first_failure_aborts_sequence() {
        let runner = RecordingRunner::exiting(1);
        let analyzer = VarianceAnalyzer::new(&runner, ORCHESTRATOR_BIN, VarianceSettings::default());
        let err = analyzer.analyze(&request(Path::new("/out"))).unwrap_err();

        match err {
            VarianceError::RunFailed { index, label, exit_code } => {
                assert_eq!(index, 1);
                assert_eq!(label, "blur_run_1");
                assert_eq!(exit_code, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(runner.calls.borrow().len(), 1);
    }

    #[test]
    fn test_missing_result_files_mean_no_data() {
        let dir = tempfile::tempdir().unwrap();
        let runner = RecordingRunner::exiting(0);
        let analyzer = VarianceAnalyzer::new(&runner, ORCHESTRATOR_BIN, VarianceSettings::default());
        let err = analyzer.analyze(&request(dir.path())).unwrap_err();

        assert!(matches!(err, VarianceError::NoData { runs: 2 }));
        assert_eq!(runner.calls.borrow().len(), 2);
    }

    #[test]
    fn test_relative_output_dir_follows_run_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let runner = RecordingRunner::exiting(0);
        let analyzer = VarianceAnalyzer::new(&runner, ORCHESTRATOR_BIN, VarianceSettings::default())
            .with_cwd(dir.path());

        let err = analyzer.analyze(&request(Path::new("out"))).unwrap_err();

        assert!(matches!(err, VarianceError::NoData { runs: 2 }));
        let expected = dir.path().join("out").display().to_string();
        for call in runner.calls.borrow().iter() {
            assert_eq!(call.flag_value("output-dir"), Some(expected.as_str()));
        }
    }

    #[test]
    fn test_default_orchestrator_name() {
        let path = default_orchestrator();
        assert_eq!(path.file_name().and_then(|n| n.to_str()), Some(ORCHESTRATOR_BIN));
    }
}
