#![warn(missing_docs)]
//! litbench Core
//!
//! Building blocks for running the LLVM test-suite under a given set of
//! compiler flags:
//! - [`ProcessRunner`]: launch an external tool, stream its merged output, collect the exit code
//! - [`Orchestrator`]: the configure → build → test pipeline for one labelled run
//! - [`parse_results`]: pull micro-benchmark timings out of a lit result file

mod config;
mod pipeline;
mod process;
mod results;

pub use config::{
    ConfigError, RunConfig, SuiteConfig, Target, results_file_for, validate_label,
};
pub use pipeline::{
    BuildArtifacts, Orchestrator, OrchestratorError, RunReport, RunState, Stage, StageFailure,
    StageOutcome,
};
pub use process::{
    CommandSpec, Echo, ProcessError, ProcessOutput, ProcessRunner, SystemProcessRunner,
};
pub use results::{
    EntryPolicy, LitMetrics, LitResults, LitTest, MICRO_BENCHMARK_COUNT_KEY, MetricSample,
    ResultsError, parse_results, parse_results_str,
};

/// Concurrency passed to lit for the test stage; one keeps timings free of contention.
pub const TEST_JOBS: u32 = 1;

/// Metric key prefix used by the test-suite for per-micro-benchmark timings.
pub const EXEC_TIME_PREFIX: &str = "exec_time.";

/// Scalar execution-time metric reported by tests without micro-benchmarks.
pub const EXEC_TIME_KEY: &str = "exec_time";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(TEST_JOBS, 1);
        assert!(EXEC_TIME_PREFIX.starts_with(EXEC_TIME_KEY));
        assert!(EXEC_TIME_PREFIX.ends_with('.'));
    }
}
