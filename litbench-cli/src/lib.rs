#![warn(missing_docs)]
//! litbench CLI Library
//!
//! Entry points for the two binaries:
//!
//! - `litbench-run` configures, builds and runs one labelled test-suite
//!   configuration ([`run_benchmark`]).
//! - `litbench-variance` repeats a configuration several times through
//!   `litbench-run` and reports how noisy every micro-benchmark is
//!   ([`validate_variance`]).
//!
//! Both discover `litbench.toml` (CLI flags override), log through `tracing`
//! to stderr and echo subprocess output to stdout (stderr while a JSON
//! report is headed for stdout).

mod config;
mod formatting;
mod metadata;
mod variance;

pub use config::*;
pub use formatting::format_human_output;
pub use metadata::build_report_meta;
pub use variance::*;

use anyhow::Context;
use clap::Parser;
use litbench_core::{
    Echo, Orchestrator, ProcessRunner, RunConfig, RunReport, SystemProcessRunner, Target,
};
use litbench_report::{OutputFormat, generate_json_report};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// `litbench-run` arguments
#[derive(Parser, Debug)]
#[command(name = "litbench-run")]
#[command(author, version, about = "Configure, build and run one LLVM test-suite configuration")]
pub struct RunCli {
    /// Unique label for this run; names the build directory and results file
    #[arg(long)]
    pub label: String,

    /// C compiler flags
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    pub cflags: String,

    /// C++ compiler flags
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    pub cxxflags: String,

    /// Linker flags
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    pub ldflags: String,

    /// Directory for the results file (defaults to litbench.toml, then /home/ubuntu/benchmark_results)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Target architecture: native or arm32
    #[arg(long, default_value = "arm32")]
    pub target: String,

    /// Test or directory to run, relative to the build directory
    #[arg(long, default_value = ".")]
    pub test_path: String,

    /// Explicit litbench.toml path
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// `litbench-variance` arguments
#[derive(Parser, Debug)]
#[command(name = "litbench-variance")]
#[command(author, version, about = "Measure run-to-run variance of LLVM test-suite micro-benchmarks")]
pub struct VarianceCli {
    /// Prefix for the labels of each run (`<prefix>_run_<n>`)
    #[arg(long)]
    pub label_prefix: String,

    /// Benchmark test path
    #[arg(long)]
    pub test_path: String,

    /// C compiler flags
    #[arg(long, default_value = "-O2", allow_hyphen_values = true)]
    pub cflags: String,

    /// C++ compiler flags
    #[arg(long, default_value = "-O2", allow_hyphen_values = true)]
    pub cxxflags: String,

    /// Linker flags
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    pub ldflags: String,

    /// Target architecture: native or arm32
    #[arg(long, default_value = "native")]
    pub target: String,

    /// Number of runs (defaults to litbench.toml, then 5)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub num_runs: Option<u32>,

    /// Directory for the per-run results files
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// CV percentage above which a metric is flagged
    #[arg(long)]
    pub cv_threshold: Option<f64>,

    /// Single-run binary to invoke for every run
    #[arg(long)]
    pub orchestrator: Option<PathBuf>,

    /// Output format: human or json
    #[arg(long)]
    pub format: Option<String>,

    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Explicit litbench.toml path
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        "litbench=debug"
    } else {
        "litbench=info"
    };
    // A second initialisation (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Run `litbench-run` with arguments from the command line.
pub fn run_benchmark() -> anyhow::Result<()> {
    let cli = RunCli::parse();
    init_logging(cli.verbose);

    let (config, _) = LitConfig::resolve(cli.config.as_deref())?;
    let report = execute_run(&cli, &config, SystemProcessRunner::new())?;

    println!();
    println!("Benchmark run '{}' complete.", report.label);
    println!("Build directory: {}", report.artifacts.build_dir.display());
    println!("Results file: {}", report.artifacts.results_file.display());
    if !report.tests_passed {
        warn!("Some tests failed; the results file may be incomplete");
    }
    Ok(())
}

/// Execute one run through `runner`.
///
/// The target is checked before anything touches the filesystem or launches
/// a process.
pub fn execute_run<R: ProcessRunner>(
    cli: &RunCli,
    config: &LitConfig,
    runner: R,
) -> anyhow::Result<RunReport> {
    let target: Target = cli.target.parse()?;
    let output_dir = cli
        .output_dir
        .clone()
        .unwrap_or_else(|| config.output.run_directory.clone());

    let run = RunConfig::new(&cli.label, target, output_dir)
        .with_flags(&cli.cflags, &cli.cxxflags, &cli.ldflags)
        .with_test_path(&cli.test_path);

    let orchestrator = Orchestrator::new(config.suite.clone(), runner);
    let report = orchestrator
        .execute(&run)
        .with_context(|| format!("Benchmark run '{}' failed", cli.label))?;
    Ok(report)
}

/// Run `litbench-variance` with arguments from the command line.
pub fn validate_variance() -> anyhow::Result<()> {
    let cli = VarianceCli::parse();
    init_logging(cli.verbose);

    let (config, config_path) = LitConfig::resolve(cli.config.as_deref())?;
    let format: OutputFormat = cli
        .format
        .as_deref()
        .unwrap_or(config.output.format.as_str())
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    let request = variance_request(&cli, &config)?;
    let orchestrator = cli
        .orchestrator
        .clone()
        .or_else(|| config.variance.orchestrator.clone())
        .unwrap_or_else(default_orchestrator);

    let analyzer = VarianceAnalyzer::new(
        SystemProcessRunner::with_echo(echo_for(format, cli.output.as_deref())),
        orchestrator,
        config.variance.settings(cli.cv_threshold),
    )
    .with_entry_policy(config.variance.entry_policy)
    .with_config_path(config_path);

    let report = analyzer.analyze(&request)?;
    info!(
        "{} metric(s) analyzed, {} with high variance",
        report.summary.analyzed, report.summary.high_variance
    );

    let output = match format {
        OutputFormat::Json => generate_json_report(&report)?,
        OutputFormat::Human => format_human_output(&report),
    };

    if let Some(path) = &cli.output {
        std::fs::write(path, &output)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        info!("Report written to {}", path.display());
    } else {
        print!("{}", output);
    }
    Ok(())
}

/// Where run output is echoed: stderr when a JSON report goes to stdout.
pub fn echo_for(format: OutputFormat, output: Option<&Path>) -> Echo {
    match (format, output) {
        (OutputFormat::Json, None) => Echo::Stderr,
        _ => Echo::Stdout,
    }
}

/// Merge CLI arguments over configuration defaults.
pub fn variance_request(cli: &VarianceCli, config: &LitConfig) -> anyhow::Result<VarianceRequest> {
    let target: Target = cli.target.parse()?;
    Ok(VarianceRequest {
        label_prefix: cli.label_prefix.clone(),
        test_path: cli.test_path.clone(),
        cflags: cli.cflags.clone(),
        cxxflags: cli.cxxflags.clone(),
        ldflags: cli.ldflags.clone(),
        target,
        num_runs: cli.num_runs.unwrap_or(config.variance.num_runs),
        output_dir: cli
            .output_dir
            .clone()
            .unwrap_or_else(|| config.output.variance_directory.clone()),
    })
}
