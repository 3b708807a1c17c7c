//! Build Orchestration
//!
//! Drives one labelled run of the test-suite through three stages:
//!
//! ```text
//! ┌───────────┐  exit 0   ┌──────────┐  exit 0   ┌──────────┐  any exit  ┌──────┐
//! │ Configure │ ────────▶ │  Build   │ ────────▶ │   Test   │ ─────────▶ │ Done │
//! └─────┬─────┘           └────┬─────┘           └──────────┘            └──────┘
//!       │ exit ≠ 0             │ exit ≠ 0
//!       ▼                      ▼
//!   Failed(configure)      Failed(build)
//! ```
//!
//! Configure and build failures end the run. A failing test stage still
//! counts as a completed run because lit writes whatever results it gathered.

use crate::config::{ConfigError, RunConfig, SuiteConfig, Target, validate_label};
use crate::process::{CommandSpec, ProcessError, ProcessRunner};
use crate::TEST_JOBS;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to prepare {path}: {source}")]
    Prepare {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{stage} stage could not be launched: {source}")]
    Launch {
        stage: Stage,
        #[source]
        source: ProcessError,
    },

    #[error("{0}")]
    StageFailed(StageFailure),
}

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Configure,
    Build,
    Test,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Configure => "configure",
            Stage::Build => "build",
            Stage::Test => "test",
        }
    }

    /// Whether a non-zero exit at this stage ends the run
    pub fn is_fatal_on_failure(self) -> bool {
        !matches!(self, Stage::Test)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What one stage did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageOutcome {
    pub stage: Stage,
    pub exit_code: i32,
    /// Merged stdout+stderr of the stage
    pub output: String,
}

impl StageOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Fatal stage exit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFailure {
    pub stage: Stage,
    pub exit_code: i32,
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.stage {
            Stage::Configure => write!(f, "CMake configuration failed (exit code {})", self.exit_code),
            Stage::Build => write!(f, "Build failed (exit code {})", self.exit_code),
            Stage::Test => write!(f, "lit run failed (exit code {})", self.exit_code),
        }
    }
}

/// Where a run is in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Configuring,
    Building,
    Testing,
    Done { tests_passed: bool },
    Failed(StageFailure),
}

impl RunState {
    /// Stage to execute in this state; `None` once the run is finished.
    pub fn stage(self) -> Option<Stage> {
        match self {
            RunState::Configuring => Some(Stage::Configure),
            RunState::Building => Some(Stage::Build),
            RunState::Testing => Some(Stage::Test),
            RunState::Done { .. } | RunState::Failed(_) => None,
        }
    }

    /// Transition on the exit code of the current stage. Terminal states stay put.
    pub fn advance(self, exit_code: i32) -> RunState {
        let ok = exit_code == 0;
        match self {
            RunState::Configuring if ok => RunState::Building,
            RunState::Building if ok => RunState::Testing,
            RunState::Configuring | RunState::Building => RunState::Failed(StageFailure {
                stage: self.stage().unwrap_or(Stage::Configure),
                exit_code,
            }),
            RunState::Testing => RunState::Done { tests_passed: ok },
            terminal => terminal,
        }
    }

}

/// Filesystem products of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildArtifacts {
    /// Recreated empty at the start of every run with this label
    pub build_dir: PathBuf,
    /// Written by lit; absent or partial if the test stage failed
    pub results_file: PathBuf,
}

/// Completed run: configure and build succeeded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub label: String,
    pub artifacts: BuildArtifacts,
    pub stages: Vec<StageOutcome>,
    pub tests_passed: bool,
}

/// Runs the configure → build → test pipeline through a [`ProcessRunner`]
pub struct Orchestrator<R> {
    suite: SuiteConfig,
    runner: R,
}

impl<R: ProcessRunner> Orchestrator<R> {
    pub fn new(suite: SuiteConfig, runner: R) -> Self {
        Self { suite, runner }
    }

    /// Execute one run.
    ///
    /// Returns the artifacts and every stage outcome when configure and build
    /// succeed, regardless of how the test stage exits. Relative paths are
    /// resolved against the current directory first, since every stage runs
    /// inside the build directory.
    pub fn execute(&self, config: &RunConfig) -> Result<RunReport, OrchestratorError> {
        validate_label(&config.label)?;

        let resolved = Orchestrator {
            suite: SuiteConfig {
                source_dir: absolute(&self.suite.source_dir)?,
                build_root: absolute(&self.suite.build_root)?,
                toolchain_file: absolute(&self.suite.toolchain_file)?,
                ..self.suite.clone()
            },
            runner: &self.runner,
        };
        let config = RunConfig {
            output_dir: absolute(&config.output_dir)?,
            ..config.clone()
        };
        resolved.run_stages(&config)
    }

    fn run_stages(&self, config: &RunConfig) -> Result<RunReport, OrchestratorError> {
        let artifacts = BuildArtifacts {
            build_dir: self.suite.build_dir_for(&config.label),
            results_file: config.results_file(),
        };
        self.prepare_directories(&artifacts, &config.output_dir)?;

        let mut state = RunState::Configuring;
        let mut stages = Vec::with_capacity(3);

        while let Some(stage) = state.stage() {
            let spec = self.stage_command(stage, config, &artifacts);
            let output = self
                .runner
                .run(&spec)
                .map_err(|source| OrchestratorError::Launch { stage, source })?;

            if !output.success() {
                if stage.is_fatal_on_failure() {
                    warn!("{} stage exited with code {}", stage, output.exit_code);
                } else {
                    warn!(
                        "lit run failed with exit code {}; {} may hold partial results",
                        output.exit_code,
                        artifacts.results_file.display()
                    );
                }
            }

            state = state.advance(output.exit_code);
            stages.push(StageOutcome {
                stage,
                exit_code: output.exit_code,
                output: output.output,
            });
        }

        match state {
            RunState::Failed(failure) => Err(OrchestratorError::StageFailed(failure)),
            RunState::Done { tests_passed } => {
                info!(
                    "Run '{}' finished; results in {}",
                    config.label,
                    artifacts.results_file.display()
                );
                Ok(RunReport {
                    label: config.label.clone(),
                    artifacts,
                    stages,
                    tests_passed,
                })
            }
            // the loop only exits in a terminal state
            RunState::Configuring | RunState::Building | RunState::Testing => {
                unreachable!("pipeline stopped in non-terminal state {:?}", state)
            }
        }
    }

    /// Wipe and recreate the build directory, make sure the output directory exists.
    fn prepare_directories(
        &self,
        artifacts: &BuildArtifacts,
        output_dir: &Path,
    ) -> Result<(), OrchestratorError> {
        let build_dir = &artifacts.build_dir;
        if build_dir.exists() {
            info!(
                "Build directory {} already exists. Removing.",
                build_dir.display()
            );
            std::fs::remove_dir_all(build_dir).map_err(|source| OrchestratorError::Prepare {
                path: build_dir.clone(),
                source,
            })?;
        }
        std::fs::create_dir_all(build_dir).map_err(|source| OrchestratorError::Prepare {
            path: build_dir.clone(),
            source,
        })?;

        std::fs::create_dir_all(output_dir).map_err(|source| OrchestratorError::Prepare {
            path: output_dir.to_path_buf(),
            source,
        })?;
        debug!(
            "Prepared {} and {}",
            build_dir.display(),
            output_dir.display()
        );
        Ok(())
    }

    /// Command line for a stage, run inside the build directory.
    pub fn stage_command(
        &self,
        stage: Stage,
        config: &RunConfig,
        artifacts: &BuildArtifacts,
    ) -> CommandSpec {
        let spec = match stage {
            Stage::Configure => CommandSpec::new(&self.suite.cmake, &artifacts.build_dir)
                .args(self.configure_args(config)),
            Stage::Build => CommandSpec::new(&self.suite.build_tool, &artifacts.build_dir),
            Stage::Test => CommandSpec::new(&self.suite.lit, &artifacts.build_dir).args([
                "-v".to_string(),
                "-j".to_string(),
                TEST_JOBS.to_string(),
                "-o".to_string(),
                artifacts.results_file.display().to_string(),
                config.test_path.clone(),
            ]),
        };
        spec.envs(self.suite.env.iter().map(|(k, v)| (k.clone(), v.clone())))
    }

    /// CMake arguments: flags, benchmarking-mode switches, target options, source dir.
    pub fn configure_args(&self, config: &RunConfig) -> Vec<String> {
        let mut args = vec![
            "-G".to_string(),
            self.suite.generator.clone(),
            format!("-DCMAKE_C_FLAGS={}", config.cflags),
            format!("-DCMAKE_CXX_FLAGS={}", config.cxxflags),
            format!("-DCMAKE_EXE_LINKER_FLAGS={}", config.ldflags),
            "-DTEST_SUITE_BENCHMARKING_ONLY=ON".to_string(),
            "-DTEST_SUITE_COLLECT_STATS=ON".to_string(),
            "-DTEST_SUITE_COLLECT_CODE_SIZE=OFF".to_string(),
        ];

        match config.target {
            Target::Arm32 => {
                args.push(format!(
                    "-DCMAKE_TOOLCHAIN_FILE={}",
                    self.suite.toolchain_file.display()
                ));
                args.push(format!("-DTEST_SUITE_RUN_UNDER={}", self.suite.run_under));
            }
            Target::Native => {
                args.push(format!("-DCMAKE_C_COMPILER={}", self.suite.native_cc));
                args.push(format!("-DCMAKE_CXX_COMPILER={}", self.suite.native_cxx));
            }
        }

        args.push(self.suite.source_dir.display().to_string());
        args
    }
}

fn absolute(path: &Path) -> Result<PathBuf, OrchestratorError> {
    std::path::absolute(path).map_err(|source| OrchestratorError::Prepare {
        path: path.to_path_buf(),
        source,
    })
}
