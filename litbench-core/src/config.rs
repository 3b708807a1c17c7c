//! Run and suite configuration
//!
//! A [`RunConfig`] describes one labelled build+test cycle. A [`SuiteConfig`]
//! describes where the test-suite lives and which external tools drive it; it
//! is loaded once (usually from `litbench.toml`) and handed to the
//! [`Orchestrator`](crate::Orchestrator) at construction.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors detected before any external process is launched
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Target string is neither `native` nor `arm32`
    #[error("Unknown target '{0}' (expected 'native' or 'arm32')")]
    UnknownTarget(String),

    /// Label cannot be used as a directory/file name component
    #[error("Invalid label '{0}': use only letters, digits, '.', '_' and '-'")]
    InvalidLabel(String),
}

/// Architecture the suite is compiled for and executed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    /// Host architecture, host compilers
    Native,
    /// Cross-compiled 32-bit ARM, executed under an emulator
    Arm32,
}

impl Target {
    /// Name used on the command line and in reports
    pub fn as_str(self) -> &'static str {
        match self {
            Target::Native => "native",
            Target::Arm32 => "arm32",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Target {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "native" => Ok(Target::Native),
            "arm32" => Ok(Target::Arm32),
            other => Err(ConfigError::UnknownTarget(other.to_string())),
        }
    }
}

/// One labelled build+test cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Unique run identifier; names the build directory and result file
    pub label: String,
    /// C compiler flags
    pub cflags: String,
    /// C++ compiler flags
    pub cxxflags: String,
    /// Linker flags
    pub ldflags: String,
    /// Target architecture
    pub target: Target,
    /// lit test selector, relative to the build directory
    pub test_path: String,
    /// Directory receiving the result file (shared across runs)
    pub output_dir: PathBuf,
}

impl RunConfig {
    /// Create a run with empty flags that runs every test.
    pub fn new(label: impl Into<String>, target: Target, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            label: label.into(),
            cflags: String::new(),
            cxxflags: String::new(),
            ldflags: String::new(),
            target,
            test_path: default_test_path(),
            output_dir: output_dir.into(),
        }
    }

    /// Set C, C++ and linker flags.
    pub fn with_flags(
        mut self,
        cflags: impl Into<String>,
        cxxflags: impl Into<String>,
        ldflags: impl Into<String>,
    ) -> Self {
        self.cflags = cflags.into();
        self.cxxflags = cxxflags.into();
        self.ldflags = ldflags.into();
        self
    }

    /// Restrict the test stage to one lit selector.
    pub fn with_test_path(mut self, test_path: impl Into<String>) -> Self {
        self.test_path = test_path.into();
        self
    }

    /// Result file this run writes.
    pub fn results_file(&self) -> PathBuf {
        results_file_for(&self.output_dir, &self.label)
    }
}

/// Result file path for a label inside an output directory.
pub fn results_file_for(output_dir: &Path, label: &str) -> PathBuf {
    output_dir.join(format!("results_{}.json", label))
}

/// Reject labels that are empty or not safe as a single path component.
pub fn validate_label(label: &str) -> Result<(), ConfigError> {
    static LABEL_RE: OnceLock<Regex> = OnceLock::new();
    let re = LABEL_RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_.-]+$").expect("label pattern is a valid regex")
    });

    if re.is_match(label) && label != "." && label != ".." {
        Ok(())
    } else {
        Err(ConfigError::InvalidLabel(label.to_string()))
    }
}

/// Location of the test-suite and the external tools that drive it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteConfig {
    /// LLVM test-suite checkout passed to the configure step
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,
    /// Parent of the per-label `build_<label>` directories
    #[serde(default = "default_build_root")]
    pub build_root: PathBuf,
    /// CMake generator name
    #[serde(default = "default_generator")]
    pub generator: String,
    /// Build-configuration program
    #[serde(default = "default_cmake")]
    pub cmake: String,
    /// Build driver, run without arguments
    #[serde(default = "default_build_tool")]
    pub build_tool: String,
    /// Test harness
    #[serde(default = "default_lit")]
    pub lit: String,
    /// CMake toolchain file for arm32 cross-compilation
    #[serde(default = "default_toolchain_file")]
    pub toolchain_file: PathBuf,
    /// Emulator command prefix used to execute arm32 binaries
    #[serde(default = "default_run_under")]
    pub run_under: String,
    /// C compiler for native builds
    #[serde(default = "default_native_cc")]
    pub native_cc: String,
    /// C++ compiler for native builds
    #[serde(default = "default_native_cxx")]
    pub native_cxx: String,
    /// Extra environment applied to every stage
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            build_root: default_build_root(),
            generator: default_generator(),
            cmake: default_cmake(),
            build_tool: default_build_tool(),
            lit: default_lit(),
            toolchain_file: default_toolchain_file(),
            run_under: default_run_under(),
            native_cc: default_native_cc(),
            native_cxx: default_native_cxx(),
            env: BTreeMap::new(),
        }
    }
}

impl SuiteConfig {
    /// Build directory owned by a label.
    pub fn build_dir_for(&self, label: &str) -> PathBuf {
        self.build_root.join(format!("build_{}", label))
    }
}

pub(crate) fn default_test_path() -> String {
    ".".to_string()
}
fn default_source_dir() -> PathBuf {
    PathBuf::from("/home/ubuntu/llvm-test-suite")
}
fn default_build_root() -> PathBuf {
    PathBuf::from("/home/ubuntu")
}
fn default_generator() -> String {
    "Ninja".to_string()
}
fn default_cmake() -> String {
    "cmake".to_string()
}
fn default_build_tool() -> String {
    "ninja".to_string()
}
fn default_lit() -> String {
    "lit".to_string()
}
fn default_toolchain_file() -> PathBuf {
    PathBuf::from("/home/ubuntu/arm32_toolchain.cmake")
}
fn default_run_under() -> String {
    "qemu-arm -L /usr/arm-linux-gnueabihf".to_string()
}
fn default_native_cc() -> String {
    "clang".to_string()
}
fn default_native_cxx() -> String {
    "clang++".to_string()
}
