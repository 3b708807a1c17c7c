//! External Process Execution
//!
//! Launches a tool with stdout and stderr merged into a single pipe, echoes
//! every line to the console as it arrives and hands back the exit code plus
//! everything that was printed. A non-zero exit is a normal return value;
//! only failing to launch the program at all is an error.

use std::ffi::OsString;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::os::unix::io::{FromRawFd, RawFd};
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Failed to create output pipe: {0}")]
    Pipe(#[source] std::io::Error),

    #[error("Failed to spawn '{program}' in {cwd}: {source}")]
    Spawn {
        program: String,
        cwd: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed while reading output of '{program}': {source}")]
    Read {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed waiting for '{program}': {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// A command line plus the directory and extra environment it runs with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    /// Added on top of the inherited environment
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Program and arguments joined for display.
    pub fn display_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Value of `--<name>=<value>` among the arguments, if present.
    pub fn flag_value(&self, name: &str) -> Option<&str> {
        let prefix = format!("--{}=", name);
        self.args.iter().find_map(|a| a.strip_prefix(prefix.as_str()))
    }
}

/// Exit code and merged stdout+stderr of a finished process
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessOutput {
    /// Process exit code; a signal-terminated process reports the negated signal number
    pub exit_code: i32,
    pub output: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Something that can run a [`CommandSpec`] to completion.
///
/// The orchestrator and the variance analyzer only talk to this trait, so
/// tests can substitute a scripted runner for real process execution.
pub trait ProcessRunner {
    fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput, ProcessError>;
}

impl<R: ProcessRunner + ?Sized> ProcessRunner for &R {
    fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput, ProcessError> {
        (**self).run(spec)
    }
}

/// Where a child's merged output is echoed while it runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Echo {
    Stdout,
    /// Keeps stdout free for a report printed afterwards
    Stderr,
    Off,
}

/// Runs commands as real child processes
#[derive(Debug, Clone)]
pub struct SystemProcessRunner {
    echo: Echo,
}

impl Default for SystemProcessRunner {
    fn default() -> Self {
        Self { echo: Echo::Stdout }
    }
}

impl SystemProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_echo(echo: Echo) -> Self {
        Self { echo }
    }

    /// Capture output without echoing it.
    pub fn quiet() -> Self {
        Self::with_echo(Echo::Off)
    }
}

impl ProcessRunner for SystemProcessRunner {
    fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput, ProcessError> {
        info!("[RUNNING] CWD: {}", spec.cwd.display());
        info!("{}", spec.display_line());

        let (read_fd, write_fd) = create_pipe().map_err(ProcessError::Pipe)?;
        let reader_file = unsafe { File::from_raw_fd(read_fd) };
        let stdout_file = unsafe { File::from_raw_fd(write_fd) };
        let stderr_file = stdout_file.try_clone().map_err(ProcessError::Pipe)?;

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .current_dir(&spec.cwd)
            .envs(
                spec.env
                    .iter()
                    .map(|(k, v)| (OsString::from(k), OsString::from(v))),
            )
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout_file))
            .stderr(Stdio::from(stderr_file));

        let spawned = command.spawn();
        // The Command still owns the parent's copies of the write end; they
        // must be closed or the reader never sees end-of-stream.
        drop(command);
        let mut child = spawned.map_err(|source| ProcessError::Spawn {
            program: spec.program.clone(),
            cwd: spec.cwd.clone(),
            source,
        })?;

        let streamed = match self.echo {
            Echo::Stdout => stream_lines(reader_file, Some(std::io::stdout())),
            Echo::Stderr => stream_lines(reader_file, Some(std::io::stderr())),
            Echo::Off => stream_lines(reader_file, None::<std::io::Sink>),
        };
        let output = match streamed {
            Ok(output) => output,
            Err(source) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ProcessError::Read {
                    program: spec.program.clone(),
                    source,
                });
            }
        };

        let status = child.wait().map_err(|source| ProcessError::Wait {
            program: spec.program.clone(),
            source,
        })?;
        let exit_code = status
            .code()
            .or_else(|| status.signal().map(|sig| -sig))
            .unwrap_or(-1);

        info!(
            "[FINISHED] {} with exit code {}",
            spec.display_line(),
            exit_code
        );

        Ok(ProcessOutput { exit_code, output })
    }
}

/// Read the merged stream to EOF, echoing line by line.
///
/// Echo is best effort: once a write to `echo` fails (a closed pipe on the
/// console, say) echoing stops but capture continues.
fn stream_lines<W: Write>(file: File, mut echo: Option<W>) -> std::io::Result<String> {
    let mut reader = BufReader::new(file);
    let mut collected = String::new();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        if let Some(out) = echo.as_mut() {
            let written = writeln!(out, "{}", line.trim_end_matches(['\r', '\n']))
                .and_then(|()| out.flush());
            if written.is_err() {
                echo = None;
            }
        }
        collected.push_str(&line);
    }

    Ok(collected)
}

/// Create a pipe pair with close-on-exec set on both ends, returning (read_fd, write_fd).
fn create_pipe() -> Result<(RawFd, RawFd), std::io::Error> {
    let mut fds = [0 as RawFd; 2];
    let ret = unsafe { libc::pipe(fds.as_mut_ptr()) };
    if ret != 0 {
        return Err(std::io::Error::last_os_error());
    }
    // Stdio::from dups the write end onto fd 1/2 in the child, so only the
    // originals need close-on-exec to keep them out of grandchildren.
    for &fd in &fds {
        unsafe {
            let flags = libc::fcntl(fd, libc::F_GETFD);
            libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC);
        }
    }
    Ok((fds[0], fds[1]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn shell(script: &str, cwd: &Path) -> CommandSpec {
        CommandSpec::new("sh", cwd).args(["-c", script])
    }

    #[test]
    fn test_merges_stdout_and_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let spec = shell("echo out-line; echo err-line 1>&2; echo last", dir.path());

        let result = SystemProcessRunner::quiet().run(&spec).unwrap();

        assert!(result.success());
        assert_eq!(result.output, "out-line\nerr-line\nlast\n");
    }

    #[test]
    fn test_nonzero_exit_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let spec = shell("echo partial; exit 3", dir.path());

        let result = SystemProcessRunner::quiet().run(&spec).unwrap();

        assert_eq!(result.exit_code, 3);
        assert_eq!(result.output, "partial\n");
    }

    #[test]
    fn test_cwd_and_env_are_applied() {
        let dir = tempfile::tempdir().unwrap();
        let spec = shell("pwd; echo \"$LITBENCH_MARKER\"", dir.path())
            .envs([("LITBENCH_MARKER", "marker-value")]);

        let result = SystemProcessRunner::quiet().run(&spec).unwrap();
        let lines: Vec<&str> = result.output.lines().collect();

        let expected = dir.path().canonicalize().unwrap();
        assert_eq!(Path::new(lines[0]).canonicalize().unwrap(), expected);
        assert_eq!(lines[1], "marker-value");
    }

    #[test]
    fn test_output_without_trailing_newline() {
        let dir = tempfile::tempdir().unwrap();
        let spec = shell("printf 'no newline'", dir.path());

        let result = SystemProcessRunner::quiet().run(&spec).unwrap();
        assert_eq!(result.output, "no newline");
    }

    #[test]
    fn test_signal_exit_code_is_negative() {
        let dir = tempfile::tempdir().unwrap();
        let spec = shell("kill -TERM $$", dir.path());

        let result = SystemProcessRunner::quiet().run(&spec).unwrap();
        assert_eq!(result.exit_code, -libc::SIGTERM);
    }

    #[test]
    fn test_missing_program_fails_to_spawn() {
        let dir = tempfile::tempdir().unwrap();
        let spec = CommandSpec::new("litbench-definitely-not-installed", dir.path());

        let err = SystemProcessRunner::quiet().run(&spec).unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));
    }

    /// Rejects every write, like stdout after the reading end of a pipe closed
    struct ClosedConsole;

    impl Write for ClosedConsole {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_failed_echo_keeps_capturing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stream");
        std::fs::write(&path, "first\nsecond\nthird").unwrap();

        let output = stream_lines(File::open(&path).unwrap(), Some(ClosedConsole)).unwrap();
        assert_eq!(output, "first\nsecond\nthird");
    }

    #[test]
    fn test_echo_lines_without_line_endings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stream");
        std::fs::write(&path, "a\r\nb  \n").unwrap();

        let mut echoed = Vec::new();
        let output = stream_lines(File::open(&path).unwrap(), Some(&mut echoed)).unwrap();
        assert_eq!(output, "a\r\nb  \n");
        assert_eq!(String::from_utf8(echoed).unwrap(), "a\nb  \n");
    }

    #[test]
    fn test_stderr_echo_still_captures() {
        let dir = tempfile::tempdir().unwrap();
        let spec = shell("echo to-console", dir.path());

        let result = SystemProcessRunner::with_echo(Echo::Stderr).run(&spec).unwrap();
        assert_eq!(result.output, "to-console\n");
    }

    #[test]
    fn test_spec_helpers() {
        let spec = CommandSpec::new("tool", "/tmp").args(["--label=abc", "-v"]);
        assert_eq!(spec.display_line(), "tool --label=abc -v");
        assert_eq!(spec.flag_value("label"), Some("abc"));
        assert_eq!(spec.flag_value("target"), None);
    }
}
