//! External JavaScript build toolchain invocation.
//!
//! Some vendored libraries ship sources plus a `package.json` build script
//! instead of pre-built assets. The build cache runs `<program> install`
//! followed by `<program> run build` in a scratch copy of such libraries.
//! Processes are spawned through [`CommandExecutor`] so tests can script the
//! outcome without a Node installation.

use camino::Utf8Path;
use log::{debug, warn};
use std::fmt;
use std::io::{self, Read};
use std::process::{Command, Output, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use wait_timeout::ChildExt;

/// Program used when no build program is configured.
pub const DEFAULT_BUILD_PROGRAM: &str = "npm";

/// Default limit for each toolchain step (10 minutes).
pub const DEFAULT_BUILD_TIMEOUT: Duration = Duration::from_secs(600);

/// Abstraction for running external commands.
#[cfg_attr(test, mockall::automock)]
pub trait CommandExecutor: Send + Sync {
    /// Runs `program` with `args` inside `working_dir` and returns the
    /// captured output.
    ///
    /// # Errors
    ///
    /// Returns any I/O error raised while spawning or waiting for the
    /// command, including [`io::ErrorKind::TimedOut`].
    fn run<'a>(&self, program: &str, args: &[&'a str], working_dir: &Utf8Path) -> io::Result<Output>;
}

/// Executes commands on the host system with a wall-clock limit.
///
/// # Examples
///
/// ```no_run
/// use camino::Utf8Path;
/// use h5pack_packager::{CommandExecutor, SystemCommandExecutor};
///
/// let executor = SystemCommandExecutor::default();
/// let output = executor.run("npm", &["--version"], Utf8Path::new("."))?;
/// assert!(output.status.success());
/// # Ok::<(), std::io::Error>(())
/// ```
#[derive(Debug, Clone, Copy)]
pub struct SystemCommandExecutor {
    timeout: Duration,
}

impl SystemCommandExecutor {
    /// Creates an executor that kills commands running longer than
    /// `timeout`.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for SystemCommandExecutor {
    fn default() -> Self {
        Self::with_timeout(DEFAULT_BUILD_TIMEOUT)
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buffer)?;
        }
        Ok(buffer)
    })
}

fn join_drain(handle: thread::JoinHandle<io::Result<Vec<u8>>>) -> io::Result<Vec<u8>> {
    handle
        .join()
        .map_err(|_| io::Error::other("output reader thread panicked"))?
}

impl CommandExecutor for SystemCommandExecutor {
    fn run(&self, program: &str, args: &[&str], working_dir: &Utf8Path) -> io::Result<Output> {
        let mut child = Command::new(program)
            .args(args)
            .current_dir(working_dir.as_std_path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Pipes are drained concurrently so a chatty install cannot block on
        // a full buffer while we wait for it to exit.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        if let Some(status) = child.wait_timeout(self.timeout)? {
            return Ok(Output {
                status,
                stdout: join_drain(stdout)?,
                stderr: join_drain(stderr)?,
            });
        }

        if let Err(err) = child.kill() {
            debug!("failed to kill {program}: {err}");
        }
        child.wait()?;
        Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("{program} timed out after {} seconds", self.timeout.as_secs()),
        ))
    }
}

/// Errors raised by a toolchain step.
#[derive(Debug, Error)]
pub enum ToolchainError {
    /// The program could not be spawned or did not finish in time.
    #[error("`{command}` could not run: {source}")]
    Io {
        /// Command line that was attempted.
        command: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The program exited unsuccessfully.
    #[error("`{command}` exited with {status}: {stderr}")]
    Failed {
        /// Command line that failed.
        command: String,
        /// Exit status description.
        status: String,
        /// Trimmed standard error output.
        stderr: String,
    },
}

/// Runs the install and build steps of a JavaScript library.
#[derive(Clone)]
pub struct BuildToolchain {
    program: String,
    executor: Arc<dyn CommandExecutor>,
}

impl fmt::Debug for BuildToolchain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildToolchain")
            .field("program", &self.program)
            .finish_non_exhaustive()
    }
}

impl BuildToolchain {
    /// Creates a toolchain running `program` through `executor`.
    #[must_use]
    pub fn new(program: impl Into<String>, executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            program: program.into(),
            executor,
        }
    }

    /// Creates a toolchain that spawns `program` on the host.
    #[must_use]
    pub fn system(program: impl Into<String>, timeout: Duration) -> Self {
        Self::new(
            program,
            Arc::new(SystemCommandExecutor::with_timeout(timeout)),
        )
    }

    /// Configured program, e.g. `npm`.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Runs `<program> install` then `<program> run build` in `workspace`.
    ///
    /// # Errors
    ///
    /// Returns the first step that could not run or exited unsuccessfully;
    /// the build step is skipped when install fails.
    pub fn install_and_build(&self, workspace: &Utf8Path) -> Result<(), ToolchainError> {
        self.step(&["install"], workspace)?;
        self.step(&["run", "build"], workspace)
    }

    fn step(&self, args: &[&str], workspace: &Utf8Path) -> Result<(), ToolchainError> {
        let command = format!("{} {}", self.program, args.join(" "));
        debug!("running `{command}` in {workspace}");
        let output = self
            .executor
            .run(&self.program, args, workspace)
            .map_err(|source| ToolchainError::Io {
                command: command.clone(),
                source,
            })?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
        warn!("`{command}` failed in {workspace}");
        Err(ToolchainError::Failed {
            command,
            status: output.status.to_string(),
            stderr,
        })
    }
}
