//! Shared test utilities for the packager crate.

use crate::toolchain::CommandExecutor;
use camino::Utf8Path;
use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::process::{ExitStatus, Output};
use std::sync::{Mutex, PoisonError};

/// Creates an `ExitStatus` from an exit code (Unix implementation).
#[cfg(unix)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Creates an `ExitStatus` from an exit code (Windows implementation).
#[cfg(windows)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(code.unsigned_abs())
}

/// Creates a successful command `Output` with empty stdout and stderr.
#[must_use]
pub fn success_output() -> Output {
    Output {
        status: exit_status(0),
        stdout: Vec::new(),
        stderr: Vec::new(),
    }
}

/// Creates a failed command `Output` with the given stderr message.
#[must_use]
pub fn failure_output(stderr: &str) -> Output {
    Output {
        status: exit_status(1),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

type Effect = Box<dyn Fn(&Utf8Path) + Send + Sync>;

/// Represents an expected command invocation for testing.
pub struct ExpectedCall {
    /// The arguments the toolchain program is expected to receive.
    pub args: Vec<&'static str>,
    /// Side effect applied to the working directory before returning, used
    /// to emulate build output.
    pub effect: Option<Effect>,
    /// The result to return when this command is invoked.
    pub result: io::Result<Output>,
}

impl ExpectedCall {
    /// Expects `args` and returns `result`.
    #[must_use]
    pub fn new(args: &[&'static str], result: io::Result<Output>) -> Self {
        Self {
            args: args.to_vec(),
            effect: None,
            result,
        }
    }

    /// Expects a successful `install`.
    #[must_use]
    pub fn install() -> Self {
        Self::new(&["install"], Ok(success_output()))
    }

    /// Expects a successful `run build` that writes `files` into the
    /// working directory.
    #[must_use]
    pub fn build_writing(files: &[(&'static str, &'static str)]) -> Self {
        let files = files.to_vec();
        Self::new(&["run", "build"], Ok(success_output())).with_effect(move |dir| {
            for (relative, contents) in &files {
                h5pack_common::test_support::write_file(dir, relative, contents)
                    .expect("stub build output is written");
            }
        })
    }

    /// Attaches a side effect run against the working directory.
    #[must_use]
    pub fn with_effect(mut self, effect: impl Fn(&Utf8Path) + Send + Sync + 'static) -> Self {
        self.effect = Some(Box::new(effect));
        self
    }
}

impl fmt::Debug for ExpectedCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpectedCall")
            .field("args", &self.args)
            .field("effect", &self.effect.is_some())
            .field("result", &self.result)
            .finish()
    }
}

/// A stub implementation of `CommandExecutor` for testing.
///
/// Replays expected invocations in order and records how many were made,
/// allowing build-cache tests to run without a JavaScript toolchain.
#[derive(Debug, Default)]
pub struct StubExecutor {
    expected: Mutex<VecDeque<ExpectedCall>>,
}

impl StubExecutor {
    /// Creates a new `StubExecutor` with the given expected calls.
    #[must_use]
    pub fn new(expected: Vec<ExpectedCall>) -> Self {
        Self {
            expected: Mutex::new(expected.into()),
        }
    }

    /// Number of expected calls not yet made.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.expected
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Asserts that all expected command invocations have been consumed.
    ///
    /// # Panics
    ///
    /// Panics if there are remaining expected calls that were not invoked.
    pub fn assert_finished(&self) {
        assert_eq!(
            self.remaining(),
            0,
            "expected no further command invocations"
        );
    }
}

impl CommandExecutor for StubExecutor {
    fn run(&self, _program: &str, args: &[&str], working_dir: &Utf8Path) -> io::Result<Output> {
        let call = self
            .expected
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .expect("unexpected command invocation");

        assert_eq!(call.args.as_slice(), args);
        if let Some(effect) = &call.effect {
            effect(working_dir);
        }
        call.result
    }
}
