//! Shared test utilities for the catalog updater.

use crate::exec::{CommandExecutor, ExecError, Invocation};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::process::{ExitStatus, Output};

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

    ExitStatus::from_raw(code as u32)
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

/// Represents an expected command invocation for testing.
#[derive(Debug)]
pub struct ExpectedCall {
    /// The program to execute (e.g. "minisign").
    pub program: String,
    /// The arguments to pass to the program.
    pub args: Vec<String>,
    /// The extra environment the caller must set.
    pub envs: Vec<(String, String)>,
    /// The result to return when this command is invoked.
    pub result: Result<Output, ExecError>,
}

impl ExpectedCall {
    /// Creates an expectation with no extra environment.
    #[must_use]
    pub fn new(program: &str, args: &[&str], result: Result<Output, ExecError>) -> Self {
        Self {
            program: program.to_owned(),
            args: args.iter().map(|arg| (*arg).to_owned()).collect(),
            envs: Vec::new(),
            result,
        }
    }

    /// Requires the invocation to carry the given extra environment.
    #[must_use]
    pub fn with_envs(mut self, envs: &[(&str, &str)]) -> Self {
        self.envs = envs
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect();
        self
    }
}

/// A stub implementation of `CommandExecutor` for testing.
///
/// Records expected command invocations and returns predefined results,
/// allowing tests to verify command execution without side effects.
#[derive(Debug)]
pub struct StubExecutor {
    expected: RefCell<VecDeque<ExpectedCall>>,
}

impl StubExecutor {
    /// Creates a new `StubExecutor` with the given expected calls.
    #[must_use]
    pub fn new(expected: Vec<ExpectedCall>) -> Self {
        Self {
            expected: RefCell::new(expected.into()),
        }
    }

    /// Asserts that all expected command invocations have been consumed.
    ///
    /// # Panics
    ///
    /// Panics if there are remaining expected calls that were not invoked.
    pub fn assert_finished(&self) {
        assert!(
            self.expected.borrow().is_empty(),
            "expected no further command invocations"
        );
    }
}

impl CommandExecutor for StubExecutor {
    fn run(&self, invocation: &Invocation<'_>) -> Result<Output, ExecError> {
        let mut expected = self.expected.borrow_mut();
        let call = expected
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected command invocation: {invocation:?}"));

        assert_eq!(call.program, invocation.program);
        assert_eq!(call.args, invocation.args);
        let envs: Vec<(&str, &str)> = call
            .envs
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
            .collect();
        assert_eq!(envs.as_slice(), invocation.envs);

        call.result
    }
}

/// Builds a manifest document in the published wire format.
#[must_use]
pub fn catalog_manifest_json(epoch: u64, snapshot_date: &str, latest: &str, ext: &str) -> String {
    serde_json::json!({
        "catalog": {
            "epoch": epoch,
            "snapshot_date": snapshot_date,
            "latest": latest,
            "signature_ext": ext,
            "min_client": "1.0",
        }
    })
    .to_string()
}
