//! External process execution.
//!
//! Both the trust verifier and the activation bridge talk to collaborators
//! that live outside this process. They do so through [`CommandExecutor`] so
//! that tests can script the collaborator's exit status without a real
//! `minisign` or `quietpatch` installed.

use std::io::{self, Read};
use std::process::{Command, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use wait_timeout::ChildExt;

/// A single external command invocation.
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    /// Program to run, resolved through `PATH`.
    pub program: &'a str,
    /// Positional arguments.
    pub args: &'a [&'a str],
    /// Extra environment variables layered over the inherited environment.
    pub envs: &'a [(&'a str, &'a str)],
}

impl<'a> Invocation<'a> {
    /// Creates an invocation with no extra environment.
    #[must_use]
    pub const fn new(program: &'a str, args: &'a [&'a str]) -> Self {
        Self {
            program,
            args,
            envs: &[],
        }
    }

    /// Sets the extra environment for this invocation.
    #[must_use]
    pub const fn with_envs(mut self, envs: &'a [(&'a str, &'a str)]) -> Self {
        self.envs = envs;
        self
    }
}

/// Errors raised while running an external command.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    /// The program could not be started or its output could not be read.
    #[error("could not run {program}: {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The program did not exit within the configured timeout.
    #[error("{program} did not finish within {} seconds", timeout.as_secs())]
    TimedOut {
        /// Program that was killed.
        program: String,
        /// Timeout that elapsed.
        timeout: Duration,
    },
}

/// Abstraction for running external commands.
pub trait CommandExecutor {
    /// Runs a command and returns its captured output.
    ///
    /// A non-zero exit status is not an error at this level; callers decide
    /// what an exit status means.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError`] if the command cannot be started or times out.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use quietpatch_catalog::exec::{CommandExecutor, Invocation, SystemCommandExecutor};
    ///
    /// let executor = SystemCommandExecutor::default();
    /// let output = executor.run(&Invocation::new("minisign", &["-v"]))?;
    /// assert!(output.status.success());
    /// # Ok::<(), quietpatch_catalog::exec::ExecError>(())
    /// ```
    fn run(&self, invocation: &Invocation<'_>) -> Result<Output, ExecError>;
}

/// Executes commands on the host system.
///
/// Without a timeout the call blocks until the child exits.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandExecutor {
    timeout: Option<Duration>,
}

impl SystemCommandExecutor {
    /// Creates an executor that kills children running longer than `timeout`.
    #[must_use]
    pub const fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

impl CommandExecutor for SystemCommandExecutor {
    fn run(&self, invocation: &Invocation<'_>) -> Result<Output, ExecError> {
        let spawn_error = |source| ExecError::Spawn {
            program: invocation.program.to_owned(),
            source,
        };

        let mut cmd = Command::new(invocation.program);
        cmd.args(invocation.args)
            .envs(invocation.envs.iter().copied())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let Some(timeout) = self.timeout else {
            return cmd.output().map_err(spawn_error);
        };

        let mut child = cmd.spawn().map_err(spawn_error)?;
        // Drain both pipes while waiting so a chatty child cannot stall on a
        // full pipe buffer.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());
        match child.wait_timeout(timeout).map_err(spawn_error)? {
            Some(status) => Ok(Output {
                status,
                stdout: collect(stdout).map_err(spawn_error)?,
                stderr: collect(stderr).map_err(spawn_error)?,
            }),
            None => {
                if child.kill().is_err() {
                    log::warn!("failed to kill {} after timeout", invocation.program);
                }
                if child.wait().is_err() {
                    log::warn!("failed to reap {} after timeout", invocation.program);
                }
                Err(ExecError::TimedOut {
                    program: invocation.program.to_owned(),
                    timeout,
                })
            }
        }
    }
}

type PipeReader = JoinHandle<io::Result<Vec<u8>>>;

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<PipeReader> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            pipe.read_to_end(&mut buf)?;
            Ok(buf)
        })
    })
}

fn collect(reader: Option<PipeReader>) -> io::Result<Vec<u8>> {
    match reader {
        Some(handle) => handle
            .join()
            .map_err(|_| io::Error::other("output reader panicked"))?,
        None => Ok(Vec::new()),
    }
}

/// Returns the trimmed stderr of a command, falling back to stdout.
pub(crate) fn diagnostic_text(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let trimmed = stderr.trim();
    if !trimmed.is_empty() {
        return trimmed.to_owned();
    }
    String::from_utf8_lossy(&output.stdout).trim().to_owned()
}
