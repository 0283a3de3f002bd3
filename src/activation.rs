//! Hand-off to the downstream activation component.
//!
//! Extraction and installation of a verified archive belong to the
//! `quietpatch` application, not to this crate. The bridge runs
//! `quietpatch db apply <archive> <signature>` with `QP_OFFLINE=1` so the
//! component does not reach for the network again, and treats any non-zero
//! exit as fatal without interpreting its output.

use crate::exec::{CommandExecutor, ExecError, Invocation, diagnostic_text};
use camino::Utf8Path;

/// Default activation program.
pub const DEFAULT_ACTIVATOR: &str = "quietpatch";

/// Environment variable that tells the activation component to stay offline.
pub const OFFLINE_ENV: &str = "QP_OFFLINE";

const APPLY_SUBCOMMAND: [&str; 2] = ["db", "apply"];

/// Reasons activation did not succeed.
#[derive(Debug, thiserror::Error)]
pub enum ActivationError {
    /// The component ran and exited unsuccessfully.
    #[error("{program} exited with {status}: {message}")]
    Failed {
        /// Program that was run.
        program: String,
        /// Rendered exit status.
        status: String,
        /// Component diagnostic, if any.
        message: String,
    },

    /// The component could not be run to completion.
    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// Activates a verified archive.
#[cfg_attr(test, mockall::automock)]
pub trait Activator {
    /// Hand the archive and its signature to the activation component.
    ///
    /// # Errors
    ///
    /// Returns [`ActivationError`] if the component fails.
    fn activate(
        &self,
        archive: &Utf8Path,
        signature: &Utf8Path,
        offline: bool,
    ) -> Result<(), ActivationError>;
}

/// Activator that runs the `quietpatch` CLI as a child process.
pub struct ExternalActivator<'a> {
    executor: &'a dyn CommandExecutor,
    program: String,
}

impl<'a> ExternalActivator<'a> {
    /// Creates an activator that runs [`DEFAULT_ACTIVATOR`].
    #[must_use]
    pub fn new(executor: &'a dyn CommandExecutor) -> Self {
        Self::with_program(executor, DEFAULT_ACTIVATOR)
    }

    /// Creates an activator that runs `program`.
    #[must_use]
    pub fn with_program(executor: &'a dyn CommandExecutor, program: &str) -> Self {
        Self {
            executor,
            program: program.to_owned(),
        }
    }
}

impl Activator for ExternalActivator<'_> {
    fn activate(
        &self,
        archive: &Utf8Path,
        signature: &Utf8Path,
        offline: bool,
    ) -> Result<(), ActivationError> {
        let [db, apply] = APPLY_SUBCOMMAND;
        let args = [db, apply, archive.as_str(), signature.as_str()];
        let envs: &[(&str, &str)] = if offline { &[(OFFLINE_ENV, "1")] } else { &[] };
        log::debug!("activating {archive} via {} (offline: {offline})", self.program);

        let output = self
            .executor
            .run(&Invocation::new(&self.program, &args).with_envs(envs))?;
        if output.status.success() {
            return Ok(());
        }

        Err(ActivationError::Failed {
            program: self.program.clone(),
            status: output.status.to_string(),
            message: diagnostic_text(&output),
        })
    }
}
