//! Detached-signature verification.
//!
//! The cryptography lives in an external `minisign` binary. This module only
//! builds the invocation and reduces the outcome to pass or fail: a rejected
//! signature, a missing verifier and a verifier that hangs past its timeout
//! all fail the same way, while the error still carries the underlying
//! message for diagnosis.

use crate::exec::{CommandExecutor, ExecError, Invocation, diagnostic_text};
use camino::Utf8Path;

/// Default verifier program.
pub const DEFAULT_VERIFIER: &str = "minisign";

/// Reasons a signature check did not pass.
#[derive(Debug, thiserror::Error)]
pub enum SignatureInvalid {
    /// The verifier ran and rejected the file, signature and key triple.
    #[error("signature rejected for {file}: {message}")]
    Rejected {
        /// File whose signature was checked.
        file: String,
        /// Verifier diagnostic.
        message: String,
    },

    /// The verifier could not be run to completion.
    #[error("verifier unavailable: {0}")]
    VerifierUnavailable(#[from] ExecError),
}

/// Checks a file against a detached signature and public key.
#[cfg_attr(test, mockall::automock)]
pub trait TrustVerifier {
    /// Verify `file` against `signature` using `public_key`.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureInvalid`] for any outcome other than a clean pass.
    fn verify(
        &self,
        file: &Utf8Path,
        signature: &Utf8Path,
        public_key: &str,
    ) -> Result<(), SignatureInvalid>;
}

/// Verifier backed by the `minisign` command-line tool.
///
/// Runs `minisign -V -m <file> -x <signature> -P <key>`; the public key is
/// passed verbatim.
///
/// # Examples
///
/// ```no_run
/// use camino::Utf8Path;
/// use quietpatch_catalog::exec::SystemCommandExecutor;
/// use quietpatch_catalog::verify::{MinisignVerifier, TrustVerifier};
///
/// let executor = SystemCommandExecutor::default();
/// let verifier = MinisignVerifier::new(&executor);
/// verifier.verify(
///     Utf8Path::new("manifest.json"),
///     Utf8Path::new("manifest.json.minisig"),
///     "RWQf6LRCGA9i53mlYecO4IzT51TGPpvWucNSCh1CBM0QTaLn73Y7GFO3",
/// )?;
/// # Ok::<(), quietpatch_catalog::verify::SignatureInvalid>(())
/// ```
pub struct MinisignVerifier<'a> {
    executor: &'a dyn CommandExecutor,
    program: String,
}

impl<'a> MinisignVerifier<'a> {
    /// Creates a verifier that runs [`DEFAULT_VERIFIER`].
    #[must_use]
    pub fn new(executor: &'a dyn CommandExecutor) -> Self {
        Self::with_program(executor, DEFAULT_VERIFIER)
    }

    /// Creates a verifier that runs `program` instead of `minisign`.
    #[must_use]
    pub fn with_program(executor: &'a dyn CommandExecutor, program: &str) -> Self {
        Self {
            executor,
            program: program.to_owned(),
        }
    }
}

impl TrustVerifier for MinisignVerifier<'_> {
    fn verify(
        &self,
        file: &Utf8Path,
        signature: &Utf8Path,
        public_key: &str,
    ) -> Result<(), SignatureInvalid> {
        let args = [
            "-V",
            "-m",
            file.as_str(),
            "-x",
            signature.as_str(),
            "-P",
            public_key,
        ];
        log::debug!("verifying {file} against {signature} with {}", self.program);

        let output = self.executor.run(&Invocation::new(&self.program, &args))?;
        if output.status.success() {
            log::info!("signature verified for {file}");
            return Ok(());
        }

        let message = match diagnostic_text(&output) {
            text if text.is_empty() => format!("{} exited with {}", self.program, output.status),
            text => text,
        };
        log::warn!("signature check failed for {file}: {message}");
        Err(SignatureInvalid::Rejected {
            file: file.to_string(),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        ExpectedCall, StubExecutor, exit_status, failure_output, success_output,
    };
    use std::process::Output;
    use std::time::Duration;

    const KEY: &str = "RWQtestkey";

    fn expected(result: Result<Output, ExecError>) -> ExpectedCall {
        ExpectedCall::new(
            "minisign",
            &[
                "-V",
                "-m",
                "/qp/db/manifest.json",
                "-x",
                "/qp/db/manifest.json.minisig",
                "-P",
                KEY,
            ],
            result,
        )
    }

    fn run_verify(executor: &StubExecutor) -> Result<(), SignatureInvalid> {
        MinisignVerifier::new(executor).verify(
            Utf8Path::new("/qp/db/manifest.json"),
            Utf8Path::new("/qp/db/manifest.json.minisig"),
            KEY,
        )
    }

    #[test]
    fn passes_when_minisign_succeeds() {
        let executor = StubExecutor::new(vec![expected(Ok(success_output()))]);
        run_verify(&executor).expect("verification should pass");
        executor.assert_finished();
    }

    #[test]
    fn rejection_carries_minisign_message() {
        let executor = StubExecutor::new(vec![expected(Ok(failure_output(
            "Signature verification failed",
        )))]);
        let err = run_verify(&executor).expect_err("verification should fail");
        assert!(matches!(err, SignatureInvalid::Rejected { .. }));
        assert!(err.to_string().contains("Signature verification failed"));
        assert!(err.to_string().contains("/qp/db/manifest.json"));
    }

    #[test]
    fn silent_failure_reports_exit_status() {
        let output = Output {
            status: exit_status(2),
            stdout: Vec::new(),
            stderr: Vec::new(),
        };
        let executor = StubExecutor::new(vec![expected(Ok(output))]);
        let err = run_verify(&executor).expect_err("verification should fail");
        assert!(err.to_string().contains("minisign exited with"));
    }

    #[test]
    fn missing_verifier_is_a_failure() {
        let executor = StubExecutor::new(vec![expected(Err(ExecError::Spawn {
            program: "minisign".to_owned(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        }))]);
        let err = run_verify(&executor).expect_err("verification should fail");
        assert!(matches!(err, SignatureInvalid::VerifierUnavailable(_)));
        assert!(err.to_string().contains("minisign"));
    }

    #[test]
    fn verifier_timeout_is_a_failure() {
        let executor = StubExecutor::new(vec![expected(Err(ExecError::TimedOut {
            program: "minisign".to_owned(),
            timeout: Duration::from_secs(10),
        }))]);
        let err = run_verify(&executor).expect_err("verification should fail");
        assert!(err.to_string().contains("10 seconds"));
    }

    #[test]
    fn custom_program_is_invoked() {
        let executor = StubExecutor::new(vec![ExpectedCall::new(
            "/opt/bin/minisign",
            &["-V", "-m", "db.tar.zst", "-x", "db.tar.zst.sig", "-P", KEY],
            Ok(success_output()),
        )]);
        MinisignVerifier::with_program(&executor, "/opt/bin/minisign")
            .verify(Utf8Path::new("db.tar.zst"), Utf8Path::new("db.tar.zst.sig"), KEY)
            .expect("verification should pass");
        executor.assert_finished();
    }
}
