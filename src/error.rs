//! Error types for the catalog updater.
//!
//! Every failure is fatal to the run. [`UpdaterError`] wraps the component
//! errors and remembers which [`UpdateStep`] failed so the diagnostic printed
//! on exit says where the update stopped.

use crate::activation::ActivationError;
use crate::config::ConfigError;
use crate::fetch::FetchError;
use crate::manifest::ManifestDecodeError;
use crate::pipeline::UpdateStep;
use crate::release_state::ReleaseStateError;
use crate::verify::SignatureInvalid;
use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors that can occur during a catalog update.
#[derive(Debug, Error)]
pub enum UpdaterError {
    /// Configuration could not be resolved.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The local store directory could not be created.
    #[error("could not prepare local store {path}: {source}")]
    StorePreparation {
        /// Store directory.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A download failed.
    #[error("{step} failed: {source}")]
    Fetch {
        /// The download step that failed.
        step: UpdateStep,
        /// The transport failure.
        #[source]
        source: FetchError,
    },

    /// A signature check failed.
    #[error("{step} failed: {source}")]
    Verification {
        /// The verification step that failed.
        step: UpdateStep,
        /// Why the signature was not accepted.
        #[source]
        source: SignatureInvalid,
    },

    /// The verified manifest could not be decoded.
    #[error("manifest decoding failed: {0}")]
    ManifestDecode(#[from] ManifestDecodeError),

    /// The manifest offers an older catalog than the installed one.
    #[error("release check failed: {0}")]
    Release(#[from] ReleaseStateError),

    /// The activation component failed.
    #[error("database activation failed: {0}")]
    Activation(#[from] ActivationError),

    /// Failed to write output.
    #[error("failed to write output")]
    WriteFailed {
        /// The underlying error that caused the write to fail.
        #[source]
        source: std::io::Error,
    },
}

impl UpdaterError {
    /// The pipeline step at which the update stopped, if it got that far.
    #[must_use]
    pub fn step(&self) -> Option<UpdateStep> {
        match self {
            Self::Fetch { step, .. } | Self::Verification { step, .. } => Some(*step),
            Self::ManifestDecode(_) => Some(UpdateStep::ParseManifest),
            Self::Release(_) => Some(UpdateStep::CheckRelease),
            Self::Activation(_) => Some(UpdateStep::Activate),
            Self::Config(_) | Self::StorePreparation { .. } | Self::WriteFailed { .. } => None,
        }
    }
}

/// Result type alias using [`UpdaterError`].
pub type Result<T> = std::result::Result<T, UpdaterError>;
