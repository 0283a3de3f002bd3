//! Catalog update orchestrator.
//!
//! Runs the update as a strict sequence of steps and stops at the first
//! failure. Nothing reaches the activation component unless both the
//! manifest and the archive it names have passed signature verification, and
//! the manifest bytes that are parsed are the same bytes that were verified.

use camino::Utf8Path;
use std::fmt;
use std::io::Write;

use crate::activation::{Activator, ExternalActivator};
use crate::config::UpdateConfig;
use crate::error::{Result, UpdaterError};
use crate::exec::SystemCommandExecutor;
use crate::fetch::{Fetcher, HttpFetcher, write_atomically};
use crate::manifest::{Manifest, parse_manifest};
use crate::output::{UpdateReport, download_message, write_stderr_line};
use crate::release_state::{ReleaseState, load_state, persist_state};
use crate::store::manifest_signature_url;
use crate::verify::{MinisignVerifier, TrustVerifier};

/// The steps of an update, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStep {
    /// Download the manifest.
    FetchManifest,
    /// Download the manifest's detached signature.
    FetchManifestSignature,
    /// Verify the manifest against its signature.
    VerifyManifest,
    /// Decode the verified manifest.
    ParseManifest,
    /// Refuse catalogs older than the installed one.
    CheckRelease,
    /// Download the catalog archive.
    FetchArtifact,
    /// Download the archive's detached signature.
    FetchArtifactSignature,
    /// Verify the archive against its signature.
    VerifyArtifact,
    /// Hand the archive to the activation component.
    Activate,
}

impl fmt::Display for UpdateStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::FetchManifest => "manifest download",
            Self::FetchManifestSignature => "manifest signature download",
            Self::VerifyManifest => "manifest signature verification",
            Self::ParseManifest => "manifest decoding",
            Self::CheckRelease => "release check",
            Self::FetchArtifact => "database download",
            Self::FetchArtifactSignature => "database signature download",
            Self::VerifyArtifact => "database signature verification",
            Self::Activate => "database activation",
        };
        f.write_str(label)
    }
}

/// The collaborators an update runs against.
#[derive(Clone, Copy)]
pub struct UpdateServices<'a> {
    /// Retrieves remote resources.
    pub fetcher: &'a dyn Fetcher,
    /// Checks detached signatures.
    pub verifier: &'a dyn TrustVerifier,
    /// Installs the verified archive.
    pub activator: &'a dyn Activator,
}

/// Run an update using the production HTTP fetcher, `minisign` verifier and
/// `quietpatch` activator.
///
/// # Errors
///
/// Returns [`UpdaterError`] naming the step at which the update stopped.
pub fn run_update(config: &UpdateConfig, stderr: &mut dyn Write) -> Result<UpdateReport> {
    let fetcher = HttpFetcher::with_timeout(config.network_timeout);
    let executor = SystemCommandExecutor::with_timeout(config.command_timeout);
    let verifier = MinisignVerifier::with_program(&executor, &config.verifier);
    let activator = ExternalActivator::with_program(&executor, &config.activator);
    let services = UpdateServices {
        fetcher: &fetcher,
        verifier: &verifier,
        activator: &activator,
    };
    run_update_with(config, services, stderr)
}

/// Testable inner function with injected collaborators.
///
/// # Errors
///
/// Returns [`UpdaterError`] naming the step at which the update stopped.
pub fn run_update_with(
    config: &UpdateConfig,
    services: UpdateServices<'_>,
    stderr: &mut dyn Write,
) -> Result<UpdateReport> {
    let store = config.store();
    store.prepare()?;

    let manifest = fetch_verified_manifest(config, services, stderr)?;
    log::debug!(
        "manifest offers epoch {} ({}), min_client {:?}",
        manifest.epoch(),
        manifest.snapshot_date(),
        manifest.min_client()
    );

    let state_path = config.state_path();
    load_state(&state_path).check(&manifest, config.allow_downgrade)?;

    let artifact_path = store.artifact_path(&manifest);
    let artifact_sig_path = store.artifact_signature_path(&manifest);
    fetch_step(
        services.fetcher,
        UpdateStep::FetchArtifact,
        manifest.latest(),
        &artifact_path,
        config.quiet,
        stderr,
    )?;
    fetch_step(
        services.fetcher,
        UpdateStep::FetchArtifactSignature,
        &manifest.artifact_signature_url(),
        &artifact_sig_path,
        config.quiet,
        stderr,
    )?;
    services
        .verifier
        .verify(&artifact_path, &artifact_sig_path, &config.public_key)
        .map_err(|source| UpdaterError::Verification {
            step: UpdateStep::VerifyArtifact,
            source,
        })?;
    log::info!("database signature verified: {artifact_path}");

    services
        .activator
        .activate(&artifact_path, &artifact_sig_path, true)?;
    log::info!("catalog epoch {} activated", manifest.epoch());

    record_release(&state_path, &manifest, stderr);

    Ok(UpdateReport {
        epoch: manifest.epoch(),
        snapshot_date: manifest.snapshot_date().to_owned(),
        store_dir: store.db_dir().to_owned(),
    })
}

/// Fetch the manifest once, verify it, and decode the verified bytes.
fn fetch_verified_manifest(
    config: &UpdateConfig,
    services: UpdateServices<'_>,
    stderr: &mut dyn Write,
) -> Result<Manifest> {
    let store = config.store();
    let manifest_path = store.manifest_path();
    let manifest_sig_path = store.manifest_signature_path();

    announce(config.quiet, stderr, &config.manifest_url, &manifest_path);
    let bytes = services
        .fetcher
        .fetch(&config.manifest_url)
        .and_then(|bytes| {
            write_atomically(&config.manifest_url, &manifest_path, &bytes).map(|()| bytes)
        })
        .map_err(|source| UpdaterError::Fetch {
            step: UpdateStep::FetchManifest,
            source,
        })?;

    fetch_step(
        services.fetcher,
        UpdateStep::FetchManifestSignature,
        &manifest_signature_url(&config.manifest_url),
        &manifest_sig_path,
        config.quiet,
        stderr,
    )?;

    services
        .verifier
        .verify(&manifest_path, &manifest_sig_path, &config.public_key)
        .map_err(|source| UpdaterError::Verification {
            step: UpdateStep::VerifyManifest,
            source,
        })?;
    log::info!("manifest signature verified: {manifest_path}");

    Ok(parse_manifest(&bytes)?)
}

fn fetch_step(
    fetcher: &dyn Fetcher,
    step: UpdateStep,
    url: &str,
    dest: &Utf8Path,
    quiet: bool,
    stderr: &mut dyn Write,
) -> Result<()> {
    announce(quiet, stderr, url, dest);
    fetcher
        .fetch_to(url, dest)
        .map_err(|source| UpdaterError::Fetch { step, source })
}

fn announce(quiet: bool, stderr: &mut dyn Write, url: &str, dest: &Utf8Path) {
    if !quiet {
        write_stderr_line(stderr, download_message(url, dest));
    }
}

/// Record the activated release; the catalog is already live, so a failure
/// here is only reported.
fn record_release(state_path: &Utf8Path, manifest: &Manifest, stderr: &mut dyn Write) {
    if let Err(err) = persist_state(state_path, &ReleaseState::for_manifest(manifest)) {
        write_stderr_line(stderr, format!("Warning: could not record catalog state: {err}"));
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
