//! QuietPatch catalog updater library.
//!
//! This crate fetches the signed catalog manifest, verifies it, fetches and
//! verifies the database archive it names, and hands the archive to the
//! `quietpatch` application for activation. It is used by the
//! `quietpatch-catalog-update` binary and can be driven programmatically with
//! injected collaborators for testing.
//!
//! # Modules
//!
//! - [`activation`] - Hand-off to the downstream `quietpatch db apply` command
//! - [`cli`] - Command-line argument definitions
//! - [`config`] - Layered configuration resolution
//! - [`dirs`] - Home directory resolution abstraction
//! - [`error`] - Top-level error type naming the failed step
//! - [`exec`] - Child process execution with optional timeouts
//! - [`fetch`] - HTTP retrieval of manifests, archives and signatures
//! - [`manifest`] - Catalog manifest decoding
//! - [`output`] - Progress, dry-run and success report formatting
//! - [`pipeline`] - Update orchestration
//! - [`release_state`] - Installed release record and rollback protection
//! - [`store`] - Local store layout
//! - [`verify`] - Detached-signature verification via `minisign`

pub mod activation;
pub mod cli;
pub mod config;
pub mod dirs;
pub mod error;
pub mod exec;
pub mod fetch;
pub mod manifest;
pub mod output;
pub mod pipeline;
pub mod release_state;
pub mod store;
pub mod verify;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
