//! CLI argument definitions for the catalog updater.
//!
//! This module defines the command-line interface using clap. It is separated
//! from the main entrypoint to keep the binary small and focused on
//! orchestration.

use camino::Utf8PathBuf;
use clap::Parser;

/// Update the QuietPatch vulnerability catalog from its signed manifest.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "quietpatch-catalog-update")]
#[command(version, about)]
#[command(long_about = concat!(
    "Update the QuietPatch vulnerability catalog.\n\n",
    "Fetches the signed catalog manifest, verifies it with minisign, fetches the ",
    "database archive it names, verifies that archive, and hands it to ",
    "`quietpatch db apply` for activation. Any failure stops the update.",
))]
#[command(after_help = concat!(
    "ENVIRONMENT:\n",
    "  QP_MANIFEST_URL       Manifest location (overridden by --manifest-url)\n",
    "  QP_MINISIGN_PUBKEY    minisign public key (overridden by --pubkey)\n",
    "  QUIETPATCH_HOME       QuietPatch home directory [default: ~/.quietpatch]\n",
    "  QP_ALLOW_DOWNGRADE    Set to 1 to accept an older catalog\n",
    "  RUST_LOG              Log filter (e.g. quietpatch_catalog=debug)\n\n",
    "EXAMPLES:\n",
    "  Update from the default manifest:\n",
    "    $ QP_MINISIGN_PUBKEY=RWQ... quietpatch-catalog-update\n\n",
    "  Preview the resolved configuration:\n",
    "    $ quietpatch-catalog-update --dry-run\n",
))]
pub struct Cli {
    /// Manifest URL [default: QP_MANIFEST_URL or the published manifest].
    #[arg(long, value_name = "URL")]
    pub manifest_url: Option<String>,

    /// minisign public key [default: QP_MINISIGN_PUBKEY].
    #[arg(long, value_name = "KEY")]
    pub pubkey: Option<String>,

    /// QuietPatch home directory; the store lives in its `db` subdirectory.
    #[arg(long, value_name = "DIR")]
    pub home: Option<Utf8PathBuf>,

    /// Accept a catalog older than the installed one.
    #[arg(long)]
    pub allow_downgrade: bool,

    /// Signature verifier program.
    #[arg(long, value_name = "PROGRAM")]
    pub verifier: Option<String>,

    /// Activation program invoked as `<PROGRAM> db apply <archive> <signature>`.
    #[arg(long, value_name = "PROGRAM")]
    pub activator: Option<String>,

    /// Kill the verifier or activator after this many seconds.
    #[arg(long, value_name = "SECS")]
    pub command_timeout: Option<u64>,

    /// Give up on a single network request after this many seconds.
    #[arg(long, value_name = "SECS")]
    pub network_timeout: Option<u64>,

    /// Show the resolved configuration and exit without updating.
    #[arg(long)]
    pub dry_run: bool,

    /// Increase log verbosity (repeatable: -v, -vv, -vvv).
    #[arg(
        short,
        long = "verbose",
        action = clap::ArgAction::Count,
        conflicts_with = "quiet"
    )]
    pub verbosity: u8,

    /// Suppress progress output (errors still shown).
    #[arg(short, long, conflicts_with = "verbosity")]
    pub quiet: bool,
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
