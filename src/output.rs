//! Output formatting for the updater CLI.
//!
//! Progress lines and warnings go to stderr; the final success report goes to
//! stdout so scripts can capture it.

use crate::config::UpdateConfig;
use crate::store::manifest_signature_url;
use camino::Utf8Path;
use std::io::Write;

/// What a successful update installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateReport {
    /// Epoch of the activated catalog.
    pub epoch: u64,
    /// Snapshot date of the activated catalog.
    pub snapshot_date: String,
    /// Local store directory.
    pub store_dir: camino::Utf8PathBuf,
}

impl UpdateReport {
    /// Format the success report for display.
    ///
    /// # Examples
    ///
    /// ```
    /// use camino::Utf8PathBuf;
    /// use quietpatch_catalog::output::UpdateReport;
    ///
    /// let report = UpdateReport {
    ///     epoch: 7,
    ///     snapshot_date: "2024-01-01".to_owned(),
    ///     store_dir: Utf8PathBuf::from("/home/user/.quietpatch/db"),
    /// };
    /// let text = report.display_text();
    /// assert!(text.contains("Epoch: 7"));
    /// assert!(text.contains("Location: /home/user/.quietpatch/db"));
    /// ```
    #[must_use]
    pub fn display_text(&self) -> String {
        format!(
            concat!(
                "Catalog updated successfully!\n",
                "   Epoch: {}\n",
                "   Date: {}\n",
                "   Location: {}"
            ),
            self.epoch, self.snapshot_date, self.store_dir
        )
    }
}

/// Format the progress line printed before each download.
#[must_use]
pub fn download_message(url: &str, dest: &Utf8Path) -> String {
    format!("Downloading {url} -> {dest}")
}

/// Format the resolved configuration for `--dry-run`.
#[must_use]
pub fn dry_run_text(config: &UpdateConfig) -> String {
    let store = config.store();
    let mut lines = vec![
        "Dry run - no files will be downloaded or modified".to_owned(),
        String::new(),
        format!("Manifest URL: {}", config.manifest_url),
        format!(
            "Manifest signature URL: {}",
            manifest_signature_url(&config.manifest_url)
        ),
        format!("Public key: {}", config.public_key),
        format!("Home: {}", config.home()),
        format!("Store: {}", store.db_dir()),
        format!("State file: {}", config.state_path()),
        format!("Verifier: {}", config.verifier),
        format!("Activator: {} db apply <archive> <signature>", config.activator),
        format!("Allow downgrade: {}", config.allow_downgrade),
        format!("Network timeout: {}s", config.network_timeout.as_secs()),
    ];
    match config.command_timeout {
        Some(timeout) => lines.push(format!("Command timeout: {}s", timeout.as_secs())),
        None => lines.push("Command timeout: none".to_owned()),
    }
    lines.join("\n")
}

/// Write a line to stderr, ignoring failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort logging; ignore write failures.
    }
}
