//! Epoch and rollback protection.
//!
//! The last activated release is recorded at `<home>/state.json`. Before a
//! new archive is fetched, the verified manifest is compared against that
//! record so that a validly signed but older manifest cannot roll the
//! catalog back.

use crate::manifest::Manifest;
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::time::{SystemTime, UNIX_EPOCH};

/// Filename of the release-state record inside the QuietPatch home.
pub const STATE_FILENAME: &str = "state.json";

/// The last release that was activated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleaseState {
    /// Snapshot date of the installed catalog.
    pub last_date: String,
    /// Epoch of the installed catalog.
    pub epoch: u64,
    /// Unix timestamp of the activation.
    pub ts: u64,
}

/// How a candidate release relates to the installed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOrder {
    /// Neither the epoch nor the snapshot date goes backwards, and at least
    /// one of them moves forward.
    Newer,
    /// Same epoch and snapshot date as the installed catalog.
    Same,
    /// Lower epoch or earlier snapshot date, whatever the other field says.
    Older,
}

/// Errors from the release-state guard.
#[derive(Debug, thiserror::Error)]
pub enum ReleaseStateError {
    /// The manifest describes an older release than the installed one.
    #[error(
        "catalog downgrade refused: installed epoch {installed_epoch} ({installed_date}), \
         offered epoch {offered_epoch} ({offered_date}); set QP_ALLOW_DOWNGRADE=1 to override"
    )]
    Downgrade {
        /// Installed epoch.
        installed_epoch: u64,
        /// Installed snapshot date.
        installed_date: String,
        /// Epoch named by the manifest.
        offered_epoch: u64,
        /// Snapshot date named by the manifest.
        offered_date: String,
    },

    /// Serializing the state failed.
    #[error("failed to serialize release state: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Writing the state file failed.
    #[error("failed to write {path}: {source}")]
    Write {
        /// State file path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl ReleaseState {
    /// Compares the release described by `manifest` with this state.
    ///
    /// The epoch and the snapshot date are checked independently: a
    /// regression in either one makes the release [`ReleaseOrder::Older`].
    /// Snapshot dates compare lexically, which orders the ISO-8601 dates the
    /// catalog publisher emits.
    ///
    /// # Examples
    ///
    /// ```
    /// use quietpatch_catalog::manifest::parse_manifest;
    /// use quietpatch_catalog::release_state::{ReleaseOrder, ReleaseState};
    ///
    /// let json = r#"{"catalog":{"epoch":2,"snapshot_date":"2024-02-01","latest":"https://x/db","signature_ext":".minisig"}}"#;
    /// let manifest = parse_manifest(json.as_bytes()).expect("valid");
    /// let installed = ReleaseState { last_date: "2024-01-01".to_owned(), epoch: 2, ts: 0 };
    /// assert_eq!(installed.compare(&manifest), ReleaseOrder::Newer);
    /// ```
    #[must_use]
    pub fn compare(&self, manifest: &Manifest) -> ReleaseOrder {
        let epoch = manifest.epoch().cmp(&self.epoch);
        let date = manifest.snapshot_date().cmp(self.last_date.as_str());
        match (epoch, date) {
            (Ordering::Less, _) | (_, Ordering::Less) => ReleaseOrder::Older,
            (Ordering::Equal, Ordering::Equal) => ReleaseOrder::Same,
            _ => ReleaseOrder::Newer,
        }
    }

    /// Refuses manifests older than this state unless `allow_downgrade`.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseStateError::Downgrade`] for an older release.
    pub fn check(
        &self,
        manifest: &Manifest,
        allow_downgrade: bool,
    ) -> Result<ReleaseOrder, ReleaseStateError> {
        let order = self.compare(manifest);
        log::debug!(
            "installed epoch {} ({}), offered epoch {} ({}): {order:?}",
            self.epoch,
            self.last_date,
            manifest.epoch(),
            manifest.snapshot_date()
        );
        if order == ReleaseOrder::Older {
            if !allow_downgrade {
                return Err(ReleaseStateError::Downgrade {
                    installed_epoch: self.epoch,
                    installed_date: self.last_date.clone(),
                    offered_epoch: manifest.epoch(),
                    offered_date: manifest.snapshot_date().to_owned(),
                });
            }
            log::warn!(
                "downgrade allowed: epoch {} -> {}",
                self.epoch,
                manifest.epoch()
            );
        }
        Ok(order)
    }

    /// State describing `manifest`, stamped with the current time.
    #[must_use]
    pub fn for_manifest(manifest: &Manifest) -> Self {
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs());
        Self {
            last_date: manifest.snapshot_date().to_owned(),
            epoch: manifest.epoch(),
            ts,
        }
    }
}

/// Loads the recorded state from `path`.
///
/// A missing or malformed file means nothing is installed yet.
#[must_use]
pub fn load_state(path: &Utf8Path) -> ReleaseState {
    let content = match std::fs::read_to_string(path.as_std_path()) {
        Ok(content) => content,
        Err(err) => {
            if err.kind() != std::io::ErrorKind::NotFound {
                log::warn!("could not read {path}, treating catalog as uninstalled: {err}");
            }
            return ReleaseState::default();
        }
    };
    serde_json::from_str(&content).unwrap_or_else(|err| {
        log::warn!("ignoring malformed {path}: {err}");
        ReleaseState::default()
    })
}

/// Persists `state` at `path`, creating parent directories.
///
/// # Errors
///
/// Returns [`ReleaseStateError`] if serialization or the write fails.
pub fn persist_state(path: &Utf8Path, state: &ReleaseState) -> Result<(), ReleaseStateError> {
    let write_error = |source| ReleaseStateError::Write {
        path: path.to_owned(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent.as_std_path()).map_err(write_error)?;
    }
    let json = serde_json::to_string_pretty(state)?;
    std::fs::write(path.as_std_path(), json).map_err(write_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::parse_manifest;
    use crate::test_utils::catalog_manifest_json;
    use rstest::rstest;

    fn manifest(epoch: u64, date: &str) -> Manifest {
        let json = catalog_manifest_json(epoch, date, "https://x/db.tar.zst", ".minisig");
        parse_manifest(json.as_bytes()).expect("valid manifest")
    }

    fn installed(epoch: u64, date: &str) -> ReleaseState {
        ReleaseState {
            last_date: date.to_owned(),
            epoch,
            ts: 1_700_000_000,
        }
    }

    fn temp_state_path() -> (tempfile::TempDir, Utf8PathBuf) {
        let temp = tempfile::tempdir().expect("temp dir");
        let path = Utf8PathBuf::try_from(temp.path().join(STATE_FILENAME)).expect("UTF-8 path");
        (temp, path)
    }

    #[rstest]
    #[case::higher_epoch(3, "2024-01-01", ReleaseOrder::Newer)]
    #[case::both_forward(3, "2024-02-01", ReleaseOrder::Newer)]
    #[case::later_date(2, "2024-02-01", ReleaseOrder::Newer)]
    #[case::identical(2, "2024-01-01", ReleaseOrder::Same)]
    #[case::earlier_date(2, "2023-12-31", ReleaseOrder::Older)]
    #[case::higher_epoch_earlier_date(3, "2023-01-01", ReleaseOrder::Older)]
    #[case::lower_epoch(1, "2025-01-01", ReleaseOrder::Older)]
    fn compare_refuses_either_regression(
        #[case] epoch: u64,
        #[case] date: &str,
        #[case] expected: ReleaseOrder,
    ) {
        assert_eq!(installed(2, "2024-01-01").compare(&manifest(epoch, date)), expected);
    }

    #[test]
    fn fresh_install_accepts_any_release() {
        let order = ReleaseState::default()
            .check(&manifest(0, ""), false)
            .expect("fresh install");
        assert_eq!(order, ReleaseOrder::Same);
        let order = ReleaseState::default()
            .check(&manifest(7, "2024-01-01"), false)
            .expect("fresh install");
        assert_eq!(order, ReleaseOrder::Newer);
    }

    #[test]
    fn older_release_is_refused() {
        let err = installed(5, "2024-03-01")
            .check(&manifest(4, "2024-04-01"), false)
            .expect_err("downgrade should be refused");
        let msg = err.to_string();
        assert!(msg.contains("downgrade refused"));
        assert!(msg.contains("QP_ALLOW_DOWNGRADE"));
    }

    #[test]
    fn stale_snapshot_under_new_epoch_is_refused() {
        let err = installed(5, "2024-03-01")
            .check(&manifest(6, "2024-02-01"), false)
            .expect_err("date rollback should be refused");
        assert!(matches!(
            err,
            ReleaseStateError::Downgrade {
                offered_epoch: 6,
                ..
            }
        ));
    }

    #[test]
    fn older_release_is_accepted_when_allowed() {
        let order = installed(5, "2024-03-01")
            .check(&manifest(4, "2024-04-01"), true)
            .expect("downgrade allowed");
        assert_eq!(order, ReleaseOrder::Older);
    }

    #[test]
    fn missing_state_file_is_default() {
        let (_temp, path) = temp_state_path();
        assert_eq!(load_state(&path), ReleaseState::default());
    }

    #[test]
    fn malformed_state_file_is_default() {
        let (_temp, path) = temp_state_path();
        std::fs::write(&path, "{not json").expect("write corrupt state");
        assert_eq!(load_state(&path), ReleaseState::default());
    }

    #[test]
    fn state_written_by_older_clients_loads() {
        let (_temp, path) = temp_state_path();
        std::fs::write(&path, r#"{"last_date":"2024-01-01","epoch":7,"ts":1,"extra":true}"#)
            .expect("write state");
        assert_eq!(load_state(&path), installed(7, "2024-01-01").with_ts(1));
    }

    #[test]
    fn persisted_state_round_trips_through_load() {
        let (_temp, path) = temp_state_path();
        let state = ReleaseState::for_manifest(&manifest(9, "2024-06-01"));
        persist_state(&path, &state).expect("persist state");
        assert_eq!(load_state(&path), state);
        assert!(state.ts > 0);
    }

    #[test]
    fn persist_reports_unwritable_path() {
        let (_temp, path) = temp_state_path();
        std::fs::create_dir_all(&path).expect("create blocking directory");
        let err = persist_state(&path, &ReleaseState::default()).expect_err("write should fail");
        assert!(matches!(err, ReleaseStateError::Write { .. }));
    }

    impl ReleaseState {
        fn with_ts(mut self, ts: u64) -> Self {
            self.ts = ts;
            self
        }
    }
}
