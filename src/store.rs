//! Local store layout.
//!
//! Every run writes into `<home>/db`:
//!
//! - `manifest.json` and `manifest.json.minisig`
//! - the catalog archive, named after the basename of the release URL
//! - the archive signature, `<archive><signature_ext>`
//!
//! Files are overwritten in place on each run and nothing is deleted here.

use crate::error::{Result, UpdaterError};
use crate::manifest::Manifest;
use camino::{Utf8Path, Utf8PathBuf};

/// Name of the database directory inside the QuietPatch home.
pub const DB_DIRNAME: &str = "db";

/// Local manifest filename.
pub const MANIFEST_FILENAME: &str = "manifest.json";

/// Suffix locating the manifest's own signature, fixed by protocol.
pub const MANIFEST_SIGNATURE_SUFFIX: &str = ".minisig";

/// The on-disk directory holding the current manifest, archive and
/// signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalStore {
    db_dir: Utf8PathBuf,
}

impl LocalStore {
    /// Creates a store rooted at `<home>/db`.
    ///
    /// # Examples
    ///
    /// ```
    /// use camino::Utf8Path;
    /// use quietpatch_catalog::store::LocalStore;
    ///
    /// let store = LocalStore::new(Utf8Path::new("/home/user/.quietpatch"));
    /// assert_eq!(store.db_dir(), "/home/user/.quietpatch/db");
    /// assert_eq!(store.manifest_path(), "/home/user/.quietpatch/db/manifest.json");
    /// ```
    #[must_use]
    pub fn new(home: &Utf8Path) -> Self {
        Self {
            db_dir: home.join(DB_DIRNAME),
        }
    }

    /// Directory holding the store's files.
    #[must_use]
    pub fn db_dir(&self) -> &Utf8Path {
        &self.db_dir
    }

    /// Creates the store directory if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`UpdaterError::StorePreparation`] if the directory cannot be
    /// created.
    pub fn prepare(&self) -> Result<()> {
        std::fs::create_dir_all(self.db_dir.as_std_path()).map_err(|source| {
            UpdaterError::StorePreparation {
                path: self.db_dir.clone(),
                source,
            }
        })
    }

    /// Path of the downloaded manifest.
    #[must_use]
    pub fn manifest_path(&self) -> Utf8PathBuf {
        self.db_dir.join(MANIFEST_FILENAME)
    }

    /// Path of the manifest's detached signature.
    #[must_use]
    pub fn manifest_signature_path(&self) -> Utf8PathBuf {
        self.db_dir
            .join(format!("{MANIFEST_FILENAME}{MANIFEST_SIGNATURE_SUFFIX}"))
    }

    /// Path of the catalog archive named by `manifest`.
    #[must_use]
    pub fn artifact_path(&self, manifest: &Manifest) -> Utf8PathBuf {
        self.db_dir.join(manifest.artifact_file_name())
    }

    /// Path of the archive's detached signature.
    #[must_use]
    pub fn artifact_signature_path(&self, manifest: &Manifest) -> Utf8PathBuf {
        self.db_dir.join(format!(
            "{}{}",
            manifest.artifact_file_name(),
            manifest.signature_ext()
        ))
    }
}

/// URL of the manifest's detached signature.
#[must_use]
pub fn manifest_signature_url(manifest_url: &str) -> String {
    format!("{manifest_url}{MANIFEST_SIGNATURE_SUFFIX}")
}
