//! Catalog manifest model and decoding.
//!
//! The manifest is a small JSON document whose `catalog` object names the
//! current database release:
//!
//! ```json
//! {"catalog": {"epoch": 7, "snapshot_date": "2024-01-01",
//!   "latest": "https://example/db.tar.zst", "signature_ext": ".minisig",
//!   "min_client": "1.0"}}
//! ```
//!
//! Decoding is lenient: unknown fields are ignored and missing fields take
//! their empty value. The two fields needed to build further requests,
//! `latest` and `signature_ext`, must be non-empty, and `signature_ext` must
//! not contain path separators since it also names a local file.
//!
//! A [`Manifest`] is only meaningful once the file it was decoded from has
//! passed signature verification; see [`crate::pipeline`].

use crate::store::{MANIFEST_FILENAME, MANIFEST_SIGNATURE_SUFFIX};
use serde::Deserialize;

/// Local filename used when the release URL has no usable basename.
pub const FALLBACK_ARTIFACT_NAME: &str = "qp_db-latest.tar.zst";

/// Errors arising from manifest decoding.
#[derive(Debug, thiserror::Error)]
pub enum ManifestDecodeError {
    /// The payload is not a JSON document of the expected shape.
    #[error("manifest is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A field required to continue the update is empty or absent.
    #[error("manifest field catalog.{field} is missing or empty")]
    MissingField {
        /// Name of the field inside the `catalog` object.
        field: &'static str,
    },

    /// `signature_ext` would place the signature outside the local store.
    #[error("manifest field catalog.signature_ext {ext:?} is not a plain filename suffix")]
    InvalidSignatureExt {
        /// The rejected extension.
        ext: String,
    },
}

/// The signed descriptor of the current catalog release.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    catalog: Catalog,
}

/// The `catalog` object of the manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
struct Catalog {
    epoch: u64,
    snapshot_date: String,
    latest: String,
    signature_ext: String,
    min_client: String,
}

impl Manifest {
    /// Release generation counter.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.catalog.epoch
    }

    /// When the catalog snapshot was produced.
    #[must_use]
    pub fn snapshot_date(&self) -> &str {
        &self.catalog.snapshot_date
    }

    /// URL of the catalog archive.
    #[must_use]
    pub fn latest(&self) -> &str {
        &self.catalog.latest
    }

    /// Suffix appended to [`Self::latest`] to locate its detached signature.
    #[must_use]
    pub fn signature_ext(&self) -> &str {
        &self.catalog.signature_ext
    }

    /// Minimum compatible client version.
    ///
    /// Decoded for diagnostics only; the updater does not enforce it.
    #[must_use]
    pub fn min_client(&self) -> &str {
        &self.catalog.min_client
    }

    /// URL of the archive's detached signature.
    ///
    /// # Examples
    ///
    /// ```
    /// use quietpatch_catalog::manifest::parse_manifest;
    ///
    /// let json = r#"{"catalog":{"latest":"https://x/db.tar.zst","signature_ext":".sig"}}"#;
    /// let manifest = parse_manifest(json.as_bytes()).expect("valid manifest");
    /// assert_eq!(manifest.artifact_signature_url(), "https://x/db.tar.zst.sig");
    /// ```
    #[must_use]
    pub fn artifact_signature_url(&self) -> String {
        format!("{}{}", self.catalog.latest, self.catalog.signature_ext)
    }

    /// Local filename for the archive, taken from the basename of
    /// [`Self::latest`].
    ///
    /// Query strings and fragments are ignored. Falls back to
    /// [`FALLBACK_ARTIFACT_NAME`] when the URL ends in a separator, the
    /// basename is not a plain filename, or the archive or its signature
    /// would take the name of a manifest file.
    #[must_use]
    pub fn artifact_file_name(&self) -> &str {
        let without_fragment = self.latest().split('#').next().unwrap_or_default();
        let path = without_fragment.split('?').next().unwrap_or_default();
        let basename = path.rsplit('/').next().unwrap_or_default();
        let signature_name = format!("{basename}{}", self.signature_ext());
        if is_plain_file_name(basename)
            && !is_manifest_file_name(basename)
            && !is_manifest_file_name(&signature_name)
        {
            basename
        } else {
            FALLBACK_ARTIFACT_NAME
        }
    }

    fn validate(self) -> Result<Self, ManifestDecodeError> {
        if self.catalog.latest.trim().is_empty() {
            return Err(ManifestDecodeError::MissingField { field: "latest" });
        }
        if self.catalog.signature_ext.is_empty() {
            return Err(ManifestDecodeError::MissingField {
                field: "signature_ext",
            });
        }
        if self.catalog.signature_ext.contains(['/', '\\', ':'])
            || self.catalog.signature_ext.chars().any(char::is_control)
        {
            return Err(ManifestDecodeError::InvalidSignatureExt {
                ext: self.catalog.signature_ext,
            });
        }
        Ok(self)
    }
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['\\', ':'])
        && !name.chars().any(char::is_control)
}

fn is_manifest_file_name(name: &str) -> bool {
    name.strip_prefix(MANIFEST_FILENAME)
        .is_some_and(|suffix| suffix.is_empty() || suffix == MANIFEST_SIGNATURE_SUFFIX)
}

/// Decode manifest bytes into a [`Manifest`].
///
/// # Errors
///
/// Returns [`ManifestDecodeError::Json`] for malformed payloads and
/// [`ManifestDecodeError::MissingField`] when `latest` or `signature_ext`
/// is empty, and [`ManifestDecodeError::InvalidSignatureExt`] when
/// `signature_ext` contains a path separator.
///
/// # Examples
///
/// ```
/// use quietpatch_catalog::manifest::parse_manifest;
///
/// let json = concat!(
///     r#"{"catalog":{"epoch":7,"snapshot_date":"2024-01-01","#,
///     r#""latest":"https://example/db.tar.zst","signature_ext":".minisig","#,
///     r#""min_client":"1.0"}}"#,
/// );
/// let manifest = parse_manifest(json.as_bytes()).expect("valid manifest");
/// assert_eq!(manifest.epoch(), 7);
/// assert_eq!(manifest.snapshot_date(), "2024-01-01");
/// ```
pub fn parse_manifest(bytes: &[u8]) -> Result<Manifest, ManifestDecodeError> {
    let manifest: Manifest = serde_json::from_slice(bytes)?;
    manifest.validate()
}
