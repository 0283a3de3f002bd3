//! Byte-fetch primitive for manifests, artifacts and signatures.
//!
//! Provides a trait-based abstraction over HTTP retrieval so the update
//! pipeline can be exercised without network access. Every transport failure
//! is surfaced as a [`FetchError`] naming the URL; nothing here retries.

use camino::Utf8Path;
use std::io::Write;
use std::sync::OnceLock;
use std::time::Duration;

/// Default network timeout for a single request.
pub const DEFAULT_NETWORK_TIMEOUT: Duration = Duration::from_secs(30);

/// Trait for fetching remote resources.
///
/// # Examples
///
/// ```
/// use quietpatch_catalog::fetch::HttpFetcher;
///
/// let fetcher = HttpFetcher::default();
/// // Use fetcher.fetch_to(url, path) in production
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait Fetcher {
    /// Fetch the body at `url` into memory.
    ///
    /// # Errors
    ///
    /// Returns an error on connection failure, non-success status, or a
    /// truncated body.
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;

    /// Fetch the body at `url` and persist it at `dest`.
    ///
    /// On success `dest` holds the complete body; on failure it is either
    /// untouched or absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the request or the file write fails.
    fn fetch_to(&self, url: &str, dest: &Utf8Path) -> Result<(), FetchError>;
}

/// Errors arising from fetch operations.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The request failed or returned a non-success status.
    #[error("request to {url} failed: {reason}")]
    Http {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// The requested resource does not exist (HTTP 404).
    #[error("not found: {url}")]
    NotFound {
        /// The URL that returned 404.
        url: String,
    },

    /// Writing the body to disk failed.
    #[error("could not write {url} to {path}: {source}")]
    Io {
        /// The URL being saved.
        url: String,
        /// Destination path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// HTTP fetcher using `ureq`.
#[derive(Debug, Clone, Copy)]
pub struct HttpFetcher {
    timeout: Duration,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::with_timeout(DEFAULT_NETWORK_TIMEOUT)
    }
}

impl HttpFetcher {
    /// Creates a fetcher whose requests give up after `timeout`.
    #[must_use]
    pub const fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn agent(&self) -> &'static ureq::Agent {
        http_agent(self.timeout)
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        log::debug!("fetching {url}");
        let response = self
            .agent()
            .get(url)
            .call()
            .map_err(|e| map_ureq_error(url, &e))?;
        response
            .into_body()
            .read_to_vec()
            .map_err(|e| map_ureq_error(url, &e))
    }

    fn fetch_to(&self, url: &str, dest: &Utf8Path) -> Result<(), FetchError> {
        log::debug!("fetching {url} into {dest}");
        let response = self
            .agent()
            .get(url)
            .call()
            .map_err(|e| map_ureq_error(url, &e))?;

        let io_error = |source| FetchError::Io {
            url: url.to_owned(),
            path: dest.to_string(),
            source,
        };

        // Stream into a sibling temp file so `dest` only ever holds a
        // complete body.
        let mut staged = stage_beside(dest).map_err(io_error)?;
        std::io::copy(&mut response.into_body().into_reader(), &mut staged).map_err(|e| {
            FetchError::Http {
                url: url.to_owned(),
                reason: e.to_string(),
            }
        })?;
        staged.flush().map_err(io_error)?;
        staged
            .persist(dest.as_std_path())
            .map_err(|e| io_error(e.error))?;
        Ok(())
    }
}

/// Writes `bytes` to `dest` through a sibling temp file, so `dest` is either
/// left untouched or holds the complete content.
///
/// # Errors
///
/// Returns [`FetchError::Io`] naming `url` if staging or the final rename
/// fails.
pub fn write_atomically(url: &str, dest: &Utf8Path, bytes: &[u8]) -> Result<(), FetchError> {
    let io_error = |source| FetchError::Io {
        url: url.to_owned(),
        path: dest.to_string(),
        source,
    };
    let mut staged = stage_beside(dest).map_err(io_error)?;
    staged.write_all(bytes).map_err(io_error)?;
    staged.flush().map_err(io_error)?;
    staged
        .persist(dest.as_std_path())
        .map_err(|e| io_error(e.error))?;
    Ok(())
}

fn stage_beside(dest: &Utf8Path) -> std::io::Result<tempfile::NamedTempFile> {
    let parent = match dest.parent() {
        Some(dir) if !dir.as_str().is_empty() => dir,
        _ => Utf8Path::new("."),
    };
    tempfile::NamedTempFile::new_in(parent)
}

/// Shared `ureq` agent, built on first use.
///
/// The first caller's timeout wins; a process only ever runs one update.
fn http_agent(timeout: Duration) -> &'static ureq::Agent {
    static AGENT: OnceLock<ureq::Agent> = OnceLock::new();
    AGENT.get_or_init(|| {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        ureq::Agent::new_with_config(config)
    })
}

/// Map a ureq error to a [`FetchError`].
fn map_ureq_error(url: &str, err: &ureq::Error) -> FetchError {
    match err {
        ureq::Error::StatusCode(404) => FetchError::NotFound {
            url: url.to_owned(),
        },
        other => FetchError::Http {
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}
