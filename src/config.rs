//! Runtime configuration for a catalog update.
//!
//! Settings are resolved once, before any network access, from three layers:
//! command-line flags, then environment variables, then built-in defaults.
//! Empty environment values count as unset.

use crate::activation::DEFAULT_ACTIVATOR;
use crate::cli::Cli;
use crate::dirs::BaseDirs;
use crate::fetch::DEFAULT_NETWORK_TIMEOUT;
use crate::release_state::STATE_FILENAME;
use crate::store::LocalStore;
use crate::verify::DEFAULT_VERIFIER;
use camino::{Utf8Path, Utf8PathBuf};
use std::time::Duration;

/// Published manifest used when no override is configured.
pub const DEFAULT_MANIFEST_URL: &str =
    "https://raw.githubusercontent.com/Matt-C-G/QuietPatch/main/manifest.json";

/// Environment variable overriding the manifest URL.
pub const MANIFEST_URL_ENV: &str = "QP_MANIFEST_URL";
/// Environment variable carrying the minisign public key.
pub const PUBKEY_ENV: &str = "QP_MINISIGN_PUBKEY";
/// Environment variable overriding the QuietPatch home directory.
pub const HOME_ENV: &str = "QUIETPATCH_HOME";
/// Environment variable that permits catalog downgrades when set to `1`.
pub const ALLOW_DOWNGRADE_ENV: &str = "QP_ALLOW_DOWNGRADE";

/// Errors raised while resolving configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No public key was supplied.
    #[error("no minisign public key configured; set {PUBKEY_ENV} or pass --pubkey")]
    MissingPublicKey,

    /// The home directory could not be determined.
    #[error("could not determine the QuietPatch home directory; set {HOME_ENV} or pass --home")]
    MissingHomeDirectory,

    /// The home directory is not valid UTF-8.
    #[error("QuietPatch home directory is not valid UTF-8: {path}")]
    NonUtf8Home {
        /// Lossy rendering of the offending path.
        path: String,
    },
}

/// Read access to process environment variables.
pub trait Environment {
    /// Returns the value of `key`, or `None` when unset or not Unicode.
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnvironment;

impl Environment for SystemEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Fully resolved settings for one update run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateConfig {
    /// Where the manifest is fetched from.
    pub manifest_url: String,
    /// Public key handed verbatim to the verifier.
    pub public_key: String,
    /// QuietPatch home directory.
    pub home: Utf8PathBuf,
    /// Whether an older catalog may replace the installed one.
    pub allow_downgrade: bool,
    /// Verifier program.
    pub verifier: String,
    /// Activation program.
    pub activator: String,
    /// Timeout applied to the verifier and activator, if any.
    pub command_timeout: Option<Duration>,
    /// Timeout applied to each network request.
    pub network_timeout: Duration,
    /// Suppress progress output.
    pub quiet: bool,
}

impl UpdateConfig {
    /// Resolves configuration from the command line and environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the public key or home directory cannot
    /// be determined.
    pub fn resolve(
        cli: &Cli,
        env: &dyn Environment,
        dirs: &dyn BaseDirs,
    ) -> Result<Self, ConfigError> {
        let non_empty = |key: &str| {
            env.var(key)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let manifest_url = cli
            .manifest_url
            .clone()
            .or_else(|| non_empty(MANIFEST_URL_ENV))
            .unwrap_or_else(|| DEFAULT_MANIFEST_URL.to_owned());

        let public_key = cli
            .pubkey
            .clone()
            .or_else(|| non_empty(PUBKEY_ENV))
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingPublicKey)?;

        let home = match cli.home.clone() {
            Some(home) => home,
            None => match non_empty(HOME_ENV) {
                Some(home) => Utf8PathBuf::from(home),
                None => default_home(dirs)?,
            },
        };

        let allow_downgrade =
            cli.allow_downgrade || env.var(ALLOW_DOWNGRADE_ENV).is_some_and(|v| v.trim() == "1");

        Ok(Self {
            manifest_url,
            public_key,
            home,
            allow_downgrade,
            verifier: cli
                .verifier
                .clone()
                .unwrap_or_else(|| DEFAULT_VERIFIER.to_owned()),
            activator: cli
                .activator
                .clone()
                .unwrap_or_else(|| DEFAULT_ACTIVATOR.to_owned()),
            command_timeout: cli.command_timeout.map(Duration::from_secs),
            network_timeout: cli
                .network_timeout
                .map_or(DEFAULT_NETWORK_TIMEOUT, Duration::from_secs),
            quiet: cli.quiet,
        })
    }

    /// The local store under this configuration's home.
    #[must_use]
    pub fn store(&self) -> LocalStore {
        LocalStore::new(&self.home)
    }

    /// Path of the release-state record.
    #[must_use]
    pub fn state_path(&self) -> Utf8PathBuf {
        self.home.join(STATE_FILENAME)
    }

    /// Home directory of this configuration.
    #[must_use]
    pub fn home(&self) -> &Utf8Path {
        &self.home
    }
}

fn default_home(dirs: &dyn BaseDirs) -> Result<Utf8PathBuf, ConfigError> {
    let home = dirs
        .quietpatch_home()
        .ok_or(ConfigError::MissingHomeDirectory)?;
    Utf8PathBuf::try_from(home).map_err(|err| ConfigError::NonUtf8Home {
        path: err.as_path().display().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use std::collections::HashMap;
    use std::path::PathBuf;

    #[derive(Default)]
    struct MapEnvironment(HashMap<&'static str, &'static str>);

    impl MapEnvironment {
        fn with(mut self, key: &'static str, value: &'static str) -> Self {
            self.0.insert(key, value);
            self
        }
    }

    impl Environment for MapEnvironment {
        fn var(&self, key: &str) -> Option<String> {
            self.0.get(key).map(|value| (*value).to_owned())
        }
    }

    struct TestBaseDirs {
        home_dir: Option<PathBuf>,
    }

    impl BaseDirs for TestBaseDirs {
        fn home_dir(&self) -> Option<PathBuf> {
            self.home_dir.clone()
        }
    }

    #[fixture]
    fn dirs() -> TestBaseDirs {
        TestBaseDirs {
            home_dir: Some(PathBuf::from("/home/tester")),
        }
    }

    fn keyed_env() -> MapEnvironment {
        MapEnvironment::default().with(PUBKEY_ENV, "RWQenvkey")
    }

    #[rstest]
    fn defaults_apply_when_only_key_is_set(dirs: TestBaseDirs) {
        let config = UpdateConfig::resolve(&Cli::default(), &keyed_env(), &dirs).expect("config");
        assert_eq!(config.manifest_url, DEFAULT_MANIFEST_URL);
        assert_eq!(config.public_key, "RWQenvkey");
        assert_eq!(config.home, Utf8PathBuf::from("/home/tester/.quietpatch"));
        assert!(!config.allow_downgrade);
        assert_eq!(config.verifier, "minisign");
        assert_eq!(config.activator, "quietpatch");
        assert_eq!(config.command_timeout, None);
        assert_eq!(config.network_timeout, DEFAULT_NETWORK_TIMEOUT);
        assert_eq!(config.store().db_dir(), "/home/tester/.quietpatch/db");
        assert_eq!(config.state_path(), "/home/tester/.quietpatch/state.json");
    }

    #[rstest]
    fn environment_overrides_defaults(dirs: TestBaseDirs) {
        let env = keyed_env()
            .with(MANIFEST_URL_ENV, "https://mirror.example/manifest.json")
            .with(HOME_ENV, "/srv/qp")
            .with(ALLOW_DOWNGRADE_ENV, "1");
        let config = UpdateConfig::resolve(&Cli::default(), &env, &dirs).expect("config");
        assert_eq!(config.manifest_url, "https://mirror.example/manifest.json");
        assert_eq!(config.home, Utf8PathBuf::from("/srv/qp"));
        assert!(config.allow_downgrade);
    }

    #[rstest]
    fn environment_values_are_trimmed(dirs: TestBaseDirs) {
        let env = MapEnvironment::default()
            .with(PUBKEY_ENV, " RWQenvkey\n")
            .with(MANIFEST_URL_ENV, " https://mirror.example/manifest.json ")
            .with(HOME_ENV, "\t/srv/qp ");
        let config = UpdateConfig::resolve(&Cli::default(), &env, &dirs).expect("config");
        assert_eq!(config.manifest_url, "https://mirror.example/manifest.json");
        assert_eq!(config.public_key, "RWQenvkey");
        assert_eq!(config.home, Utf8PathBuf::from("/srv/qp"));
    }

    #[rstest]
    fn flags_override_environment(dirs: TestBaseDirs) {
        let env = keyed_env()
            .with(MANIFEST_URL_ENV, "https://env.example/manifest.json")
            .with(HOME_ENV, "/srv/env");
        let cli = Cli {
            manifest_url: Some("https://flag.example/manifest.json".to_owned()),
            pubkey: Some("RWQflagkey".to_owned()),
            home: Some(Utf8PathBuf::from("/srv/flag")),
            command_timeout: Some(45),
            network_timeout: Some(5),
            ..Cli::default()
        };
        let config = UpdateConfig::resolve(&cli, &env, &dirs).expect("config");
        assert_eq!(config.manifest_url, "https://flag.example/manifest.json");
        assert_eq!(config.public_key, "RWQflagkey");
        assert_eq!(config.home, Utf8PathBuf::from("/srv/flag"));
        assert_eq!(config.command_timeout, Some(Duration::from_secs(45)));
        assert_eq!(config.network_timeout, Duration::from_secs(5));
    }

    #[rstest]
    #[case::unset(MapEnvironment::default())]
    #[case::empty(MapEnvironment::default().with(PUBKEY_ENV, ""))]
    #[case::blank(MapEnvironment::default().with(PUBKEY_ENV, "   "))]
    fn missing_public_key_is_rejected(dirs: TestBaseDirs, #[case] env: MapEnvironment) {
        let err = UpdateConfig::resolve(&Cli::default(), &env, &dirs).expect_err("should fail");
        assert!(matches!(err, ConfigError::MissingPublicKey));
        assert!(err.to_string().contains(PUBKEY_ENV));
    }

    #[rstest]
    fn empty_manifest_url_falls_back_to_default(dirs: TestBaseDirs) {
        let env = keyed_env().with(MANIFEST_URL_ENV, "");
        let config = UpdateConfig::resolve(&Cli::default(), &env, &dirs).expect("config");
        assert_eq!(config.manifest_url, DEFAULT_MANIFEST_URL);
    }

    #[rstest]
    #[case::zero("0")]
    #[case::word("yes")]
    fn downgrade_requires_exact_opt_in(dirs: TestBaseDirs, #[case] value: &'static str) {
        let env = keyed_env().with(ALLOW_DOWNGRADE_ENV, value);
        let config = UpdateConfig::resolve(&Cli::default(), &env, &dirs).expect("config");
        assert!(!config.allow_downgrade);
    }

    #[test]
    fn missing_home_is_rejected() {
        let dirs = TestBaseDirs { home_dir: None };
        let err = UpdateConfig::resolve(&Cli::default(), &keyed_env(), &dirs)
            .expect_err("should fail");
        assert!(matches!(err, ConfigError::MissingHomeDirectory));
    }

    #[test]
    fn system_environment_reads_process_variables() {
        temp_env::with_vars(
            [
                ("QP_CATALOG_TEST_SET", Some("value")),
                ("QP_CATALOG_TEST_UNSET", None::<&str>),
            ],
            || {
                assert_eq!(
                    SystemEnvironment.var("QP_CATALOG_TEST_SET").as_deref(),
                    Some("value")
                );
                assert_eq!(SystemEnvironment.var("QP_CATALOG_TEST_UNSET"), None);
            },
        );
    }
}
