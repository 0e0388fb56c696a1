//! Fleet sync configuration loaded via OrthoConfig.
//!
//! Values layer from `FASTPAY_*` environment variables and config files. The
//! sync CLIs apply their own flags on top after loading.

use std::env;
use std::ffi::OsString;
use std::net::SocketAddr;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

/// Fallback variable consulted when no prefixed database URL is set.
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_FIREBASE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_KEEP_LATEST: usize = 100;

/// Errors raised while interpreting loaded settings.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    /// The settings layers could not be merged.
    #[error("failed to load settings: {message}")]
    Load { message: String },
    /// No database URL was configured anywhere.
    #[error("database URL missing: set --database-url, FASTPAY_DATABASE_URL or DATABASE_URL")]
    MissingDatabaseUrl,
    /// A configured value could not be parsed.
    #[error("invalid {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

/// Configuration shared by the server and the sync CLIs.
#[derive(Debug, Clone, Default, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "FASTPAY")]
pub struct FleetSyncSettings {
    /// PostgreSQL connection URL.
    pub database_url: Option<String>,
    /// Realtime Database root URL, e.g. `https://project.firebaseio.com/`.
    pub firebase_database_url: Option<String>,
    /// Database secret or ID token appended as the `auth` query parameter.
    pub firebase_auth_token: Option<String>,
    /// Whole-request timeout for Firebase calls.
    pub firebase_timeout_secs: Option<u64>,
    /// Socket address the HTTP server binds to.
    pub bind_addr: Option<String>,
    /// Messages kept in Firebase after a messages-only sync.
    pub default_keep_latest: Option<usize>,
    /// Apply embedded migrations before serving.
    #[ortho_config(default = false)]
    pub run_migrations: bool,
}

impl FleetSyncSettings {
    /// Load settings from the environment and config files only.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Load`] when a layer cannot be parsed.
    pub fn load_ambient(program: &str) -> Result<Self, SettingsError> {
        Self::load_from_iter([OsString::from(program)]).map_err(|error| SettingsError::Load {
            message: error.to_string(),
        })
    }

    /// Resolve the database URL, preferring `explicit`, then the loaded
    /// value, then `DATABASE_URL`.
    ///
    /// # Errors
    ///
    /// Returns an error when the explicit value is blank or nothing is set.
    pub fn resolve_database_url(&self, explicit: Option<String>) -> Result<String, SettingsError> {
        if let Some(value) = explicit {
            if value.trim().is_empty() {
                return Err(SettingsError::Invalid {
                    field: "database_url",
                    message: "--database-url must not be empty when provided".to_owned(),
                });
            }
            return Ok(value);
        }
        self.database_url
            .clone()
            .or_else(|| env::var(DATABASE_URL_ENV).ok())
            .filter(|value| !value.trim().is_empty())
            .ok_or(SettingsError::MissingDatabaseUrl)
    }

    /// Parsed Firebase root URL; `None` when unset or blank.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Invalid`] when the value is not a URL.
    pub fn firebase_url(&self) -> Result<Option<Url>, SettingsError> {
        self.firebase_database_url
            .as_deref()
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .map(|raw| {
                Url::parse(raw).map_err(|error| SettingsError::Invalid {
                    field: "firebase_database_url",
                    message: error.to_string(),
                })
            })
            .transpose()
    }

    /// Firebase request timeout, defaulting to thirty seconds.
    pub fn firebase_timeout(&self) -> Duration {
        Duration::from_secs(
            self.firebase_timeout_secs
                .unwrap_or(DEFAULT_FIREBASE_TIMEOUT_SECS),
        )
    }

    /// Parsed bind address, defaulting to `0.0.0.0:8080`.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Invalid`] when the address does not parse.
    pub fn bind_addr(&self) -> Result<SocketAddr, SettingsError> {
        self.bind_addr
            .as_deref()
            .unwrap_or(DEFAULT_BIND_ADDR)
            .parse()
            .map_err(|error: std::net::AddrParseError| SettingsError::Invalid {
                field: "bind_addr",
                message: error.to_string(),
            })
    }

    /// Messages retained in Firebase after cleanup.
    pub fn keep_latest(&self) -> usize {
        self.default_keep_latest.unwrap_or(DEFAULT_KEEP_LATEST)
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for settings parsing and fallbacks.

    use super::*;

    use env_lock::lock_env;
    use rstest::rstest;

    const VARS: [&str; 8] = [
        "FASTPAY_DATABASE_URL",
        "FASTPAY_FIREBASE_DATABASE_URL",
        "FASTPAY_FIREBASE_AUTH_TOKEN",
        "FASTPAY_FIREBASE_TIMEOUT_SECS",
        "FASTPAY_BIND_ADDR",
        "FASTPAY_DEFAULT_KEEP_LATEST",
        "FASTPAY_RUN_MIGRATIONS",
        DATABASE_URL_ENV,
    ];

    fn cleared() -> Vec<(&'static str, Option<String>)> {
        VARS.iter().map(|name| (*name, None::<String>)).collect()
    }

    fn load() -> FleetSyncSettings {
        FleetSyncSettings::load_ambient("fastpay-backend").expect("settings should load")
    }

    #[rstest]
    fn defaults_apply_when_nothing_is_set() {
        let _guard = lock_env(cleared());

        let settings = load();
        assert!(!settings.run_migrations);
        assert_eq!(settings.keep_latest(), 100);
        assert_eq!(settings.firebase_timeout(), Duration::from_secs(30));
        assert_eq!(
            settings.bind_addr().expect("default parses"),
            "0.0.0.0:8080".parse::<SocketAddr>().expect("literal parses")
        );
        assert_eq!(settings.firebase_url(), Ok(None));
        assert_eq!(
            settings.resolve_database_url(None),
            Err(SettingsError::MissingDatabaseUrl)
        );
    }

    #[rstest]
    fn environment_overrides_are_respected() {
        let mut vars = cleared();
        vars.extend([
            ("FASTPAY_DATABASE_URL", Some("postgres://fleet".to_owned())),
            (
                "FASTPAY_FIREBASE_DATABASE_URL",
                Some("https://fleet.firebaseio.com/".to_owned()),
            ),
            ("FASTPAY_FIREBASE_TIMEOUT_SECS", Some("5".to_owned())),
            ("FASTPAY_DEFAULT_KEEP_LATEST", Some("20".to_owned())),
            ("FASTPAY_RUN_MIGRATIONS", Some("true".to_owned())),
        ]);
        let _guard = lock_env(vars);

        let settings = load();
        assert!(settings.run_migrations);
        assert_eq!(settings.keep_latest(), 20);
        assert_eq!(settings.firebase_timeout(), Duration::from_secs(5));
        assert_eq!(
            settings
                .firebase_url()
                .expect("url parses")
                .map(|url| url.to_string()),
            Some("https://fleet.firebaseio.com/".to_owned())
        );
        assert_eq!(
            settings.resolve_database_url(None),
            Ok("postgres://fleet".to_owned())
        );
    }

    #[rstest]
    fn database_url_falls_back_to_plain_variable() {
        let mut vars = cleared();
        vars.push((DATABASE_URL_ENV, Some("postgres://fallback".to_owned())));
        let _guard = lock_env(vars);

        assert_eq!(
            load().resolve_database_url(None),
            Ok("postgres://fallback".to_owned())
        );
    }

    #[rstest]
    #[case(Some("postgres://flag".to_owned()), Ok("postgres://flag".to_owned()))]
    #[case(Some("   ".to_owned()), Err("database_url"))]
    fn explicit_database_url_wins(
        #[case] explicit: Option<String>,
        #[case] expected: Result<String, &str>,
    ) {
        let settings = FleetSyncSettings {
            database_url: Some("postgres://loaded".to_owned()),
            ..FleetSyncSettings::default()
        };
        match (settings.resolve_database_url(explicit), expected) {
            (Ok(url), Ok(want)) => assert_eq!(url, want),
            (Err(SettingsError::Invalid { field, .. }), Err(want)) => assert_eq!(field, want),
            (other, want) => panic!("unexpected {other:?} for {want:?}"),
        }
    }

    #[rstest]
    #[case::bad_firebase_url("firebase_database_url")]
    #[case::bad_bind_addr("bind_addr")]
    fn malformed_values_are_reported(#[case] field: &str) {
        let settings = FleetSyncSettings {
            firebase_database_url: Some("not a url".to_owned()),
            bind_addr: Some("nowhere".to_owned()),
            ..FleetSyncSettings::default()
        };
        let error = match field {
            "bind_addr" => settings.bind_addr().map(|_| ()),
            _ => settings.firebase_url().map(|_| ()),
        }
        .expect_err("value should be rejected");
        assert!(matches!(error, SettingsError::Invalid { field: got, .. } if got == field));
    }
}
