//! Environment driven application configuration.
//!
//! The configuration is resolved once per process: [`app_config`] locates the
//! artifact for the current environment (see [`EnvSource`]), merges it with the
//! live environment and coerces the raw strings into a [`ResolvedConfig`]. The
//! result is memoized for the lifetime of the process.
//!
//! # Recognized keys
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `APP_ID` | Application identifier | `my-app` |
//! | `APP_ENV` / `NODE_ENV` | Environment name | `development` |
//! | `APP_DEBUG` | Enables verbose request logging | `false` |
//! | `APP_PORT` | HTTP port | `3000` |
//! | `LOG_LEVEL` / `APP_LOG_LEVEL` | One of error, warn, info, http, verbose, debug, silly | `info` |
//! | `CORS_CREDENTIALS` | Allow credentials in cross origin requests | `false` |
//! | `CORS_ORIGIN` | Comma separated list of origins or `*` | `*` |
//! | `APP_CONFIG_DIR` | Directory containing the config artifacts | `.` |

use once_cell::sync::OnceCell;
use serde::Serialize;
use std::env;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

pub mod coerce;
mod error;
mod source;

pub use error::ConfigError;
pub use source::{CONFIG_DIR_VAR, EnvSource, RawEnvironment, read_artifact};

/// Environment used if neither `APP_ENV` nor `NODE_ENV` is set.
pub const DEFAULT_ENV: &str = "development";

pub const DEFAULT_APP_ID: &str = "my-app";
pub const DEFAULT_DEBUG: bool = false;
pub const DEFAULT_PORT: i64 = 3000;
pub const DEFAULT_LOG_LEVEL: LogLevel = LogLevel::Info;
pub const DEFAULT_CORS_CREDENTIALS: bool = false;

/// Severity threshold for console logging.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Http,
    Verbose,
    Debug,
    Silly,
}

impl LogLevel {
    /// Maps the level onto a `tracing` filter directive.
    ///
    /// `tracing` has fewer levels, therefore `http`, `verbose` and `debug` share one.
    pub fn as_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Http | LogLevel::Verbose | LogLevel::Debug => "debug",
            LogLevel::Silly => "trace",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Http => "http",
            LogLevel::Verbose => "verbose",
            LogLevel::Debug => "debug",
            LogLevel::Silly => "silly",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "http" => Ok(LogLevel::Http),
            "verbose" => Ok(LogLevel::Verbose),
            "debug" => Ok(LogLevel::Debug),
            "silly" => Ok(LogLevel::Silly),
            other => Err(format!("Unknown log level '{}'", other)),
        }
    }
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Origins permitted for cross origin requests.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Origin {
    AllowAll,
    Single(String),
    List(Vec<String>),
}

impl Origin {
    /// Builds the variant matching the given list of entries.
    ///
    /// An empty list or a list containing `*` (or `true`) allows all origins.
    pub fn from_entries(mut entries: Vec<String>) -> Self {
        if entries.is_empty()
            || entries
                .iter()
                .any(|entry| entry == "*" || entry.eq_ignore_ascii_case("true"))
        {
            Origin::AllowAll
        } else if entries.len() == 1 {
            Origin::Single(entries.remove(0))
        } else {
            Origin::List(entries)
        }
    }

    pub fn allows(&self, origin: &str) -> bool {
        match self {
            Origin::AllowAll => true,
            Origin::Single(allowed) => allowed == origin,
            Origin::List(allowed) => allowed.iter().any(|allowed| allowed == origin),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CorsConfig {
    pub credentials: bool,
    pub origin: Origin,
}

/// The typed, immutable configuration snapshot of the process.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedConfig {
    pub app_id: String,
    pub env: String,
    pub debug: bool,
    /// Kept as configured; the valid port range is only enforced when binding.
    pub port: i64,
    pub log_level: LogLevel,
    pub cors: CorsConfig,
}

impl ResolvedConfig {
    /// Coerces the merged raw environment into typed fields, applying the defaults table.
    pub fn from_raw(env_name: &str, raw: &RawEnvironment) -> Self {
        let value = |key: &str| raw.get(key).map(String::as_str);
        let first_of = |keys: &[&str]| {
            keys.iter()
                .filter_map(|&key| value(key))
                .find(|value| !value.trim().is_empty())
        };

        let log_level = match first_of(&["LOG_LEVEL", "APP_LOG_LEVEL"]) {
            Some(level) => level.parse::<LogLevel>().unwrap_or_else(|err| {
                tracing::warn!("{}, using '{}'", err, DEFAULT_LOG_LEVEL);
                DEFAULT_LOG_LEVEL
            }),
            None => DEFAULT_LOG_LEVEL,
        };

        ResolvedConfig {
            app_id: coerce::parse_string(value("APP_ID"), DEFAULT_APP_ID),
            env: coerce::parse_string(first_of(&["APP_ENV", "NODE_ENV"]), env_name),
            debug: coerce::parse_bool(value("APP_DEBUG"), DEFAULT_DEBUG),
            port: coerce::parse_number(value("APP_PORT"), DEFAULT_PORT),
            log_level,
            cors: CorsConfig {
                credentials: coerce::parse_bool(
                    value("CORS_CREDENTIALS"),
                    DEFAULT_CORS_CREDENTIALS,
                ),
                origin: Origin::from_entries(coerce::parse_list(
                    value("CORS_ORIGIN"),
                    coerce::DEFAULT_LIST_SEPARATOR,
                )),
            },
        }
    }
}

/// Resolves a [`ResolvedConfig`] from an [`EnvSource`].
#[derive(Clone, Debug)]
pub struct ConfigResolver {
    source: EnvSource,
}

impl ConfigResolver {
    pub fn new(source: EnvSource) -> Self {
        ConfigResolver { source }
    }

    /// Loads the artifact for `env_name` and applies `overrides` on top.
    ///
    /// Precedence (lowest to highest): artifact, live environment, overrides.
    pub fn resolve(
        &self,
        env_name: &str,
        overrides: &RawEnvironment,
    ) -> Result<ResolvedConfig, ConfigError> {
        let mut raw = self.source.load(env_name)?;
        raw.extend(
            overrides
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );

        Ok(ResolvedConfig::from_raw(env_name, &raw))
    }
}

/// Holds a configuration which is resolved at most once.
///
/// Concurrent callers block until the first initialization has completed and
/// all observe the same instance. A failed initialization leaves the cell empty.
pub struct ConfigCell {
    cell: OnceCell<Arc<ResolvedConfig>>,
}

impl ConfigCell {
    pub const fn new() -> Self {
        ConfigCell {
            cell: OnceCell::new(),
        }
    }

    pub fn get(&self) -> Option<Arc<ResolvedConfig>> {
        self.cell.get().cloned()
    }

    /// Returns the cached configuration or runs `init` to create it.
    pub fn get_or_init_with<F>(&self, init: F) -> Result<Arc<ResolvedConfig>, ConfigError>
    where
        F: FnOnce() -> Result<ResolvedConfig, ConfigError>,
    {
        self.cell
            .get_or_try_init(|| init().map(Arc::new))
            .cloned()
    }
}

impl Default for ConfigCell {
    fn default() -> Self {
        Self::new()
    }
}

static APP_CONFIG: ConfigCell = ConfigCell::new();

/// Determines the environment name from `APP_ENV` or `NODE_ENV`.
pub fn env_name_from_process() -> String {
    ["APP_ENV", "NODE_ENV"]
        .iter()
        .filter_map(|key| env::var(key).ok())
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_ENV.to_string())
}

/// Returns the process wide configuration, resolving it on first access.
///
/// Subsequent calls return the cached snapshot.
pub fn app_config() -> Result<Arc<ResolvedConfig>, ConfigError> {
    APP_CONFIG.get_or_init_with(|| {
        ConfigResolver::new(EnvSource::from_process())
            .resolve(&env_name_from_process(), &RawEnvironment::new())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::capture::Capture;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use tempfile::TempDir;

    fn raw(entries: &[(&str, &str)]) -> RawEnvironment {
        entries
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    fn resolver_for(dir: &TempDir) -> ConfigResolver {
        ConfigResolver::new(EnvSource::new(dir.path()).with_live_environment(RawEnvironment::new()))
    }

    #[test]
    fn defaults_apply_to_empty_environment() {
        let config = ResolvedConfig::from_raw("development", &RawEnvironment::new());

        assert_eq!(config.app_id, "my-app");
        assert_eq!(config.env, "development");
        assert!(!config.debug);
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, LogLevel::Info);
        assert!(!config.cors.credentials);
        assert_eq!(config.cors.origin, Origin::AllowAll);
    }

    #[test]
    fn invalid_values_are_reported_as_warnings() {
        let capture = Capture::default();

        let config = tracing::subscriber::with_default(capture.subscriber(tracing::Level::INFO), || {
            ResolvedConfig::from_raw(
                "development",
                &raw(&[("APP_PORT", "abc"), ("LOG_LEVEL", "loud")]),
            )
        });

        let output = capture.contents();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert!(output.contains("WARN"), "{output}");
        assert!(output.contains("non-numeric configuration value 'abc'"), "{output}");
        assert!(output.contains("Unknown log level 'loud'"), "{output}");
    }

    #[test]
    fn app_config_is_resolved_once_per_process() {
        match (app_config(), app_config()) {
            (Ok(first), Ok(second)) => {
                assert!(Arc::ptr_eq(&first, &second));
                assert!(Arc::ptr_eq(&first, &APP_CONFIG.get().unwrap()));
            }
            (Err(_), Err(_)) => assert!(APP_CONFIG.get().is_none()),
            (first, second) => panic!("Diverging results: {first:?} / {second:?}"),
        }
    }

    #[test]
    fn typed_fields_are_coerced() {
        let config = ResolvedConfig::from_raw(
            "development",
            &raw(&[
                ("APP_ID", " shop "),
                ("APP_ENV", "staging"),
                ("APP_DEBUG", "Yes"),
                ("APP_PORT", "50001"),
                ("LOG_LEVEL", "HTTP"),
                ("CORS_CREDENTIALS", "1"),
                ("CORS_ORIGIN", "a,b"),
            ]),
        );

        assert_eq!(config.app_id, "shop");
        assert_eq!(config.env, "staging");
        assert!(config.debug);
        assert_eq!(config.port, 50001);
        assert_eq!(config.log_level, LogLevel::Http);
        assert!(config.cors.credentials);
        assert_eq!(
            config.cors.origin,
            Origin::List(vec!["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn node_env_and_app_log_level_are_accepted() {
        let config = ResolvedConfig::from_raw(
            "development",
            &raw(&[("NODE_ENV", "test"), ("APP_LOG_LEVEL", "debug")]),
        );

        assert_eq!(config.env, "test");
        assert_eq!(config.log_level, LogLevel::Debug);
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let config = ResolvedConfig::from_raw(
            "development",
            &raw(&[("APP_PORT", "not-a-port"), ("LOG_LEVEL", "chatty")]),
        );

        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
    }

    #[test]
    fn out_of_range_ports_are_kept_as_configured() {
        let config = ResolvedConfig::from_raw("development", &raw(&[("APP_PORT", "70000")]));

        assert_eq!(config.port, 70000);
    }

    #[test]
    fn origin_variants() {
        let origin = |value: &str| {
            ResolvedConfig::from_raw("development", &raw(&[("CORS_ORIGIN", value)])).cors.origin
        };

        assert_eq!(origin("*"), Origin::AllowAll);
        assert_eq!(origin(" "), Origin::AllowAll);
        assert_eq!(
            origin("https://example.com"),
            Origin::Single("https://example.com".to_string())
        );
        assert!(origin("a, b").allows("b"));
        assert!(!origin("a, b").allows("c"));
    }

    #[test]
    fn log_levels_map_to_filter_directives() {
        assert_eq!(LogLevel::Error.as_filter_directive(), "error");
        assert_eq!(LogLevel::Http.as_filter_directive(), "debug");
        assert_eq!(LogLevel::Silly.as_filter_directive(), "trace");
        assert_eq!("Verbose".parse::<LogLevel>(), Ok(LogLevel::Verbose));
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn resolve_prefers_environment_specific_artifact() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".env"), "APP_PORT=3001\n").unwrap();
        fs::write(dir.path().join("production.env"), "APP_PORT=50002\n").unwrap();

        let config = resolver_for(&dir)
            .resolve("production", &RawEnvironment::new())
            .unwrap();

        assert_eq!(config.port, 50002);
        assert_eq!(config.env, "production");
    }

    #[test]
    fn resolve_falls_back_to_default_artifact() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".env"), "APP_PORT=3001\n").unwrap();

        let config = resolver_for(&dir)
            .resolve("staging", &RawEnvironment::new())
            .unwrap();

        assert_eq!(config.port, 3001);
    }

    #[test]
    fn overrides_win_over_live_environment_and_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".env"), "APP_ID=file\nAPP_PORT=3001\n").unwrap();
        let resolver = ConfigResolver::new(
            EnvSource::new(dir.path())
                .with_live_environment(raw(&[("APP_ID", "live"), ("APP_PORT", "4000")])),
        );

        let config = resolver
            .resolve("development", &raw(&[("APP_PORT", "5000")]))
            .unwrap();

        assert_eq!(config.app_id, "live");
        assert_eq!(config.port, 5000);
    }

    #[test]
    fn resolve_propagates_missing_artifact() {
        let dir = TempDir::new().unwrap();

        let err = resolver_for(&dir)
            .resolve("production", &RawEnvironment::new())
            .unwrap_err();

        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn resolving_twice_yields_equal_snapshots() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".env"), "APP_ID=twice\nCORS_ORIGIN=a,b\n").unwrap();
        let resolver = resolver_for(&dir);

        let first = resolver.resolve("test", &RawEnvironment::new()).unwrap();
        let second = resolver.resolve("test", &RawEnvironment::new()).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn config_cell_ignores_later_arguments() {
        let cell = ConfigCell::new();

        let first = cell
            .get_or_init_with(|| Ok(ResolvedConfig::from_raw("development", &RawEnvironment::new())))
            .unwrap();
        let second = cell
            .get_or_init_with(|| Ok(ResolvedConfig::from_raw("production", &RawEnvironment::new())))
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.env, "development");
    }

    #[test]
    fn config_cell_stays_empty_after_failure() {
        let cell = ConfigCell::new();

        let result = cell.get_or_init_with(|| {
            Err(ConfigError::FileNotFound {
                env: "test".to_string(),
                searched: Vec::new(),
            })
        });

        assert!(result.is_err());
        assert!(cell.get().is_none());
    }

    #[test]
    fn concurrent_first_access_resolves_once() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".env"), "APP_ID=shared\n").unwrap();
        let resolver = resolver_for(&dir);
        let cell = ConfigCell::new();
        let resolutions = AtomicUsize::new(0);

        let configs = thread::scope(|scope| {
            let handles = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        cell.get_or_init_with(|| {
                            resolutions.fetch_add(1, Ordering::SeqCst);
                            resolver.resolve("development", &RawEnvironment::new())
                        })
                        .unwrap()
                    })
                })
                .collect::<Vec<_>>();

            handles
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .collect::<Vec<_>>()
        });

        assert_eq!(resolutions.load(Ordering::SeqCst), 1);
        assert!(configs.iter().all(|config| Arc::ptr_eq(config, &configs[0])));
        assert_eq!(configs[0].app_id, "shared");
    }
}
