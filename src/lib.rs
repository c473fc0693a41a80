//! A minimal HTTP service scaffold.
//!
//! Configuration is resolved from environment specific artifacts (`{env}.env`,
//! `.env.{env}`, `config.{env}.yaml`, falling back to `.env` / `config.yaml`),
//! overlaid by the live process environment:
//!
//! | Variable           | Default       | Meaning                                   |
//! |--------------------|---------------|-------------------------------------------|
//! | `APP_ENV`          | `development` | Environment name (`NODE_ENV` as fallback) |
//! | `APP_CONFIG_DIR`   | `.`           | Directory searched for config artifacts   |
//! | `APP_ID`           | `my-app`      | Identifier of the application             |
//! | `APP_PORT`         | `3000`        | Port of the HTTP server                   |
//! | `LOG_LEVEL`        | `info`        | error, warn, info, http, verbose, debug, silly |
//! | `APP_DEBUG`        | `false`       | Logs details of modifying requests        |
//! | `CORS_ORIGIN`      | `*`           | Allowed origin(s), comma separated        |
//! | `CORS_CREDENTIALS` | `false`       | Allows credentials in CORS requests       |
//!
//! `RUST_LOG` takes precedence over `LOG_LEVEL` if present.

use crate::config::{ConfigError, DEFAULT_LOG_LEVEL, ResolvedConfig};
use std::sync::Arc;

pub mod config;
pub mod console;
pub mod logging;
pub mod tools;
pub mod web;

/// Resolves the process wide configuration and sets up logging accordingly.
///
/// Shared by all binaries so that they observe the same configuration.
pub fn bootstrap() -> Result<Arc<ResolvedConfig>, ConfigError> {
    // Logging is up before resolving, otherwise warnings about invalid values are lost.
    logging::setup_tracing(DEFAULT_LOG_LEVEL);
    let config = config::app_config()?;
    logging::setup_tracing(config.log_level);
    tracing::debug!(
        "Resolved configuration for '{}' ({})",
        config.app_id,
        config.env
    );

    Ok(config)
}
