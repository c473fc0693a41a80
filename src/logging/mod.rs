//! Tracing and logging infrastructure.
//!
//! [`setup_tracing`] is called twice during startup: once with the default level, so
//! that diagnostics of the configuration resolution are reported, and once more with
//! the configured level:
//!
//! ```rust,ignore
//! http_scaffold::logging::setup_tracing(DEFAULT_LOG_LEVEL);
//! let config = http_scaffold::config::app_config()?;
//! http_scaffold::logging::setup_tracing(config.log_level);
//! ```
//!
//! The configured [`LogLevel`] is used as console filter unless `RUST_LOG` is set,
//! which always takes precedence.
//!
//! Without the `pretty_logs` feature, output is plain text suitable for log aggregation:
//! ```text
//! 2026-10-18T14:32:01.234 INFO  http_scaffold::web::warp: 200 GET - / - 127.0.0.1:51234 - 0.412 ms [http_request{http.method=GET}]
//! ```
//!
//! With `pretty_logs`, output is colorized with timestamps and span nesting:
//! ```text
//! 14:32:01.234 INFO  | http_scaffold::web::warp: 200 GET - / - 127.0.0.1:51234 - 0.412 ms
//! ```

use crate::config::LogLevel;
use std::sync::OnceLock;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, reload};

#[cfg(feature = "pretty_logs")]
use tracing_subscriber::fmt::format::FmtSpan;

#[cfg(not(feature = "pretty_logs"))]
mod production;

#[cfg(feature = "pretty_logs")]
mod pretty;

#[cfg(test)]
pub(crate) mod capture;

static CONSOLE_FILTER: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

/// Installs the console subscriber or, if it is already installed, switches it to `level`.
///
/// This permits installing logging with a default level before the configuration is
/// resolved (so that its warnings are visible) and applying the configured level afterwards.
pub fn setup_tracing(level: LogLevel) {
    let mut installed = false;
    let handle = CONSOLE_FILTER.get_or_init(|| {
        installed = true;
        install_console_subscriber(level)
    });

    if !installed {
        match handle.reload(console_filter(level)) {
            Ok(()) => tracing::debug!("Console log level set to '{}'", level),
            Err(err) => eprintln!("Failed to change the log level: {}", err),
        }
    }
}

fn install_console_subscriber(level: LogLevel) -> reload::Handle<EnvFilter, Registry> {
    let (filter, handle) = reload::Layer::new(console_filter(level));
    let console_layer = setup_console_layer().with_filter(filter);

    match Registry::default().with(console_layer).try_init() {
        Ok(()) => tracing::info!(
            "Tracing initialized successfully [reporting to console with level '{}']",
            level
        ),
        Err(err) => eprintln!("Skipping tracing setup: {}", err),
    }

    handle
}

/// Builds the console filter: `RUST_LOG` if present, the configured level otherwise.
fn console_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_filter_directive()))
}

#[cfg(feature = "pretty_logs")]
fn setup_console_layer() -> Box<dyn Layer<Registry> + Send + Sync + 'static> {
    tracing_subscriber::fmt::layer()
        .with_span_events(FmtSpan::NEW)
        .event_format(pretty::PrettyConsoleLogFormat)
        .boxed()
}

#[cfg(not(feature = "pretty_logs"))]
fn setup_console_layer() -> Box<dyn Layer<Registry> + Send + Sync + 'static> {
    tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .event_format(production::ProductionLogFormat)
        .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_level_is_used_as_filter() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }

        assert_eq!(console_filter(LogLevel::Warn).to_string(), "warn");
        assert_eq!(console_filter(LogLevel::Silly).to_string(), "trace");
    }
}
