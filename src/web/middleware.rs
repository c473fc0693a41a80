//! Filters which run in front of (or around) every route.

use crate::config::{CorsConfig, Origin};
use crate::web::warp::with_cloneable;
use std::convert::Infallible;
use warp::Filter;
use warp::http::header::{
    HeaderName, HeaderValue, REFERRER_POLICY, X_CONTENT_TYPE_OPTIONS, X_DNS_PREFETCH_CONTROL,
    X_FRAME_OPTIONS,
};
use warp::http::uri::Authority;
use warp::http::{HeaderMap, Method};
use warp::path::FullPath;

const CORS_METHODS: [&str; 6] = ["GET", "HEAD", "PUT", "PATCH", "POST", "DELETE"];
const CORS_HEADERS: [&str; 3] = ["content-type", "authorization", "x-requested-with"];

/// Logs the details of modifying requests if `debug` is enabled.
///
/// The remote address is part of the access log written by the server.
pub fn log_request_details(debug: bool) -> impl Filter<Extract = (), Error = Infallible> + Clone {
    warp::method()
        .and(warp::path::full())
        .and(warp::header::headers_cloned())
        .and(with_cloneable(debug))
        .map(
            |method: Method, path: FullPath, headers: HeaderMap, debug: bool| {
                if debug && matches!(method, Method::POST | Method::PUT | Method::PATCH) {
                    tracing::debug!(
                        http.method = %method,
                        http.url = %path.as_str(),
                        headers = ?headers,
                        "Received {} {}",
                        method,
                        path.as_str()
                    );
                }
            },
        )
        .untuple_one()
}

/// Builds the CORS filter from the configuration.
///
/// Configured origins which are not of the form `scheme://host[:port]` are skipped.
pub fn cors(config: &CorsConfig) -> warp::cors::Builder {
    let builder = warp::cors()
        .allow_methods(CORS_METHODS)
        .allow_headers(CORS_HEADERS)
        .allow_credentials(config.credentials);

    match &config.origin {
        Origin::AllowAll => builder.allow_any_origin(),
        Origin::Single(origin) => builder.allow_origins(valid_origins(std::slice::from_ref(origin))),
        Origin::List(origins) => builder.allow_origins(valid_origins(origins)),
    }
}

fn valid_origins(origins: &[String]) -> Vec<&str> {
    origins
        .iter()
        .map(String::as_str)
        .filter(|origin| {
            let valid = is_valid_origin(origin);
            if !valid {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
            }
            valid
        })
        .collect()
}

pub fn is_valid_origin(origin: &str) -> bool {
    match origin.split_once("://") {
        Some((scheme, authority)) => {
            !scheme.is_empty()
                && scheme.chars().all(|ch| ch.is_ascii_alphanumeric() || "+-.".contains(ch))
                && !authority.contains(['/', '@'])
                && authority.parse::<Authority>().is_ok()
        }
        None => false,
    }
}

/// Headers added to every response.
pub fn security_headers() -> HeaderMap {
    let headers: [(HeaderName, &'static str); 4] = [
        (X_CONTENT_TYPE_OPTIONS, "nosniff"),
        (X_FRAME_OPTIONS, "SAMEORIGIN"),
        (REFERRER_POLICY, "no-referrer"),
        (X_DNS_PREFETCH_CONTROL, "off"),
    ];

    headers
        .into_iter()
        .map(|(name, value)| (name, HeaderValue::from_static(value)))
        .collect()
}
