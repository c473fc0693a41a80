//! Error types and helpers for mapping errors to HTTP responses.
//!
//! The [`ApiError`] type carries an HTTP status code and a message. Client errors
//! (4xx) are rendered as `fail` envelopes, everything else as `error` envelope.
//! Use [`ResultExt`] to attach status codes to `anyhow::Error` chains,
//! or the [`client_bail!`] and [`status_bail!`] macros for early returns.

use crate::web::disclosure::FailureReport;
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter};
use warp::http::StatusCode;
use warp::reject::Reject;

#[derive(Clone, Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    /// Key under which the message is reported in a `fail` envelope.
    pub subject: &'static str,
    /// Full error chain, only ever disclosed in verbose environments.
    pub detail: Option<String>,
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

impl Reject for ApiError {}

impl ApiError {
    pub fn new(status: StatusCode, message: impl ToString) -> Self {
        ApiError {
            status,
            message: message.to_string(),
            subject: "message",
            detail: None,
        }
    }

    /// The request body could not be parsed.
    pub fn malformed() -> Self {
        ApiError {
            subject: "body",
            ..ApiError::new(StatusCode::BAD_REQUEST, "malformed request")
        }
    }

    /// No route matched the request.
    pub fn not_found() -> Self {
        ApiError {
            subject: "endpoint",
            ..ApiError::new(StatusCode::NOT_FOUND, "resource not found")
        }
    }

    pub fn internal(err: &anyhow::Error) -> Self {
        ApiError {
            detail: Some(format!("{:?}", err)),
            ..ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, err)
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status.is_client_error()
    }

    /// The payload of the `fail` envelope for this error, e.g. `{"body": "malformed request"}`.
    pub fn fail_data(&self) -> Value {
        let mut data = Map::new();
        data.insert(self.subject.to_string(), Value::String(self.message.clone()));
        Value::Object(data)
    }

    pub fn report(&self) -> FailureReport {
        FailureReport {
            message: self.message.clone(),
            stack: self.detail.clone(),
        }
    }
}

/// Extension trait for attaching HTTP status codes to error results.
pub trait ResultExt<T> {
    /// Wraps the error with an [`ApiError`] carrying the given status code.
    fn with_status(self, status: StatusCode) -> Result<T, anyhow::Error>;

    /// Convenience method for `with_status(StatusCode::BAD_REQUEST)`.
    fn mark_client_error(self) -> Result<T, anyhow::Error>;
}

impl<T> ResultExt<T> for Result<T, anyhow::Error> {
    fn with_status(self, status: StatusCode) -> Result<T, anyhow::Error> {
        match self {
            Ok(t) => Ok(t),
            Err(err) => {
                let mut api_error = ApiError::new(status, format!("{:#}", err));
                if !status.is_client_error() {
                    api_error.detail = Some(format!("{:?}", err));
                }
                Err(err.context(api_error))
            }
        }
    }

    fn mark_client_error(self) -> Result<T, anyhow::Error> {
        self.with_status(StatusCode::BAD_REQUEST)
    }
}

/// Early return with a 400 Bad Request error.
#[macro_export]
macro_rules! client_bail {
    ($err:expr $(,)?) => {
        return $crate::web::error::ResultExt::mark_client_error(Err(::anyhow::anyhow!($err)))
    };
    ($fmt:expr, $($arg:tt)*) => {
        return $crate::web::error::ResultExt::mark_client_error(Err(::anyhow::anyhow!($fmt, $($arg)*)))
    };
}

/// Early return with a custom HTTP status code.
#[macro_export]
macro_rules! status_bail {
    ($status:expr, $msg:literal $(,)?) => {
        return $crate::web::error::ResultExt::with_status(Err(::anyhow::anyhow!($msg)), $status)
    };
    ($status:expr, $fmt:literal, $($arg:tt)*) => {
        return $crate::web::error::ResultExt::with_status(Err(::anyhow::anyhow!($fmt, $($arg)*)), $status)
    };
}
