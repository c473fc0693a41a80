//! The uniform response envelope used for every response body.
//!
//! Three shapes exist (following the JSend convention):
//!
//! ```text
//! {"status":"success","data":<T>}
//! {"status":"fail","data":<T>}
//! {"status":"error","message":<string>,"code":<int|null>,"data":<T|null>}
//! ```
//!
//! `fail` signals a problem caused by the client, `error` a failure on the server side.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Envelope<T> {
    Success {
        data: T,
    },
    Fail {
        data: T,
    },
    Error {
        message: String,
        code: Option<i64>,
        data: Option<T>,
    },
}

/// Optional parts of an `error` envelope. Both default to `null`.
#[derive(Clone, Debug, PartialEq)]
pub struct ErrorOptions<T> {
    pub code: Option<i64>,
    pub data: Option<T>,
}

impl<T> Default for ErrorOptions<T> {
    fn default() -> Self {
        ErrorOptions {
            code: None,
            data: None,
        }
    }
}

impl<T> ErrorOptions<T> {
    pub fn with_code(mut self, code: i64) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_data(mut self, data: T) -> Self {
        self.data = Some(data);
        self
    }
}

impl<T> Envelope<T> {
    pub fn success(data: T) -> Self {
        Envelope::Success { data }
    }

    pub fn fail(data: T) -> Self {
        Envelope::Fail { data }
    }

    pub fn error(message: impl Into<String>, options: ErrorOptions<T>) -> Self {
        Envelope::Error {
            message: message.into(),
            code: options.code,
            data: options.data,
        }
    }

    /// The value of the `status` discriminant.
    pub fn status(&self) -> &'static str {
        match self {
            Envelope::Success { .. } => "success",
            Envelope::Fail { .. } => "fail",
            Envelope::Error { .. } => "error",
        }
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            Envelope::Success { data } | Envelope::Fail { data } => Some(data),
            Envelope::Error { data, .. } => data,
        }
    }

    /// Sets the code of an `error` envelope. Other variants carry no code and are returned as is.
    pub fn with_code(self, new_code: i64) -> Self {
        match self {
            Envelope::Error { message, data, .. } => Envelope::Error {
                message,
                code: Some(new_code),
                data,
            },
            other => other,
        }
    }
}
