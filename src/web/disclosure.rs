//! Converts internal failures into `error` envelopes.
//!
//! How much of a failure is disclosed depends on the environment: verbose
//! environments (`development` by default) receive the original message along
//! with the stack / error chain, all others only a generic message.

use crate::config::DEFAULT_ENV;
use crate::web::envelope::{Envelope, ErrorOptions};

/// Message used whenever the details of a failure must not be disclosed.
pub const GENERIC_ERROR_MESSAGE: &str = "internal server error";

/// The parts of a failure which may be reported to a client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailureReport {
    pub message: String,
    pub stack: Option<String>,
}

impl FailureReport {
    pub fn new(message: impl Into<String>) -> Self {
        FailureReport {
            message: message.into(),
            stack: None,
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }
}

impl From<&anyhow::Error> for FailureReport {
    fn from(err: &anyhow::Error) -> Self {
        FailureReport {
            message: err.to_string(),
            stack: Some(format!("{:?}", err)),
        }
    }
}

/// Decides which environments may see failure details.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorTranslator {
    verbose_environments: Vec<String>,
}

impl Default for ErrorTranslator {
    fn default() -> Self {
        ErrorTranslator {
            verbose_environments: vec![DEFAULT_ENV.to_string()],
        }
    }
}

impl ErrorTranslator {
    pub fn with_verbose_environments<I, S>(environments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ErrorTranslator {
            verbose_environments: environments.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_verbose(&self, env: &str) -> bool {
        self.verbose_environments.iter().any(|verbose| verbose == env)
    }

    /// Builds the `error` envelope for `failure`.
    ///
    /// The `code` is left empty, callers set it via [`Envelope::with_code`].
    pub fn translate(&self, env: &str, failure: &FailureReport) -> Envelope<String> {
        if self.is_verbose(env) {
            let options = ErrorOptions {
                code: None,
                data: failure.stack.clone(),
            };
            Envelope::error(failure.message.clone(), options)
        } else {
            Envelope::error(GENERIC_ERROR_MESSAGE, ErrorOptions::default())
        }
    }
}

/// Translates using the default policy (only `development` is verbose).
pub fn translate(env: &str, failure: &FailureReport) -> Envelope<String> {
    ErrorTranslator::default().translate(env, failure)
}
