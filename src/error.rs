use std::time::Duration;

use thiserror::Error;

/// Error types that can occur while grading prompts.
#[derive(Debug, Error)]
pub enum GradeError {
    /// HTTP request/response errors
    #[error("HTTP error: {0}")]
    HttpError(String),
    /// Authentication and authorization errors
    #[error("Auth error: {0}")]
    AuthError(String),
    /// Invalid request parameters or format
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    /// Errors returned by the model provider
    #[error("Provider error: {0}")]
    ProviderError(String),
    /// The provider is throttling the caller
    #[error("Rate limited by provider{}", retry_after_suffix(.retry_after))]
    RateLimited { retry_after: Option<Duration> },
    /// Model output did not match the expected structure
    #[error("Response format error: {message}. Raw response: {raw_response}")]
    ResponseFormatError {
        message: String,
        raw_response: String,
    },
    /// JSON serialization/deserialization errors
    #[error("JSON parse error: {0}")]
    JsonError(String),
    /// Retry attempts exceeded
    #[error("Retry attempts exceeded after {attempts} tries: {last_error}")]
    RetryExceeded { attempts: usize, last_error: String },
    /// Work was not started because the batch was cancelled
    #[error("Cancelled before evaluation started")]
    Cancelled,
    /// Generic error
    #[error("Generic error: {0}")]
    Generic(String),
}

impl GradeError {
    /// Builds a `ResponseFormatError` keeping the raw model text for diagnostics.
    pub fn malformed(message: impl Into<String>, raw_response: impl Into<String>) -> Self {
        GradeError::ResponseFormatError {
            message: message.into(),
            raw_response: raw_response.into(),
        }
    }

    /// Whether the provider signalled throttling. Only these errors are retried.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, GradeError::RateLimited { .. })
    }

    /// Whether the model answered but the answer could not be parsed.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            GradeError::ResponseFormatError { .. } | GradeError::JsonError(_)
        )
    }

    /// Delay the provider asked for, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            GradeError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

fn retry_after_suffix(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(delay) => format!(" (retry after {}s)", delay.as_secs()),
        None => String::new(),
    }
}

/// Converts reqwest HTTP errors into GradeErrors
impl From<reqwest::Error> for GradeError {
    fn from(err: reqwest::Error) -> Self {
        if err.status() == Some(reqwest::StatusCode::TOO_MANY_REQUESTS) {
            return GradeError::RateLimited { retry_after: None };
        }
        GradeError::HttpError(err.to_string())
    }
}

impl From<serde_json::Error> for GradeError {
    fn from(err: serde_json::Error) -> Self {
        GradeError::JsonError(format!(
            "{} at line {} column {}",
            err,
            err.line(),
            err.column()
        ))
    }
}
