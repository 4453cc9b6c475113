// src/error.rs
//! Application error types with structured error handling.
//!
//! `AppError` covers failures that stop an operation outright (a batch call
//! that never reached the API, an output file that cannot be opened).
//! `ItemFailure` is different: it classifies a single slot of an otherwise
//! successful batch and travels inside the response so the owning job can
//! decide what to do with it.

use std::fmt;
use thiserror::Error;

/// Message fragment the Graph API uses when a request asks for too many rows.
pub const REDUCE_DATA_MESSAGE: &str = "Please reduce the amount of data you're asking for";

/// Why a single batch item failed.
///
/// This is not an error type; it is a classification of what the API said
/// about one sub-request, enabling the job to shrink and retry, or to log
/// and account for the item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemFailure {
    /// The request asked for more rows than the server allows.
    RequestTooLarge { message: String },
    /// Any other inline error object returned for the item.
    Api { code: Option<i64>, message: String },
    /// The batch returned `null` for this slot (the item timed out server-side).
    Missing,
    /// The item body was not valid JSON.
    UndecodableBody { cause: String },
}

impl ItemFailure {
    /// Classifies an inline `{"error": {...}}` object.
    pub fn from_inline_error(code: Option<i64>, message: impl Into<String>) -> Self {
        let message = message.into();
        if message.contains(REDUCE_DATA_MESSAGE) {
            Self::RequestTooLarge { message }
        } else {
            Self::Api { code, message }
        }
    }

    /// Whether shrinking the request's row limit may fix this failure.
    pub fn is_request_too_large(&self) -> bool {
        matches!(self, Self::RequestTooLarge { .. })
    }
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequestTooLarge { message } => write!(f, "request too large: {}", message),
            Self::Api {
                code: Some(code),
                message,
            } => write!(f, "api error {}: {}", code, message),
            Self::Api { code: None, message } => write!(f, "api error: {}", message),
            Self::Missing => write!(f, "no result returned for item"),
            Self::UndecodableBody { cause } => write!(f, "undecodable body: {}", cause),
        }
    }
}

/// Main application error type.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Missing configuration: {0}")]
    MissingConfiguration(String),

    #[error("Network failure: {0}")]
    NetworkFailure(#[from] reqwest::Error),

    #[error("Batch call rejected with HTTP {status}: {body}")]
    BatchRejected {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Filesystem IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No active job with id {0}")]
    UnknownJob(String),

    #[error("Internal error: {message}")]
    InternalError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error(transparent)]
    ValidationError(#[from] crate::types::ValidationError),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::MalformedResponse(err.to_string())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::InternalError {
            message: "Crawl worker task failed".to_string(),
            source: Some(Box::new(err)),
        }
    }
}

/// Result type alias for convenience
pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reduce_data_message_is_request_too_large() {
        let failure = ItemFailure::from_inline_error(
            Some(1),
            "Please reduce the amount of data you're asking for, then retry your request",
        );
        assert!(failure.is_request_too_large());
    }

    #[test]
    fn other_messages_are_generic_api_failures() {
        let failure = ItemFailure::from_inline_error(Some(100), "Unsupported get request.");
        assert_eq!(
            failure,
            ItemFailure::Api {
                code: Some(100),
                message: "Unsupported get request.".to_string()
            }
        );
        assert!(!failure.is_request_too_large());
        assert_eq!(failure.to_string(), "api error 100: Unsupported get request.");
    }
}
