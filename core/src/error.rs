//! Error types surfaced through query results.
//!
//! # Design
//! Nothing in the hook layer creates, retries or reclassifies errors: every
//! variant originates in a request function or in the HTTP transport and is
//! carried unchanged to the caller. `ApiError` is `Clone` because the same
//! failure is handed to every caller sharing a cache key.

use thiserror::Error;

/// Errors produced while executing a query's request function.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The server answered with a non-2xx status. The optional fields are
    /// read from a `{statusCode, message, error}` JSON body when present.
    #[error("transport error (status {}): {}", display_status(.status_code), .message.as_deref().unwrap_or("no message"))]
    Transport {
        status_code: Option<u16>,
        message: Option<String>,
        error: Option<String>,
    },

    /// The request never produced a response (connection refused, timeout).
    #[error("network failure: {0}")]
    Network(String),

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// Request parameters could not be serialized.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Any other failure raised by a custom request function.
    #[error("{0}")]
    Request(String),
}

impl ApiError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Transport { status_code, .. } => *status_code,
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }
}

fn display_status(status: &Option<u16>) -> String {
    status.map_or_else(|| "unknown".to_string(), |s| s.to_string())
}
