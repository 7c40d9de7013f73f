//! Error types shared by every peerpipe component.
//!
//! Two families live here:
//!
//! - [`PipeError`] is the structured error a handler raises to answer with a
//!   specific code and body. It is the only error that ever reaches the wire.
//! - [`TransportError`] and [`MalformedMessage`] are local failures. They are
//!   logged or returned to the local caller, never transmitted.

use serde_json::{Value, json};
use thiserror::Error;

use crate::envelope::{PipeResponse, ResponseCode};

// =============================================================================
// Pipe Errors
// =============================================================================

/// A structured error carrying the response code and body to send back.
///
/// Handlers return it (directly or through `anyhow::Error`) and the
/// dispatcher passes its code and body through unchanged.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("pipe error {code}{}", .body.as_ref().map(|b| format!(": {b}")).unwrap_or_default())]
pub struct PipeError {
    /// Response code to answer with.
    pub code: ResponseCode,
    /// Response body to answer with.
    pub body: Option<Value>,
}

impl PipeError {
    /// Creates a pipe error with an arbitrary code and body.
    pub fn new(code: ResponseCode, body: Option<Value>) -> Self {
        Self { code, body }
    }

    /// 400 with a `{ message }` body.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::with_message(ResponseCode::BAD_REQUEST, message)
    }

    /// 400 carrying per-field validation issues.
    ///
    /// The body has the shape `{ "message": "Validation error", "body": issues }`.
    pub fn validation(issues: Value) -> Self {
        Self::new(
            ResponseCode::BAD_REQUEST,
            Some(json!({
                "message": "Validation error",
                "body": issues,
            })),
        )
    }

    /// 401 with a `{ message }` body.
    pub fn not_authorized(message: impl Into<String>) -> Self {
        Self::with_message(ResponseCode::NOT_AUTHORIZED, message)
    }

    /// 404 with a `{ message }` body.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::with_message(ResponseCode::NOT_FOUND, message)
    }

    /// 500 with a caller-chosen `{ message }` body.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_message(ResponseCode::INTERNAL_SERVER_ERROR, message)
    }

    fn with_message(code: ResponseCode, message: impl Into<String>) -> Self {
        Self::new(code, Some(json!({ "message": message.into() })))
    }

    /// Builds the response envelope answering request `id`.
    pub fn into_response(self, id: impl Into<String>) -> PipeResponse {
        PipeResponse {
            id: id.into(),
            code: self.code,
            body: self.body,
        }
    }
}

// =============================================================================
// Transport Errors
// =============================================================================

/// Errors reported by a transport implementation.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The transport has not been initialized.
    #[error("transport not initialized")]
    NotInitialized,

    /// A channel to the peer could not be opened.
    #[error("cannot open channel to '{peer}': {reason}")]
    ChannelUnavailable {
        /// The peer identity.
        peer: String,
        /// Reason for failure.
        reason: String,
    },

    /// Message send failed.
    #[error("failed to send message: {0}")]
    SendFailed(String),

    /// Subscribing to inbound messages failed.
    #[error("failed to subscribe: {0}")]
    SubscribeFailed(String),

    /// Connection closed.
    #[error("connection closed: {reason}")]
    ConnectionClosed {
        /// Reason for closure.
        reason: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl TransportError {
    /// Creates a connection-closed error.
    pub fn closed(reason: impl Into<String>) -> Self {
        Self::ConnectionClosed {
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

// =============================================================================
// Decode Errors
// =============================================================================

/// An inbound message that could not be decoded as an envelope.
///
/// Malformed messages are dropped where they are received: without a
/// readable id there is nobody to answer.
#[derive(Debug, Error)]
pub enum MalformedMessage {
    /// The payload is not a valid envelope.
    #[error("invalid envelope: {0}")]
    Json(#[from] serde_json::Error),

    /// The request path cannot be parsed.
    #[error("invalid request path '{path}': {reason}")]
    InvalidPath {
        /// The offending path.
        path: String,
        /// Parser message.
        reason: String,
    },
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_body_shape() {
        let err = PipeError::validation(json!([{"path": ["name"], "message": "required"}]));
        assert_eq!(err.code, ResponseCode::BAD_REQUEST);
        assert_eq!(
            err.body,
            Some(json!({
                "message": "Validation error",
                "body": [{"path": ["name"], "message": "required"}],
            }))
        );
    }

    #[test]
    fn test_into_response_keeps_code_and_body() {
        let res = PipeError::not_authorized("nope").into_response("req-1");
        assert_eq!(res.id, "req-1");
        assert_eq!(res.code, ResponseCode::NOT_AUTHORIZED);
        assert_eq!(res.body, Some(json!({"message": "nope"})));
    }

    #[test]
    fn test_display() {
        let err = PipeError::new(ResponseCode::NOT_FOUND, None);
        assert_eq!(err.to_string(), "pipe error 404 Not Found");
        let err = PipeError::bad_request("bad");
        assert_eq!(
            err.to_string(),
            r#"pipe error 400 Bad Request: {"message":"bad"}"#
        );
    }
}
