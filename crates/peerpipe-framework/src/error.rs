//! Error types for the peerpipe framework.

use std::time::Duration;

use thiserror::Error;

use peerpipe_core::TransportError;

/// Errors raised while registering routes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// The path pattern cannot be compiled.
    #[error("invalid path pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// What is wrong with it.
        reason: String,
    },
}

impl RouteError {
    pub(crate) fn invalid(pattern: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors raised by the pipe session lifecycle.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// The pipe was used before `init()`.
    #[error("pipe has not been initialized, call init() first")]
    NotInitialized,

    /// The pipe was used after `close()`.
    #[error("pipe is closed")]
    Closed,

    /// The transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Errors raised by an outbound request.
///
/// None of these are ever placed on the wire; they only reach the local
/// caller of `send`.
#[derive(Debug, Error)]
pub enum SendError {
    /// No reply carrying the request id arrived in time.
    #[error("timeout achieved, no response received for request id {id} within {timeout:?}")]
    Timeout {
        /// Correlation id of the request.
        id: String,
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// The request could not be encoded.
    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),

    /// The transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The pipe is not in a state that allows sending.
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl SendError {
    /// Returns true if the request timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Result type for outbound requests.
pub type SendResult<T> = Result<T, SendError>;
