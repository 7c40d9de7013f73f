//! Runtime error types.

use thiserror::Error;

use peerpipe_framework::SessionError;

pub use crate::config::{ConfigError, ConfigResult};

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The pipe session failed.
    #[error("Pipe session error: {0}")]
    Session(#[from] SessionError),

    /// The builder was not given a transport.
    #[error("No transport configured for the runtime")]
    MissingTransport,

    /// Waiting for a shutdown signal failed.
    #[error("Failed to listen for shutdown signal: {0}")]
    Signal(#[from] std::io::Error),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
