//! Configuration for peerpipe services.
//!
//! Layered loading (defaults, files, environment, code) and validation of
//! the pipe session and logging settings.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile};
pub use schema::{
    LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, PeerpipeConfig, PipeSettings,
    SpanEventConfig,
};
pub use validation::validate_config;
