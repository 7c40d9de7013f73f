//! Configuration schema definitions.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use peerpipe_core::Identity;
use peerpipe_framework::PipeConfig;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PeerpipeConfig {
    /// Pipe session settings.
    #[serde(default)]
    pub pipe: PipeSettings,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

// =============================================================================
// Pipe
// =============================================================================

/// Settings of the pipe session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipeSettings {
    /// This endpoint's own peer identity.
    #[serde(default)]
    pub identity: String,

    /// Default reply timeout for outbound requests, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Delay between subscribing to a conversation and transmitting, in milliseconds.
    #[serde(default = "default_grace_ms")]
    pub grace_ms: u64,

    /// Compare peer identities ignoring ASCII case.
    #[serde(default)]
    pub case_insensitive_identity: bool,
}

impl Default for PipeSettings {
    fn default() -> Self {
        Self {
            identity: String::new(),
            timeout_ms: default_timeout_ms(),
            grace_ms: default_grace_ms(),
            case_insensitive_identity: false,
        }
    }
}

impl PipeSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }

    /// Builds the identity check described by these settings.
    pub fn to_identity(&self) -> Identity {
        if self.case_insensitive_identity {
            Identity::case_insensitive(self.identity.clone())
        } else {
            Identity::new(self.identity.clone())
        }
    }

    /// Converts to the framework's session settings.
    pub fn to_pipe_config(&self) -> PipeConfig {
        PipeConfig::new(self.to_identity())
            .default_timeout(self.timeout())
            .grace_period(self.grace_period())
    }
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_grace_ms() -> u64 {
    500
}

// =============================================================================
// Logging
// =============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

/// Log line layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature.
    #[cfg(feature = "json-log")]
    Json,
}

/// Log destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// How often a log file is rotated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

/// Logging settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Base log level.
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    #[serde(default)]
    pub span_events: SpanEventConfig,

    /// Include thread ids in log lines.
    #[serde(default)]
    pub thread_ids: bool,

    /// Include source file and line in log lines.
    #[serde(default)]
    pub file_location: bool,

    /// Log file, required when `output` is `file`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    #[serde(default)]
    pub rotation: LogRotation,

    /// Per-module levels, e.g. `peerpipe_framework = "debug"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipe_defaults() {
        let settings = PipeSettings::default();
        assert_eq!(settings.timeout(), Duration::from_secs(30));
        assert_eq!(settings.grace_period(), Duration::from_millis(500));

        let config = settings.to_pipe_config();
        assert_eq!(config.default_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_case_insensitive_identity() {
        let settings = PipeSettings {
            identity: "0xABCdef".to_string(),
            case_insensitive_identity: true,
            ..Default::default()
        };
        assert!(settings.to_identity().is_self("0xabcDEF"));
        assert!(!PipeSettings { case_insensitive_identity: false, ..settings }
            .to_identity()
            .is_self("0xabcDEF"));
    }

    #[test]
    fn test_log_level_names() {
        assert_eq!(LogLevel::Warn.to_string(), "warn");
        assert_eq!(LogLevel::Debug.to_tracing_level(), tracing::Level::DEBUG);
        assert_eq!("WARNING".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert!("loud".parse::<LogLevel>().is_err());
    }
}
