//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{LogOutput, LoggingConfig, PeerpipeConfig, PipeSettings};

/// Validates the entire configuration.
///
/// Unknown log levels never get this far: they fail while loading.
pub fn validate_config(config: &PeerpipeConfig) -> ConfigResult<()> {
    validate_pipe_settings(&config.pipe)?;
    validate_logging_config(&config.logging)?;
    Ok(())
}

fn validate_pipe_settings(pipe: &PipeSettings) -> ConfigResult<()> {
    if pipe.identity.trim().is_empty() {
        return Err(ConfigError::missing_field("pipe.identity"));
    }

    if pipe.timeout_ms == 0 {
        return Err(ConfigError::validation("Timeout must be greater than 0"));
    }

    if pipe.grace_ms >= pipe.timeout_ms {
        return Err(ConfigError::validation(format!(
            "Grace delay ({} ms) must be shorter than the timeout ({} ms)",
            pipe.grace_ms, pipe.timeout_ms
        )));
    }

    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }

    if let Some(module) = logging.filters.keys().find(|m| m.trim().is_empty()) {
        return Err(ConfigError::validation(format!(
            "Log filter module name cannot be blank: {module:?}"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    fn valid() -> PeerpipeConfig {
        let mut config = PeerpipeConfig::default();
        config.pipe.identity = "0xprovider".to_string();
        config
    }

    #[test]
    fn test_validate_minimal_config() {
        assert!(validate_config(&valid()).is_ok());
    }

    #[test]
    fn test_identity_is_required() {
        let result = validate_config(&PeerpipeConfig::default());
        assert!(matches!(result, Err(ConfigError::MissingField { field }) if field == "pipe.identity"));
    }

    #[test]
    fn test_zero_timeout() {
        let mut config = valid();
        config.pipe.timeout_ms = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_grace_must_be_shorter_than_timeout() {
        let mut config = valid();
        config.pipe.timeout_ms = 500;
        config.pipe.grace_ms = 500;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_file_output_needs_path() {
        let mut config = valid();
        config.logging.output = LogOutput::File;
        assert!(validate_config(&config).is_err());

        config.logging.file_path = Some("peerpipe.log".into());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_blank_filter_module() {
        let mut config = valid();
        config.logging.filters.insert(" ".to_string(), LogLevel::Debug);
        assert!(validate_config(&config).is_err());
    }
}
