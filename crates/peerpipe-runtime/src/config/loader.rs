//! Configuration loader using figment.
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Profile-specific config file (`peerpipe.{profile}.toml`)
//! 3. Main config file (`peerpipe.toml`)
//! 4. Environment variables (`PEERPIPE_*`)
//! 5. Programmatic overrides
//!
//! Files are only read with the `toml-config` feature (on by default).
//!
//! # Environment Variable Mapping
//!
//! Environment variables use the `PEERPIPE_` prefix with `__` as separator:
//!
//! - `PEERPIPE_PIPE__IDENTITY=0xabc` → `pipe.identity = "0xabc"`
//! - `PEERPIPE_PIPE__TIMEOUT_MS=5000` → `pipe.timeout_ms = 5000`
//! - `PEERPIPE_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//!
//! `PEERPIPE_PROFILE` selects the profile and is not a setting itself.
//!
//! # Example
//!
//! ```rust,ignore
//! use peerpipe_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .file("./config/peerpipe.toml")
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(feature = "toml-config")]
use figment::providers::{Format, Toml};
use figment::providers::{Env, Serialized};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::PeerpipeConfig;

const ENV_PREFIX: &str = "PEERPIPE_";
const PROFILE_VAR: &str = "PEERPIPE_PROFILE";
const APP_DIR: &str = "peerpipe";
#[cfg(feature = "toml-config")]
const BASE_NAME: &str = "peerpipe";

/// Configuration profile for environment-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    /// Development profile (default).
    #[default]
    Development,
    /// Production profile.
    Production,
    /// Custom profile name.
    Custom(String),
}

impl Profile {
    /// Returns the profile name as a string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Parses a profile name, accepting the usual abbreviations.
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Reads the profile from `PEERPIPE_PROFILE`, defaulting to development.
    pub fn from_env() -> Self {
        std::env::var(PROFILE_VAR)
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration loader with figment-based multi-source support.
pub struct ConfigLoader {
    /// Programmatic overrides, merged last.
    overrides: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    /// Specific config file to load (overrides search).
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a new configuration loader with defaults.
    pub fn new() -> Self {
        Self {
            overrides: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    /// Sets the configuration profile.
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Adds the current directory to the search paths.
    pub fn with_current_dir(self) -> Self {
        match std::env::current_dir() {
            Ok(cwd) => self.search_path(cwd),
            Err(_) => self,
        }
    }

    /// Adds the user config directory to the search paths.
    pub fn with_user_config_dir(self) -> Self {
        match dirs::config_dir() {
            Some(dir) => self.search_path(dir.join(APP_DIR)),
            None => self,
        }
    }

    /// Sets a specific configuration file to load.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Enables loading environment variables (default: true).
    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges a complete configuration over everything else.
    pub fn merge(mut self, config: PeerpipeConfig) -> Self {
        self.overrides = self.overrides.merge(Serialized::defaults(config));
        self
    }

    /// Overrides a single key, e.g. `set("pipe.identity", "0xabc")`.
    pub fn set<V: serde::Serialize>(mut self, key: &str, value: V) -> Self {
        self.overrides = self.overrides.merge(Serialized::default(key, value));
        self
    }

    /// Loads and returns the configuration.
    pub fn load(self) -> ConfigResult<PeerpipeConfig> {
        let profile = self.profile.clone();
        let figment = self.build_figment()?;

        let config: PeerpipeConfig = figment.extract()?;

        debug!(
            profile = %profile,
            identity = %config.pipe.identity,
            logging_level = %config.logging.level,
            "Configuration loaded"
        );

        Ok(config)
    }

    fn build_figment(mut self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(PeerpipeConfig::default()));

        if let Some(path) = self.config_file.take() {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = Self::merge_config_file(figment, &path)?;
        } else {
            figment = self.load_config_files(figment);
        }

        if self.load_env {
            trace!("Loading environment variables with {ENV_PREFIX} prefix");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).ignore(&["profile"]).split("__"));
        }

        Ok(figment.merge(self.overrides))
    }

    fn merge_config_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            #[cfg(feature = "toml-config")]
            "toml" => Ok(figment.merge(Toml::file(path))),
            _ => Err(ConfigError::ParseError(format!(
                "Unsupported or disabled configuration file format: .{ext}"
            ))),
        }
    }

    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join(APP_DIR));
        }
        paths
    }

    /// Loads the profile file and then the main file from the first search
    /// path that has a main file.
    #[cfg(feature = "toml-config")]
    fn load_config_files(&self, mut figment: Figment) -> Figment {
        for dir in self.resolve_search_paths() {
            let base = dir.join(format!("{BASE_NAME}.toml"));
            if !base.exists() {
                continue;
            }

            let profile_file = dir.join(format!("{BASE_NAME}.{}.toml", self.profile));
            if profile_file.exists() {
                debug!(path = %profile_file.display(), "Loading profile-specific config");
                figment = figment.merge(Toml::file(&profile_file));
            }

            info!(path = %base.display(), "Loading configuration file");
            return figment.merge(Toml::file(&base));
        }

        warn!("No configuration file found, using defaults");
        figment
    }

    #[cfg(not(feature = "toml-config"))]
    fn load_config_files(&self, figment: Figment) -> Figment {
        trace!(paths = ?self.resolve_search_paths(), "File formats disabled, skipping search");
        figment
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::config::LogLevel;

    fn write(dir: &Path, name: &str, contents: &str) {
        std::fs::write(dir.join(name), contents).unwrap();
    }

    #[test]
    fn test_defaults_without_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigLoader::new()
            .search_path(dir.path())
            .without_env()
            .load()
            .unwrap();

        assert_eq!(config.logging.level, LogLevel::Info);
        assert_eq!(config.pipe.timeout(), Duration::from_secs(30));
        assert!(config.pipe.identity.is_empty());
    }

    #[test]
    fn test_main_file_overrides_profile_file() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "peerpipe.staging.toml",
            "[pipe]\nidentity = \"staging\"\ntimeout_ms = 1000\n",
        );
        write(dir.path(), "peerpipe.toml", "[pipe]\nidentity = \"main\"\n");

        let config = ConfigLoader::new()
            .profile("staging")
            .search_path(dir.path())
            .without_env()
            .load()
            .unwrap();

        assert_eq!(config.pipe.identity, "main");
        assert_eq!(config.pipe.timeout_ms, 1000);
    }

    #[test]
    fn test_programmatic_overrides_win() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "peerpipe.toml",
            "[pipe]\nidentity = \"file\"\n\n[logging]\nlevel = \"warn\"\n",
        );

        let config = ConfigLoader::new()
            .search_path(dir.path())
            .without_env()
            .set("pipe.identity", "code")
            .load()
            .unwrap();

        assert_eq!(config.pipe.identity, "code");
        assert_eq!(config.logging.level, LogLevel::Warn);
    }

    #[test]
    fn test_explicit_missing_file() {
        let result = ConfigLoader::new()
            .file("/definitely/not/here/peerpipe.toml")
            .without_env()
            .load();
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_unknown_log_level_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "peerpipe.toml", "[logging]\nlevel = \"loud\"\n");

        let result = ConfigLoader::new()
            .search_path(dir.path())
            .without_env()
            .load();
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_profile_parse() {
        assert_eq!(Profile::parse("PROD"), Profile::Production);
        assert_eq!(Profile::parse("dev"), Profile::Development);
        assert_eq!(Profile::parse("qa"), Profile::Custom("qa".to_string()));
    }
}
