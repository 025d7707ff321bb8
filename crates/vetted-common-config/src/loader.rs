//! Configuration file loading and parsing.

use crate::types::ClientConfig;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

/// Directory, relative to the project root, holding the config file.
pub const CONFIG_DIR: &str = ".vetted";
/// Config file name inside [`CONFIG_DIR`].
pub const CONFIG_FILE: &str = "config.yaml";

/// Config loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {source}")]
    ReadError {
        #[from]
        source: std::io::Error,
    },

    #[error("invalid YAML at line {}: {message}", line.map(|l| l.to_string()).unwrap_or_else(|| "unknown".to_string()))]
    ParseError { line: Option<usize>, message: String },

    #[error("validation error: {message}")]
    ValidationError { message: String },

    #[error("environment variable not found: {var}")]
    EnvVarNotFound { var: String },
}

fn env_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}").expect("env var pattern is valid")
    })
}

/// Configuration loader.
pub struct ConfigLoader {
    base_path: PathBuf,
}

impl ConfigLoader {
    /// Create a loader for the given project directory.
    pub fn new(project_dir: impl AsRef<Path>) -> Self {
        Self {
            base_path: project_dir.as_ref().to_path_buf(),
        }
    }

    /// Path of the config file this loader reads and writes.
    pub fn config_path(&self) -> PathBuf {
        self.base_path.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Load configuration from `.vetted/config.yaml`.
    ///
    /// A missing file yields [`ClientConfig::default`].
    pub fn load(&self) -> Result<ClientConfig, ConfigError> {
        let config_path = self.config_path();

        if !config_path.exists() {
            return Ok(ClientConfig::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;
        self.parse(&contents)
    }

    /// Parse and validate YAML content, expanding `${VAR}` references first.
    pub fn parse(&self, contents: &str) -> Result<ClientConfig, ConfigError> {
        let expanded = self.expand_env_vars(contents)?;

        let config: ClientConfig =
            serde_yaml::from_str(&expanded).map_err(|e| ConfigError::ParseError {
                line: e.location().map(|l| l.line()),
                message: e.to_string(),
            })?;

        validate(&config)?;
        Ok(config)
    }

    /// Expand environment variables in the form `${VAR}` or `${VAR:-default}`.
    fn expand_env_vars(&self, content: &str) -> Result<String, ConfigError> {
        let mut missing = None;

        let expanded = env_pattern().replace_all(content, |cap: &regex::Captures<'_>| {
            match std::env::var(&cap[1]) {
                Ok(value) => value,
                Err(_) => match cap.get(2) {
                    Some(default) => default.as_str().to_string(),
                    None => {
                        missing.get_or_insert_with(|| cap[1].to_string());
                        String::new()
                    }
                },
            }
        });

        match missing {
            Some(var) => Err(ConfigError::EnvVarNotFound { var }),
            None => Ok(expanded.into_owned()),
        }
    }

    /// Save configuration to file.
    pub fn save(&self, config: &ClientConfig) -> Result<(), ConfigError> {
        let config_dir = self.base_path.join(CONFIG_DIR);
        std::fs::create_dir_all(&config_dir)?;

        let yaml = serde_yaml::to_string(config).map_err(|e| ConfigError::ParseError {
            line: None,
            message: e.to_string(),
        })?;

        std::fs::write(self.config_path(), yaml)?;
        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new(std::env::current_dir().unwrap_or_default())
    }
}

/// Validate configuration values.
pub fn validate(config: &ClientConfig) -> Result<(), ConfigError> {
    if config.retry.max_attempts == 0 {
        return Err(ConfigError::ValidationError {
            message: "retry.max_attempts must be at least 1".to_string(),
        });
    }

    if let Some(base_url) = &config.request.base_url {
        let parsed = url::Url::parse(base_url).map_err(|e| ConfigError::ValidationError {
            message: format!("request.base_url is not a valid URL: {e}"),
        })?;
        if parsed.cannot_be_a_base() {
            return Err(ConfigError::ValidationError {
                message: format!("request.base_url cannot be used as a base: {base_url}"),
            });
        }
    }

    if config.request.headers.keys().any(|name| name.trim().is_empty()) {
        return Err(ConfigError::ValidationError {
            message: "request.headers contains an empty header name".to_string(),
        });
    }

    Ok(())
}
