//! Environment variable handling.

use crate::types::ClientConfig;
use std::env;
use thiserror::Error;

/// Environment variable errors.
#[derive(Debug, Error)]
pub enum EnvError {
    #[error("required environment variable not set: {var}")]
    NotSet { var: String },

    #[error("invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },
}

/// Environment variable names.
pub mod vars {
    pub const VETTED_CONFIG_DIR: &str = "VETTED_CONFIG_DIR";
    pub const VETTED_BASE_URL: &str = "VETTED_BASE_URL";
    pub const VETTED_TIMEOUT_MS: &str = "VETTED_TIMEOUT_MS";
    pub const VETTED_RETRY_MAX_ATTEMPTS: &str = "VETTED_RETRY_MAX_ATTEMPTS";
    pub const VETTED_RETRY_BASE_DELAY_MS: &str = "VETTED_RETRY_BASE_DELAY_MS";
    pub const VETTED_TOLERANT: &str = "VETTED_TOLERANT";
    pub const VETTED_ENV: &str = "VETTED_ENV";
}

/// Environment configuration.
pub struct Environment {
    _guard: (),
}

impl Environment {
    /// Initialize environment from .env files.
    pub fn init() -> Result<Self, EnvError> {
        // Later files override earlier ones
        let _ = dotenvy::from_filename(".env");
        let _ = dotenvy::from_filename(".env.local");

        if let Ok(env) = env::var(vars::VETTED_ENV) {
            let _ = dotenvy::from_filename(format!(".env.{}", env));
        }

        Ok(Self { _guard: () })
    }

    /// Get a required string variable.
    pub fn require(var: &str) -> Result<String, EnvError> {
        env::var(var).map_err(|_| EnvError::NotSet { var: var.to_string() })
    }

    /// Get an optional string variable.
    pub fn get(var: &str) -> Option<String> {
        env::var(var).ok()
    }

    /// Get a variable with a default value.
    pub fn get_or(var: &str, default: &str) -> String {
        env::var(var).unwrap_or_else(|_| default.to_string())
    }

    /// Get a boolean variable.
    pub fn get_bool(var: &str) -> Option<bool> {
        env::var(var)
            .ok()
            .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
    }

    /// Get an integer variable.
    pub fn get_int<T: std::str::FromStr>(var: &str) -> Result<Option<T>, EnvError> {
        match env::var(var) {
            Ok(v) => v.trim().parse().map(Some).map_err(|_| EnvError::InvalidValue {
                var: var.to_string(),
                message: "expected integer".to_string(),
            }),
            Err(_) => Ok(None),
        }
    }
}

impl ClientConfig {
    /// Apply `VETTED_*` environment overrides on top of file or default values.
    pub fn apply_env_overrides(&mut self) -> Result<(), EnvError> {
        if let Some(base_url) = Environment::get(vars::VETTED_BASE_URL) {
            self.request.base_url = Some(base_url);
        }

        if let Some(timeout_ms) = Environment::get_int(vars::VETTED_TIMEOUT_MS)? {
            self.request.timeout_ms = Some(timeout_ms);
        }

        if let Some(max_attempts) = Environment::get_int::<u32>(vars::VETTED_RETRY_MAX_ATTEMPTS)? {
            if max_attempts == 0 {
                return Err(EnvError::InvalidValue {
                    var: vars::VETTED_RETRY_MAX_ATTEMPTS.to_string(),
                    message: "must be at least 1".to_string(),
                });
            }
            self.retry.enabled = true;
            self.retry.max_attempts = max_attempts;
        }

        if let Some(base_delay_ms) = Environment::get_int(vars::VETTED_RETRY_BASE_DELAY_MS)? {
            self.retry.base_delay_ms = base_delay_ms;
        }

        if let Some(tolerant) = Environment::get_bool(vars::VETTED_TOLERANT) {
            self.validation.tolerant = tolerant;
        }

        Ok(())
    }
}
