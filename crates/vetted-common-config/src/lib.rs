//! Configuration types for vetted.
//!
//! Client defaults come from `.vetted/config.yaml` (with `${VAR}` expansion)
//! and can be overridden with `VETTED_*` environment variables.

pub mod env;
pub mod loader;
pub mod types;

pub use env::*;
pub use loader::*;
pub use types::*;

use thiserror::Error;

/// Errors from [`load_config`].
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Env(#[from] EnvError),
}

/// Load `.env` files, read the config file from `VETTED_CONFIG_DIR` (or the
/// current directory) and apply environment overrides.
pub fn load_config() -> Result<ClientConfig, LoadError> {
    Environment::init()?;

    let loader = match Environment::get(vars::VETTED_CONFIG_DIR) {
        Some(dir) => ConfigLoader::new(dir),
        None => ConfigLoader::default(),
    };

    let mut config = loader.load()?;
    config.apply_env_overrides()?;
    loader::validate(&config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_has_sensible_values() {
        let config = ClientConfig::default();

        assert!(config.request.base_url.is_none());
        assert!(config.request.headers.is_empty());
        assert!(config.request.timeout_ms.is_none());

        assert!(!config.retry.enabled);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.base_delay_ms, 1000);
        assert_eq!(config.retry.backoff, BackoffKind::Exponential);

        assert!(!config.validation.tolerant);
        assert!(config.validation.label.is_none());

        assert_eq!(config.http.connect_timeout_ms, 10_000);
        assert_eq!(config.http.request_timeout_ms, 30_000);
        assert!(config.http.user_agent.starts_with("vetted/"));
        assert!(config.http.gzip);
    }

    #[test]
    fn test_config_serializes_to_yaml() {
        let yaml = serde_yaml::to_string(&ClientConfig::default()).unwrap();

        assert!(yaml.contains("request:"));
        assert!(yaml.contains("retry:"));
        assert!(yaml.contains("validation:"));
        assert!(yaml.contains("http:"));
        assert!(yaml.contains("backoff: exponential"));
    }

    #[test]
    fn test_partial_configs_merge_with_defaults() {
        let partial_yaml = r#"
retry:
  base_delay_ms: 50
"#;

        let config: ClientConfig = serde_yaml::from_str(partial_yaml).unwrap();

        assert_eq!(config.retry.base_delay_ms, 50);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.http, HttpSettings::default());
    }
}
