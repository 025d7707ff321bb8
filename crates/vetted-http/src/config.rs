//! Conversions from file/env configuration into client types.

use crate::client::HttpConfig;
use crate::request::{normalize_headers, RequestConfig};
use crate::retry::{Backoff, PolicyError, RetryPolicy};
use std::time::Duration;
use vetted_common_config::{BackoffKind, HttpSettings, RequestSettings, RetrySettings};

impl From<BackoffKind> for Backoff {
    fn from(kind: BackoffKind) -> Self {
        match kind {
            BackoffKind::Linear => Backoff::Linear,
            BackoffKind::Exponential => Backoff::Exponential,
        }
    }
}

impl From<&RequestSettings> for RequestConfig {
    fn from(settings: &RequestSettings) -> Self {
        RequestConfig {
            headers: normalize_headers(&settings.headers),
            timeout_ms: settings.timeout_ms,
            base_url: settings.base_url.clone(),
            ..RequestConfig::default()
        }
    }
}

impl From<&HttpSettings> for HttpConfig {
    fn from(settings: &HttpSettings) -> Self {
        HttpConfig {
            connect_timeout: Duration::from_millis(settings.connect_timeout_ms),
            request_timeout: Duration::from_millis(settings.request_timeout_ms),
            user_agent: settings.user_agent.clone(),
            pool_max_idle_per_host: settings.pool_max_idle_per_host,
            gzip: settings.gzip,
        }
    }
}

/// The retry policy described by `settings`, or `None` when retries are
/// disabled.
pub fn retry_policy(settings: &RetrySettings) -> Result<Option<RetryPolicy>, PolicyError> {
    if !settings.enabled {
        return Ok(None);
    }

    RetryPolicy::new(
        settings.max_attempts,
        settings.base_delay_ms,
        settings.backoff.into(),
    )
    .map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_request_settings_become_defaults() {
        let settings = RequestSettings {
            base_url: Some("https://api.example.com".to_string()),
            headers: BTreeMap::from([("Accept".to_string(), "application/json".to_string())]),
            timeout_ms: Some(2500),
        };

        let defaults = RequestConfig::from(&settings);
        assert_eq!(defaults.base_url.as_deref(), Some("https://api.example.com"));
        assert_eq!(
            defaults.headers,
            BTreeMap::from([("accept".to_string(), "application/json".to_string())])
        );
        assert_eq!(defaults.timeout_ms, Some(2500));
        assert!(defaults.url.is_none());
        assert!(defaults.method.is_none());
    }

    #[test]
    fn test_disabled_retry_yields_no_policy() {
        let settings = RetrySettings::default();
        assert!(retry_policy(&settings).unwrap().is_none());
    }

    #[test]
    fn test_enabled_retry_yields_policy() {
        let settings = RetrySettings {
            enabled: true,
            max_attempts: 5,
            base_delay_ms: 200,
            backoff: BackoffKind::Linear,
        };

        let policy = retry_policy(&settings).unwrap().unwrap();
        assert_eq!(policy.max_attempts(), 5);
        assert_eq!(policy.base_delay_ms(), 200);
        assert_eq!(policy.backoff(), Backoff::Linear);
    }

    #[test]
    fn test_enabled_retry_rejects_zero_attempts() {
        let settings = RetrySettings {
            enabled: true,
            max_attempts: 0,
            ..RetrySettings::default()
        };

        assert_eq!(retry_policy(&settings).unwrap_err(), PolicyError::InvalidAttempts);
    }

    #[test]
    fn test_http_settings_convert() {
        let config = HttpConfig::from(&HttpSettings::default());
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(config.gzip);
    }
}
