//! Configuration types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Root client configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Defaults merged into every request.
    pub request: RequestSettings,
    /// Retry behaviour.
    pub retry: RetrySettings,
    /// Response validation behaviour.
    pub validation: ValidationSettings,
    /// Underlying HTTP client tuning.
    pub http: HttpSettings,
}

/// Per-request defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestSettings {
    /// Prefix for relative request URLs.
    pub base_url: Option<String>,
    /// Headers sent with every request.
    pub headers: BTreeMap<String, String>,
    /// Per-request timeout (ms).
    pub timeout_ms: Option<u64>,
}

/// Backoff growth between attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    Linear,
    #[default]
    Exponential,
}

/// Retry configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Whether transient failures are retried at all.
    pub enabled: bool,
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Base wait between attempts (ms).
    pub base_delay_ms: u64,
    /// Backoff shape.
    pub backoff: BackoffKind,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            max_attempts: 3,
            base_delay_ms: 1000,
            backoff: BackoffKind::Exponential,
        }
    }
}

/// Validation configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    /// Report shape mismatches instead of failing the request.
    pub tolerant: bool,
    /// Name used for the response root in violation messages.
    pub label: Option<String>,
}

/// HTTP client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Connection timeout (ms).
    pub connect_timeout_ms: u64,
    /// Overall request timeout (ms) when a request sets none.
    pub request_timeout_ms: u64,
    /// User agent string.
    pub user_agent: String,
    /// Maximum idle connections per host.
    pub pool_max_idle_per_host: usize,
    /// Enable gzip decompression.
    pub gzip: bool,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
            request_timeout_ms: 30_000,
            user_agent: format!("vetted/{}", env!("CARGO_PKG_VERSION")),
            pool_max_idle_per_host: 10,
            gzip: true,
        }
    }
}
