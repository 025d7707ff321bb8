//! `reqwest`-backed transport.

use crate::request::RequestDescriptor;
use crate::response::{collect_headers, decode_body};
use crate::retry::PolicyError;
use crate::transport::{HttpTransport, TransportError, TransportErrorKind, TransportResponse};
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use std::time::Duration;

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Request timeout, used when a request sets none.
    pub request_timeout: Duration,
    /// User agent string.
    pub user_agent: String,
    /// Maximum idle connections per host.
    pub pool_max_idle_per_host: usize,
    /// Enable gzip decompression.
    pub gzip: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            user_agent: format!("vetted/{}", env!("CARGO_PKG_VERSION")),
            pool_max_idle_per_host: 10,
            gzip: true,
        }
    }
}

/// Build a configured HTTP client.
pub fn build_client(config: HttpConfig) -> Result<Client, HttpError> {
    ClientBuilder::new()
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout)
        .user_agent(&config.user_agent)
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .gzip(config.gzip)
        .build()
        .map_err(HttpError::ClientBuild)
}

/// HTTP client construction errors.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("invalid retry configuration: {0}")]
    Retry(#[from] PolicyError),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        let (kind, code) = if e.is_timeout() {
            (TransportErrorKind::Timeout, "timeout")
        } else if e.is_connect() {
            (TransportErrorKind::Network, "connect")
        } else if e.is_redirect() {
            (TransportErrorKind::Network, "redirect")
        } else if e.is_body() {
            (TransportErrorKind::Network, "body")
        } else if e.is_request() {
            (TransportErrorKind::Network, "request")
        } else if e.is_decode() {
            (TransportErrorKind::Other, "decode")
        } else if e.is_builder() {
            (TransportErrorKind::Other, "builder")
        } else {
            (TransportErrorKind::Other, "unknown")
        };

        TransportError::new(kind, e.to_string()).with_code(code)
    }
}

/// [`HttpTransport`] over a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    inner: Client,
}

impl ReqwestTransport {
    /// Create a transport with default config.
    pub fn new() -> Result<Self, HttpError> {
        Self::with_config(HttpConfig::default())
    }

    /// Create a transport with custom config.
    pub fn with_config(config: HttpConfig) -> Result<Self, HttpError> {
        let inner = build_client(config)?;
        Ok(Self { inner })
    }

    /// Wrap an existing client.
    pub fn from_client(inner: Client) -> Self {
        Self { inner }
    }

    /// Get the inner reqwest client.
    pub fn inner(&self) -> &Client {
        &self.inner
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn dispatch(
        &self,
        request: &RequestDescriptor,
    ) -> Result<TransportResponse, TransportError> {
        let url = request.resolved_url();
        tracing::debug!(method = %request.method(), url = %url, "sending request");

        let mut builder = self.inner.request(request.method().into(), &url);
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(timeout_ms) = request.timeout_ms() {
            builder = builder.timeout(Duration::from_millis(timeout_ms));
        }
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());
        let bytes = response.bytes().await?;

        tracing::debug!(status, url = %url, bytes = bytes.len(), "received response");
        Ok(TransportResponse {
            status,
            body: Some(decode_body(&bytes)),
            headers,
        })
    }
}
