//! The transport capability the executor dispatches through.

use crate::request::RequestDescriptor;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Coarse reason a dispatch produced no response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// Connection-level failure (DNS, refused, reset, TLS, broken body).
    Network,
    /// The transport gave up waiting.
    Timeout,
    /// The request was cancelled before completing.
    Cancel,
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportErrorKind::Network => "network",
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Cancel => "cancel",
            TransportErrorKind::Other => "other",
        };
        f.write_str(name)
    }
}

/// A dispatch that failed without receiving a response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransportError {
    /// What went wrong.
    pub kind: TransportErrorKind,
    /// Human-readable description.
    pub message: String,
    /// Machine-readable detail from the transport, if any.
    pub code: Option<String>,
}

impl TransportError {
    /// Create a new error without a code.
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            code: None,
        }
    }

    /// A connection-level failure.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Network, message)
    }

    /// A timed-out dispatch.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    /// A cancelled dispatch.
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Cancel, message)
    }

    /// Any other failure.
    pub fn other(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Other, message)
    }

    /// Attach a machine-readable code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// A received response.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    /// HTTP status.
    pub status: u16,
    /// Decoded body; `None` when the transport could not produce one.
    pub body: Option<Value>,
    /// Lower-cased header names.
    pub headers: HashMap<String, String>,
}

impl TransportResponse {
    /// Create a new response with `body` and no headers.
    pub fn new(status: u16, body: Value) -> Self {
        Self {
            status,
            body: Some(body),
            headers: HashMap::new(),
        }
    }

    /// Add a header; the name is lower-cased.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }
}

/// Sends one request and returns the response, or why there is none.
///
/// Non-2xx responses are responses, not errors.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn dispatch(&self, request: &RequestDescriptor)
        -> Result<TransportResponse, TransportError>;
}
