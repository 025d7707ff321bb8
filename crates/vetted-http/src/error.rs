//! Error categories, classification, and the caller-facing error.

use crate::status;
use crate::transport::{TransportError, TransportErrorKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Prefix of every response validation failure message.
pub const VALIDATION_FAILED: &str = "Response data validation failed";

/// What kind of failure an [`ApiError`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Validation,
    Network,
    Timeout,
    Cancel,
    /// 4xx response.
    Client,
    /// 5xx response.
    Server,
    Unknown,
}

impl ErrorCategory {
    /// Lower-case name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Validation => "validation",
            ErrorCategory::Network => "network",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Cancel => "cancel",
            ErrorCategory::Client => "client",
            ErrorCategory::Server => "server",
            ErrorCategory::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result type returned by request execution.
pub type ApiResult<T> = Result<T, ApiError>;

/// A failed request.
///
/// `status` is the response status when one was received, otherwise
/// [`status::SYNTHETIC`].
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message} ({category}, status {status})")]
pub struct ApiError {
    /// HTTP status, or 500 when no response was received.
    pub status: u16,
    /// Human-readable description.
    pub message: String,
    /// Failure kind.
    pub category: ErrorCategory,
}

impl ApiError {
    fn synthetic(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            status: status::SYNTHETIC,
            message: message.into(),
            category,
        }
    }

    /// A validation failure (bad configuration, malformed response, or a body
    /// that does not match the expected shape).
    pub fn validation(message: impl Into<String>) -> Self {
        Self::synthetic(ErrorCategory::Validation, message)
    }

    /// A body that failed its validator; `detail` lists the violations.
    pub fn invalid_data(detail: impl fmt::Display) -> Self {
        Self::validation(format!("{VALIDATION_FAILED}: {detail}"))
    }

    /// A cancellation error.
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::synthetic(ErrorCategory::Cancel, message)
    }

    /// Build the error for a transport failure.
    pub fn from_transport(error: &TransportError) -> Self {
        let classification = classify(Failure::Transport(error));
        Self {
            status: classification.status.unwrap_or(status::SYNTHETIC),
            message: error.message.clone(),
            category: classification.category,
        }
    }

    /// Build the error for a non-2xx response.
    ///
    /// The message comes from a `message` or `error` string in a JSON object
    /// body when present.
    pub fn from_response(status: u16, body: Option<&Value>) -> Self {
        let classification = classify(Failure::Response { status });
        let message = body
            .and_then(server_message)
            .unwrap_or_else(|| format!("Request failed with status code {status}"));

        Self {
            status: classification.status.unwrap_or(status::SYNTHETIC),
            message,
            category: classification.category,
        }
    }

    /// Whether the request or response failed validation.
    pub fn is_validation(&self) -> bool {
        self.category == ErrorCategory::Validation
    }

    /// Whether no response was received.
    pub fn is_network(&self) -> bool {
        self.category == ErrorCategory::Network
    }

    /// Whether the request timed out.
    pub fn is_timeout(&self) -> bool {
        self.category == ErrorCategory::Timeout
    }

    /// Whether the request was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.category == ErrorCategory::Cancel
    }

    /// Whether the server answered 4xx.
    pub fn is_client_error(&self) -> bool {
        self.category == ErrorCategory::Client
    }

    /// Whether the server answered 5xx.
    pub fn is_server_error(&self) -> bool {
        self.category == ErrorCategory::Server
    }

    /// Whether the failure could not be classified.
    pub fn is_unknown(&self) -> bool {
        self.category == ErrorCategory::Unknown
    }

    /// Whether the server answered 429.
    pub fn is_rate_limited(&self) -> bool {
        self.is_client_error() && status::is_rate_limited(self.status)
    }

    /// Whether an unchanged retry could plausibly succeed: network errors,
    /// timeouts, 5xx and 429.
    pub fn is_transient(&self) -> bool {
        match self.category {
            ErrorCategory::Network | ErrorCategory::Timeout | ErrorCategory::Server => true,
            ErrorCategory::Client => status::is_rate_limited(self.status),
            ErrorCategory::Validation | ErrorCategory::Cancel | ErrorCategory::Unknown => false,
        }
    }
}

fn server_message(body: &Value) -> Option<String> {
    let object = body.as_object()?;
    ["message", "error"]
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_str))
        .filter(|message| !message.is_empty())
        .map(str::to_string)
}

/// Something that went wrong during a dispatch attempt.
#[derive(Debug, Clone, Copy)]
pub enum Failure<'a> {
    /// No response was received.
    Transport(&'a TransportError),
    /// A response was received with a non-2xx status.
    Response { status: u16 },
}

/// Output of [`classify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Failure kind.
    pub category: ErrorCategory,
    /// The HTTP status, when a response was received.
    pub status: Option<u16>,
    /// The transport's machine-readable code, if it supplied one.
    pub code: Option<String>,
}

/// Map a failure onto an [`ErrorCategory`].
///
/// First match wins: cancellation, timeout, connection failure, 4xx, 5xx,
/// otherwise unknown.
pub fn classify(failure: Failure<'_>) -> Classification {
    match failure {
        Failure::Transport(error) => {
            let category = match error.kind {
                TransportErrorKind::Cancel => ErrorCategory::Cancel,
                TransportErrorKind::Timeout => ErrorCategory::Timeout,
                TransportErrorKind::Network => ErrorCategory::Network,
                TransportErrorKind::Other => ErrorCategory::Unknown,
            };
            Classification {
                category,
                status: None,
                code: error.code.clone(),
            }
        }
        Failure::Response { status } => {
            let category = if status::is_client_error(status) {
                ErrorCategory::Client
            } else if status::is_server_error(status) {
                ErrorCategory::Server
            } else {
                ErrorCategory::Unknown
            };
            Classification {
                category,
                status: status::is_valid_status(status).then_some(status),
                code: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    #[test_case(TransportErrorKind::Cancel, ErrorCategory::Cancel)]
    #[test_case(TransportErrorKind::Timeout, ErrorCategory::Timeout)]
    #[test_case(TransportErrorKind::Network, ErrorCategory::Network)]
    #[test_case(TransportErrorKind::Other, ErrorCategory::Unknown)]
    fn test_classify_transport(kind: TransportErrorKind, expected: ErrorCategory) {
        let error = TransportError::new(kind, "boom").with_code("E42");
        let classification = classify(Failure::Transport(&error));
        assert_eq!(classification.category, expected);
        assert_eq!(classification.status, None);
        assert_eq!(classification.code.as_deref(), Some("E42"));
    }

    #[test_case(400, ErrorCategory::Client)]
    #[test_case(404, ErrorCategory::Client)]
    #[test_case(429, ErrorCategory::Client)]
    #[test_case(499, ErrorCategory::Client)]
    #[test_case(500, ErrorCategory::Server)]
    #[test_case(503, ErrorCategory::Server)]
    #[test_case(302, ErrorCategory::Unknown)]
    #[test_case(101, ErrorCategory::Unknown)]
    fn test_classify_response(status: u16, expected: ErrorCategory) {
        let classification = classify(Failure::Response { status });
        assert_eq!(classification.category, expected);
        assert_eq!(classification.status, Some(status));
    }

    #[test]
    fn test_from_transport_uses_synthetic_status() {
        let error = ApiError::from_transport(&TransportError::timeout("timed out after 10ms"));
        assert_eq!(error.status, 500);
        assert_eq!(error.category, ErrorCategory::Timeout);
        assert_eq!(error.message, "timed out after 10ms");
    }

    #[test]
    fn test_from_response_message() {
        let error = ApiError::from_response(404, Some(&json!({})));
        assert_eq!(error.status, 404);
        assert_eq!(error.category, ErrorCategory::Client);
        assert_eq!(error.message, "Request failed with status code 404");

        let error = ApiError::from_response(503, Some(&json!({"message": "maintenance"})));
        assert_eq!(error.message, "maintenance");

        let error = ApiError::from_response(400, Some(&json!({"error": "bad input"})));
        assert_eq!(error.message, "bad input");
    }

    #[test_case(ApiError::from_transport(&TransportError::network("reset")), true)]
    #[test_case(ApiError::from_transport(&TransportError::timeout("slow")), true)]
    #[test_case(ApiError::from_transport(&TransportError::cancelled("stop")), false)]
    #[test_case(ApiError::from_response(500, None), true)]
    #[test_case(ApiError::from_response(429, None), true)]
    #[test_case(ApiError::from_response(404, None), false)]
    #[test_case(ApiError::from_response(301, None), false)]
    #[test_case(ApiError::validation("bad"), false)]
    fn test_is_transient(error: ApiError, transient: bool) {
        assert_eq!(error.is_transient(), transient);
    }

    #[test]
    fn test_predicates() {
        let error = ApiError::from_response(429, None);
        assert!(error.is_client_error());
        assert!(error.is_rate_limited());
        assert!(!error.is_server_error());

        assert!(ApiError::validation("x").is_validation());
        assert!(ApiError::cancelled("x").is_cancelled());
        assert!(ApiError::from_response(302, None).is_unknown());
        assert!(ApiError::from_transport(&TransportError::network("x")).is_network());
        assert!(ApiError::from_transport(&TransportError::timeout("x")).is_timeout());
    }

    #[test]
    fn test_invalid_data_message() {
        let error = ApiError::invalid_data("$.id: expected number, found string");
        assert_eq!(
            error.message,
            "Response data validation failed: $.id: expected number, found string"
        );
        assert_eq!(error.status, 500);
    }

    #[test]
    fn test_error_display() {
        let error = ApiError::from_response(404, None);
        let display = error.to_string();
        assert!(display.contains("404"));
        assert!(display.contains("client"));
    }
}
