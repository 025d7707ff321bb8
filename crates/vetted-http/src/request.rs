//! Request descriptors and configuration merging.

use reqwest::header::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Common HTTP headers.
pub mod headers {
    /// `authorization`
    pub const AUTHORIZATION: &str = "authorization";
    /// `content-type`
    pub const CONTENT_TYPE: &str = "content-type";
    /// `accept`
    pub const ACCEPT: &str = "accept";
    /// JSON media type.
    pub const CONTENT_TYPE_JSON: &str = "application/json";
    /// `x-api-key`
    pub const X_API_KEY: &str = "x-api-key";
}

/// Header map keyed by lower-cased header name.
pub type Headers = BTreeMap<String, String>;

/// Lower-case every header name. When two names differ only in case, the
/// one sorting last in `headers` wins.
pub fn normalize_headers(headers: &Headers) -> Headers {
    headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.clone()))
        .collect()
}

/// HTTP method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    /// The method name as sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            _ => Err(RequestError::UnsupportedMethod(s.to_string())),
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Invalid request configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("URL is required")]
    MissingUrl,

    #[error("Unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    #[error("Invalid header: {name}")]
    InvalidHeader { name: String },
}

/// Partial request configuration.
///
/// Every field is optional so a default configuration and a per-call
/// override can be combined with [`merge`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    /// Defaults to GET when unset everywhere.
    pub method: Option<Method>,
    /// Absolute, or relative to `base_url`.
    pub url: Option<String>,
    /// JSON body.
    pub body: Option<Value>,
    /// Headers keyed by lower-cased name.
    pub headers: Headers,
    /// Per-request timeout.
    pub timeout_ms: Option<u64>,
    /// Prefix for a relative `url`.
    pub base_url: Option<String>,
}

impl RequestConfig {
    /// A config for `method` on `url`.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method: Some(method),
            url: Some(url.into()),
            ..Self::default()
        }
    }

    /// A GET config.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    /// A POST config.
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    /// A PUT config.
    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::Put, url)
    }

    /// A PATCH config.
    pub fn patch(url: impl Into<String>) -> Self {
        Self::new(Method::Patch, url)
    }

    /// A DELETE config.
    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::Delete, url)
    }

    /// Set the JSON body.
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Set a header. Names are stored lower-cased.
    pub fn header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// Set the per-request timeout.
    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Set the prefix for a relative URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Check invariants and produce an immutable descriptor.
    ///
    /// The method defaults to GET; a missing or blank URL is rejected.
    pub fn into_descriptor(self) -> Result<RequestDescriptor, RequestError> {
        let url = match self.url {
            Some(url) if !url.trim().is_empty() => url,
            _ => return Err(RequestError::MissingUrl),
        };

        for (name, value) in &self.headers {
            if HeaderName::try_from(name.as_str()).is_err()
                || HeaderValue::try_from(value.as_str()).is_err()
            {
                return Err(RequestError::InvalidHeader { name: name.clone() });
            }
        }

        Ok(RequestDescriptor {
            method: self.method.unwrap_or_default(),
            url,
            body: self.body,
            headers: normalize_headers(&self.headers),
            timeout_ms: self.timeout_ms,
            base_url: self.base_url.filter(|base| !base.trim().is_empty()),
        })
    }
}

/// Merge a base configuration with a per-call override.
///
/// Fields set in `overrides` replace those in `base`; headers are merged
/// by case-insensitive name with the override winning on conflict.
pub fn merge(base: &RequestConfig, overrides: &RequestConfig) -> RequestConfig {
    let mut headers = normalize_headers(&base.headers);
    headers.extend(normalize_headers(&overrides.headers));

    RequestConfig {
        method: overrides.method.or(base.method),
        url: overrides.url.clone().or_else(|| base.url.clone()),
        body: overrides.body.clone().or_else(|| base.body.clone()),
        headers,
        timeout_ms: overrides.timeout_ms.or(base.timeout_ms),
        base_url: overrides.base_url.clone().or_else(|| base.base_url.clone()),
    }
}

/// A validated, immutable request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    method: Method,
    url: String,
    body: Option<Value>,
    headers: Headers,
    timeout_ms: Option<u64>,
    base_url: Option<String>,
}

impl RequestDescriptor {
    /// Request method.
    pub fn method(&self) -> Method {
        self.method
    }

    /// The URL as configured, before base URL resolution.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// JSON body, if any.
    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// Headers keyed by lower-cased name.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Per-request timeout, if any.
    pub fn timeout_ms(&self) -> Option<u64> {
        self.timeout_ms
    }

    /// Prefix for a relative URL, if any.
    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    /// The URL to dispatch: absolute URLs are used as is, relative ones are
    /// joined onto the base URL.
    pub fn resolved_url(&self) -> String {
        if is_absolute(&self.url) {
            return self.url.clone();
        }

        match &self.base_url {
            Some(base) => {
                let base = base.trim_end_matches('/');
                if self.url.starts_with('/') {
                    format!("{}{}", base, self.url)
                } else {
                    format!("{}/{}", base, self.url)
                }
            }
            None => self.url.clone(),
        }
    }
}

fn is_absolute(url: &str) -> bool {
    url.split_once("://")
        .map(|(scheme, _)| {
            !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        })
        .unwrap_or(false)
}
