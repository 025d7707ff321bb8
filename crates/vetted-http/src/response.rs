//! Decoding raw responses into transport responses.

use bytes::Bytes;
use reqwest::header::HeaderMap;
use serde_json::Value;
use std::collections::HashMap;

/// Decode a response body.
///
/// Empty bodies become `null`, JSON is parsed, anything else is kept as a
/// string.
pub fn decode_body(bytes: &Bytes) -> Value {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }

    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

/// Collect headers into a map keyed by lower-cased name. Values that are not
/// visible ASCII are skipped; repeated headers keep the last value.
pub fn collect_headers(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderValue, CONTENT_TYPE};
    use serde_json::json;

    #[test]
    fn test_decode_json_body() {
        let bytes = Bytes::from_static(br#"{"id": 1, "name": "John Doe"}"#);
        assert_eq!(decode_body(&bytes), json!({"id": 1, "name": "John Doe"}));
    }

    #[test]
    fn test_decode_empty_body_is_null() {
        assert_eq!(decode_body(&Bytes::new()), Value::Null);
        assert_eq!(decode_body(&Bytes::from_static(b"  \n")), Value::Null);
    }

    #[test]
    fn test_decode_text_body() {
        let bytes = Bytes::from_static(b"Service Unavailable");
        assert_eq!(decode_body(&bytes), json!("Service Unavailable"));
    }

    #[test]
    fn test_collect_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("x-request-id", HeaderValue::from_static("abc"));

        let collected = collect_headers(&headers);
        assert_eq!(collected["content-type"], "application/json");
        assert_eq!(collected["x-request-id"], "abc");
    }
}
