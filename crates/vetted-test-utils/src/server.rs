//! HTTP mocking utilities using wiremock.

use serde::Serialize;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

/// HTTP mock server wrapper with convenience methods.
pub struct TestHttpServer {
    server: MockServer,
}

impl TestHttpServer {
    /// Start a new mock server.
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Base URL of the server.
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Get URL for a specific path.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.server.uri(), path)
    }

    /// The underlying mock server.
    pub fn inner(&self) -> &MockServer {
        &self.server
    }

    /// Register a GET endpoint that returns JSON.
    pub async fn get_json<T: Serialize>(&self, endpoint: &str, response: &T) {
        Mock::given(method("GET"))
            .and(path(endpoint))
            .respond_with(ResponseTemplate::new(200).set_body_json(response))
            .mount(&self.server)
            .await;
    }

    /// Register a POST endpoint that returns JSON.
    pub async fn post_json<T: Serialize>(&self, endpoint: &str, response: &T) {
        Mock::given(method("POST"))
            .and(path(endpoint))
            .respond_with(ResponseTemplate::new(200).set_body_json(response))
            .mount(&self.server)
            .await;
    }

    /// Register an endpoint that returns an error with a `message` body.
    pub async fn error(&self, endpoint: &str, status: u16, message: &str) {
        Mock::given(path(endpoint))
            .respond_with(responses::error(status, message))
            .mount(&self.server)
            .await;
    }

    /// Register an endpoint with simulated latency.
    pub async fn with_latency<T: Serialize>(&self, endpoint: &str, response: &T, latency: Duration) {
        Mock::given(path(endpoint))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(response)
                    .set_delay(latency),
            )
            .mount(&self.server)
            .await;
    }

    /// Register responses served once each, in order.
    pub async fn sequence(&self, endpoint: &str, responses: Vec<ResponseTemplate>) {
        for (i, response) in responses.into_iter().enumerate() {
            Mock::given(path(endpoint))
                .respond_with(response)
                .up_to_n_times(1)
                .with_priority(u8::try_from(i + 1).unwrap_or(u8::MAX))
                .mount(&self.server)
                .await;
        }
    }

    /// Assert how many requests reached `endpoint`.
    pub async fn verify_received(&self, endpoint: &str, times: u64) {
        let count = self
            .received_requests()
            .await
            .iter()
            .filter(|r| r.url.path() == endpoint)
            .count() as u64;
        assert_eq!(
            count, times,
            "Expected {} requests to {}, got {}",
            times, endpoint, count
        );
    }

    pub async fn received_requests(&self) -> Vec<Request> {
        self.server.received_requests().await.unwrap_or_default()
    }
}

/// Common response templates.
pub mod responses {
    use wiremock::ResponseTemplate;

    /// 200 with a JSON body.
    pub fn ok_json(body: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(body)
    }

    /// `status` with `{"message": message}`.
    pub fn error(status: u16, message: &str) -> ResponseTemplate {
        ResponseTemplate::new(status).set_body_json(serde_json::json!({ "message": message }))
    }

    /// 404 "Not found".
    pub fn not_found() -> ResponseTemplate {
        error(404, "Not found")
    }

    /// 429 with `Retry-After`.
    pub fn rate_limited(retry_after: u32) -> ResponseTemplate {
        error(429, "Rate limited").insert_header("Retry-After", retry_after.to_string().as_str())
    }

    /// 500 "Internal server error".
    pub fn server_error() -> ResponseTemplate {
        error(500, "Internal server error")
    }

    /// 503 with an empty body.
    pub fn unavailable() -> ResponseTemplate {
        ResponseTemplate::new(503)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sequence_serves_in_order() {
        let server = TestHttpServer::start().await;
        server
            .sequence(
                "/flaky",
                vec![responses::unavailable(), responses::ok_json(serde_json::json!({"ok": true}))],
            )
            .await;

        let client = reqwest::Client::new();
        let first = client.get(server.url_for("/flaky")).send().await.unwrap();
        let second = client.get(server.url_for("/flaky")).send().await.unwrap();

        assert_eq!(first.status().as_u16(), 503);
        assert_eq!(second.status().as_u16(), 200);
        server.verify_received("/flaky", 2).await;
    }
}
