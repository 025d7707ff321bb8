//! Fluent client API over [`RequestExecutor`].

use crate::cancel::CancellationWatcher;
use crate::client::{HttpConfig, HttpError, ReqwestTransport};
use crate::config::retry_policy;
use crate::error::{ApiError, ApiResult};
use crate::executor::{IssueContext, IssueHandler, Policy, RequestExecutor, Tolerated};
use crate::request::{headers, Method, RequestConfig};
use crate::retry::{RetryPolicy, Sleeper};
use crate::transport::HttpTransport;
use crate::validate::{AcceptAny, Typed, Validator};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use vetted_common_config::ClientConfig;

/// A validating HTTP client.
///
/// Cheap to clone; clones share the transport and defaults.
#[derive(Debug, Clone)]
pub struct Client {
    executor: RequestExecutor,
    retry: Option<RetryPolicy>,
    tolerant: bool,
    label: Option<String>,
}

impl Client {
    /// Client over a default `reqwest` transport, without retries.
    pub fn new() -> Result<Self, HttpError> {
        Ok(Self::with_transport(Arc::new(ReqwestTransport::new()?)))
    }

    /// Client over `transport`, without retries.
    pub fn with_transport(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            executor: RequestExecutor::new(transport),
            retry: None,
            tolerant: false,
            label: None,
        }
    }

    /// Client built from loaded configuration.
    pub fn from_config(config: &ClientConfig) -> Result<Self, HttpError> {
        let transport = ReqwestTransport::with_config(HttpConfig::from(&config.http))?;
        let executor = RequestExecutor::new(Arc::new(transport))
            .with_defaults(RequestConfig::from(&config.request));

        Ok(Self {
            executor,
            retry: retry_policy(&config.retry)?,
            tolerant: config.validation.tolerant,
            label: config.validation.label.clone(),
        })
    }

    /// Configuration merged under every request.
    pub fn with_defaults(mut self, defaults: RequestConfig) -> Self {
        self.executor = self.executor.with_defaults(defaults);
        self
    }

    /// Retry policy used by requests that set none.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Sleeper used between attempts.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.executor = self.executor.with_sleeper(sleeper);
        self
    }

    /// The executor requests run on.
    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    /// Start a request with `method`.
    pub fn request(&self, method: Method, url: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder {
            client: self,
            request: RequestConfig::new(method, url),
            validator: None,
            tolerant: self.tolerant,
            label: self.label.clone(),
            retry: self.retry.clone(),
            on_validation_issue: None,
            timeout_ms: None,
            cancel: None,
            error: None,
        }
    }

    /// Start a GET request.
    pub fn get(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::Get, url)
    }

    /// Start a POST request.
    pub fn post(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::Post, url)
    }

    /// Start a PUT request.
    pub fn put(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::Put, url)
    }

    /// Start a PATCH request.
    pub fn patch(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::Patch, url)
    }

    /// Start a DELETE request.
    pub fn delete(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::Delete, url)
    }
}

/// One request being assembled. Nothing is sent until one of the `send`
/// methods is awaited.
#[must_use = "requests are only sent by `send`, `send_raw` or `send_tolerant`"]
pub struct RequestBuilder<'c> {
    client: &'c Client,
    request: RequestConfig,
    validator: Option<Arc<dyn Validator>>,
    tolerant: bool,
    label: Option<String>,
    retry: Option<RetryPolicy>,
    on_validation_issue: Option<IssueHandler>,
    timeout_ms: Option<u64>,
    cancel: Option<CancellationWatcher>,
    error: Option<ApiError>,
}

impl<'c> RequestBuilder<'c> {
    /// Set a header; names match case-insensitively.
    pub fn header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.request = self.request.header(name, value);
        self
    }

    /// Set `authorization: Bearer <token>`.
    pub fn bearer_auth(self, token: impl AsRef<str>) -> Self {
        let value = format!("Bearer {}", token.as_ref());
        self.header(headers::AUTHORIZATION, value)
    }

    /// Set `x-api-key`.
    pub fn api_key(self, key: impl Into<String>) -> Self {
        self.header(headers::X_API_KEY, key)
    }

    /// Send `body` as JSON. A body that cannot be serialized fails the
    /// request with a validation error when sent.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Self {
        match serde_json::to_value(body) {
            Ok(value) => self.request = self.request.body(value),
            Err(e) => {
                self.error = Some(ApiError::validation(format!("Invalid request body: {e}")))
            }
        }
        self
    }

    /// Timeout for this request, overriding client defaults.
    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Prefix for a relative URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.request = self.request.base_url(base_url);
        self
    }

    /// Validate the response body with `validator` instead of the default.
    pub fn validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Report validation issues instead of failing. Only
    /// [`send_raw`](Self::send_raw) and [`send_tolerant`](Self::send_tolerant)
    /// accept a tolerant request.
    pub fn tolerant(mut self, tolerant: bool) -> Self {
        self.tolerant = tolerant;
        self
    }

    /// Name used in place of `$` in violation paths.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Retry policy for this request.
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Disable retries for this request.
    pub fn no_retry(mut self) -> Self {
        self.retry = None;
        self
    }

    /// Handler called with tolerated violations.
    pub fn on_validation_issue<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str, &IssueContext) + Send + Sync + 'static,
    {
        self.on_validation_issue = Some(Arc::new(handler));
        self
    }

    /// Abort the request when `watcher` fires.
    pub fn cancel_on(mut self, watcher: CancellationWatcher) -> Self {
        self.cancel = Some(watcher);
        self
    }

    /// Send and decode the body into `T`.
    ///
    /// Without an explicit validator the body must deserialize into `T`.
    /// A tolerant request fails with a validation error before dispatch.
    pub async fn send<T: DeserializeOwned + 'static>(self) -> ApiResult<T> {
        let (client, request, policy) = self.into_parts(Arc::new(Typed::<T>::new()))?;
        client.executor.execute(&request, &policy).await
    }

    /// Send and decode the body into `T`, keeping the raw body when a
    /// tolerant request does not decode.
    ///
    /// Without an explicit validator any body is accepted, so tolerated
    /// issues come only from `T` itself.
    pub async fn send_tolerant<T: DeserializeOwned>(self) -> ApiResult<Tolerated<T>> {
        let (client, request, policy) = self.into_parts(Arc::new(AcceptAny))?;
        client.executor.execute_tolerant(&request, &policy).await
    }

    /// Send and return the body as JSON.
    ///
    /// Without an explicit validator any body is accepted.
    pub async fn send_raw(self) -> ApiResult<Value> {
        let (client, request, policy) = self.into_parts(Arc::new(AcceptAny))?;
        client.executor.execute_raw(&request, &policy).await
    }

    fn into_parts(
        self,
        fallback: Arc<dyn Validator>,
    ) -> ApiResult<(&'c Client, RequestConfig, Policy)> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let mut policy = Policy::from_arc(self.validator.unwrap_or(fallback)).tolerant(self.tolerant);
        if let Some(label) = self.label {
            policy = policy.label(label);
        }
        if let Some(retry) = self.retry {
            policy = policy.retry(retry);
        }
        if let Some(timeout_ms) = self.timeout_ms {
            policy = policy.timeout_ms(timeout_ms);
        }
        if let Some(watcher) = self.cancel {
            policy = policy.cancel_on(watcher);
        }
        if let Some(handler) = self.on_validation_issue {
            policy = policy.on_validation_issue(move |message, context| handler(message, context));
        }

        Ok((self.client, self.request, policy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use crate::testing::{RecordingSleeper, ScriptedTransport};
    use crate::transport::TransportError;
    use crate::validate::{FieldKind, Schema};
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        id: u64,
        name: String,
    }

    fn client(transport: &Arc<ScriptedTransport>) -> Client {
        Client::with_transport(transport.clone())
            .with_defaults(RequestConfig::default().base_url("https://api.example.com"))
            .with_sleeper(Arc::new(RecordingSleeper::default()))
    }

    #[tokio::test]
    async fn test_send_decodes_typed_body() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(200, json!({"id": 1, "name": "John Doe"}));

        let user: User = client(&transport).get("/users/1").send().await.unwrap();
        assert_eq!(user, User { id: 1, name: "John Doe".into() });
    }

    #[tokio::test]
    async fn test_send_rejects_mismatched_body() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(200, json!({"id": "1", "name": "John Doe"}));

        let error = client(&transport)
            .get("/users/1")
            .label("User")
            .send::<User>()
            .await
            .unwrap_err();

        assert_eq!(error.category, ErrorCategory::Validation);
        assert!(error.message.contains("User: "));
    }

    #[tokio::test]
    async fn test_builder_sets_headers_and_body() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(201, json!({"id": 9}));

        let body = client(&transport)
            .post("/orders")
            .bearer_auth("secret")
            .api_key("k-1")
            .header("x-trace", "t")
            .json(&json!({"qty": 2}))
            .timeout_ms(750)
            .send_raw()
            .await
            .unwrap();

        assert_eq!(body, json!({"id": 9}));
        let request = &transport.requests()[0];
        assert_eq!(request.method(), Method::Post);
        assert_eq!(request.resolved_url(), "https://api.example.com/orders");
        assert_eq!(request.headers()["authorization"], "Bearer secret");
        assert_eq!(request.headers()["x-api-key"], "k-1");
        assert_eq!(request.headers()["x-trace"], "t");
        assert_eq!(request.body(), Some(&json!({"qty": 2})));
        assert_eq!(request.timeout_ms(), Some(750));
    }

    #[tokio::test]
    async fn test_client_retry_default_applies_and_can_be_disabled() {
        let transport = Arc::new(ScriptedTransport::new());
        transport
            .fail(TransportError::network("down"))
            .respond(200, json!({}))
            .fail(TransportError::network("down"));
        let client = client(&transport).with_retry(RetryPolicy::linear(2, 1).unwrap());

        assert!(client.get("/a").send_raw().await.is_ok());
        let error = client.get("/b").no_retry().send_raw().await.unwrap_err();

        assert!(error.is_network());
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn test_tolerant_builder_reports_issue() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(200, json!({"id": "1"}));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let body = client(&transport)
            .get("/users/1")
            .validator(Schema::object().field("id", FieldKind::Number))
            .tolerant(true)
            .on_validation_issue({
                let seen = seen.clone();
                move |message, _| seen.lock().unwrap().push(message.to_string())
            })
            .send_raw()
            .await
            .unwrap();

        assert_eq!(body, json!({"id": "1"}));
        assert_eq!(*seen.lock().unwrap(), vec!["$.id: expected number, found string"]);
    }

    #[tokio::test]
    async fn test_typed_send_refuses_tolerant_request() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(200, json!({"id": "1", "name": "John Doe"}));
        let seen = Arc::new(Mutex::new(0));

        let error = client(&transport)
            .get("/users/1")
            .validator(Schema::object().field("id", FieldKind::Number))
            .tolerant(true)
            .on_validation_issue({
                let seen = seen.clone();
                move |_, _| *seen.lock().unwrap() += 1
            })
            .send::<User>()
            .await
            .unwrap_err();

        assert_eq!(error.category, ErrorCategory::Validation);
        assert_eq!(error.message, crate::executor::TOLERANT_TYPED);
        assert_eq!(*seen.lock().unwrap(), 0);
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_send_tolerant_keeps_raw_body() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(200, json!({"id": "1", "name": "John Doe"}));
        transport.respond(200, json!({"id": 2, "name": "Jane Doe"}));
        let seen: Arc<Mutex<Vec<String>>> = Arc::default();
        let client = client(&transport);

        fn tolerant_get<'c>(
            client: &'c Client,
            path: &str,
            seen: &Arc<Mutex<Vec<String>>>,
        ) -> RequestBuilder<'c> {
            let seen = seen.clone();
            client
                .get(path)
                .validator(Schema::object().field("id", FieldKind::Number))
                .tolerant(true)
                .on_validation_issue(move |message, _| {
                    seen.lock().unwrap().push(message.to_string())
                })
        }

        let first = tolerant_get(&client, "/users/1", &seen)
            .send_tolerant::<User>()
            .await
            .unwrap();
        let second = tolerant_get(&client, "/users/2", &seen)
            .send_tolerant::<User>()
            .await
            .unwrap();

        assert_eq!(first.raw(), Some(&json!({"id": "1", "name": "John Doe"})));
        assert_eq!(
            second,
            Tolerated::Decoded(User { id: 2, name: "Jane Doe".into() })
        );
        assert_eq!(*seen.lock().unwrap(), vec!["$.id: expected number, found string"]);
    }

    #[tokio::test]
    async fn test_bearer_auth_replaces_default_of_different_case() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(200, json!({}));
        let mut defaults = RequestConfig::default().base_url("https://api.example.com");
        defaults
            .headers
            .insert("Authorization".to_string(), "Bearer default".to_string());

        Client::with_transport(transport.clone())
            .with_defaults(defaults)
            .get("/me")
            .bearer_auth("call")
            .send_raw()
            .await
            .unwrap();

        let request = &transport.requests()[0];
        assert_eq!(request.headers().len(), 1);
        assert_eq!(request.headers()["authorization"], "Bearer call");
    }

    #[tokio::test]
    async fn test_unserializable_body_fails_without_dispatch() {
        let transport = Arc::new(ScriptedTransport::new());
        let body = std::collections::HashMap::from([((1, 2), "tuple keys are not strings")]);

        let error = client(&transport).post("/x").json(&body).send_raw().await.unwrap_err();

        assert_eq!(error.category, ErrorCategory::Validation);
        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn test_from_config() {
        let mut config = ClientConfig::default();
        config.request.base_url = Some("https://api.example.com".to_string());
        config.retry.enabled = true;
        config.validation.tolerant = true;

        let client = Client::from_config(&config).unwrap();
        assert_eq!(
            client.executor().defaults().base_url.as_deref(),
            Some("https://api.example.com")
        );
        assert_eq!(client.retry.as_ref().map(RetryPolicy::max_attempts), Some(3));
        assert!(client.tolerant);
    }

    #[test]
    fn test_from_config_rejects_zero_attempts() {
        let mut config = ClientConfig::default();
        config.retry.enabled = true;
        config.retry.max_attempts = 0;

        assert!(matches!(Client::from_config(&config), Err(HttpError::Retry(_))));
    }
}
