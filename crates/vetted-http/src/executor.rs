//! Request execution: merge, dispatch, validate, classify, retry.

use crate::cancel::CancellationWatcher;
use crate::error::{ApiError, ApiResult, ErrorCategory};
use crate::request::{merge, Method, RequestConfig, RequestDescriptor};
use crate::retry::{RetryDecision, RetryPolicy, RetryState, Sleeper, TokioSleeper};
use crate::status;
use crate::transport::{HttpTransport, TransportError, TransportResponse};
use crate::validate::{AcceptAny, ValidationContext, Validator};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;
use vetted_common_log::spans;

/// Where a tolerated validation issue came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueContext {
    /// Always [`ErrorCategory::Validation`].
    pub category: ErrorCategory,
    /// Fully resolved request URL.
    pub url: String,
    /// Request method.
    pub method: Method,
}

/// Receives the joined violation messages of a tolerated response.
pub type IssueHandler = Arc<dyn Fn(&str, &IssueContext) + Send + Sync>;

/// Message returned when a tolerant policy reaches a typed entry point.
pub const TOLERANT_TYPED: &str =
    "Tolerant policies return raw data; use execute_raw or execute_tolerant";

/// Body of a tolerant typed request.
#[derive(Debug, Clone, PartialEq)]
pub enum Tolerated<T> {
    /// The body decoded into `T`.
    Decoded(T),
    /// The body did not decode; kept as received.
    Raw(Value),
}

impl<T> Tolerated<T> {
    /// The decoded value, if decoding succeeded.
    pub fn into_decoded(self) -> Option<T> {
        match self {
            Self::Decoded(value) => Some(value),
            Self::Raw(_) => None,
        }
    }

    /// The raw body, if decoding failed.
    pub fn raw(&self) -> Option<&Value> {
        match self {
            Self::Decoded(_) => None,
            Self::Raw(body) => Some(body),
        }
    }

    /// Whether decoding failed.
    pub fn is_raw(&self) -> bool {
        matches!(self, Self::Raw(_))
    }
}

/// How a response is validated and how failures are retried.
#[derive(Clone)]
pub struct Policy {
    validator: Arc<dyn Validator>,
    tolerant: bool,
    label: Option<String>,
    on_validation_issue: Option<IssueHandler>,
    retry: Option<RetryPolicy>,
    timeout_ms: Option<u64>,
    cancel: Option<CancellationWatcher>,
}

impl Policy {
    /// Create a new strict policy around `validator`, without retries.
    pub fn new(validator: impl Validator + 'static) -> Self {
        Self::from_arc(Arc::new(validator))
    }

    /// Create a new policy around a shared validator.
    pub fn from_arc(validator: Arc<dyn Validator>) -> Self {
        Self {
            validator,
            tolerant: false,
            label: None,
            on_validation_issue: None,
            retry: None,
            timeout_ms: None,
            cancel: None,
        }
    }

    /// Accept any body.
    pub fn accept_any() -> Self {
        Self::new(AcceptAny)
    }

    /// Replace the validator, keeping every other setting.
    pub fn validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = validator;
        self
    }

    /// In tolerant mode validation issues are reported to the issue handler
    /// and the raw body is returned anyway.
    pub fn tolerant(mut self, tolerant: bool) -> Self {
        self.tolerant = tolerant;
        self
    }

    /// Name used in place of `$` in violation paths.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
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

    /// Retry transient failures with `retry`.
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Timeout that wins over the request's own.
    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Abort the request when `watcher` fires.
    pub fn cancel_on(mut self, watcher: CancellationWatcher) -> Self {
        self.cancel = Some(watcher);
        self
    }

    /// Whether validation issues are tolerated.
    pub fn is_tolerant(&self) -> bool {
        self.tolerant
    }

    /// The retry policy, if any.
    pub fn retry_policy(&self) -> Option<&RetryPolicy> {
        self.retry.as_ref()
    }
}

impl fmt::Debug for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Policy")
            .field("tolerant", &self.tolerant)
            .field("label", &self.label)
            .field("on_validation_issue", &self.on_validation_issue.is_some())
            .field("retry", &self.retry)
            .field("timeout_ms", &self.timeout_ms)
            .field("cancellable", &self.cancel.is_some())
            .finish()
    }
}

/// Result of one dispatch attempt.
enum Attempt {
    /// Final; no retry can change it.
    Done(ApiResult<Value>),
    /// Possibly transient.
    Failed(ApiError),
}

/// Drives requests through a transport.
///
/// Holds no per-request state, so one executor can serve concurrent calls.
#[derive(Clone)]
pub struct RequestExecutor {
    transport: Arc<dyn HttpTransport>,
    defaults: RequestConfig,
    sleeper: Arc<dyn Sleeper>,
}

impl RequestExecutor {
    /// Create a new executor over `transport` with empty defaults.
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            defaults: RequestConfig::default(),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Configuration every request is merged onto.
    pub fn with_defaults(mut self, defaults: RequestConfig) -> Self {
        self.defaults = defaults;
        self
    }

    /// Sleeper used between attempts.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Configuration every request is merged onto.
    pub fn defaults(&self) -> &RequestConfig {
        &self.defaults
    }

    /// Execute a request and decode the validated body into `T`.
    ///
    /// A body that passes the policy's validator but cannot be decoded into
    /// `T` is a validation error. Tolerant policies are refused before
    /// dispatch; use [`execute_tolerant`](Self::execute_tolerant) instead.
    pub async fn execute<T: DeserializeOwned>(
        &self,
        request: &RequestConfig,
        policy: &Policy,
    ) -> ApiResult<T> {
        if policy.tolerant {
            tracing::warn!("rejected tolerant policy on typed request");
            return Err(ApiError::validation(TOLERANT_TYPED));
        }
        let body = self.execute_raw(request, policy).await?;
        serde_json::from_value(body).map_err(ApiError::invalid_data)
    }

    /// Execute a request and decode the body into `T` when it fits.
    ///
    /// Under a tolerant policy a body that does not decode is returned as
    /// [`Tolerated::Raw`] after the issue handler has seen it. Under a strict
    /// policy this behaves like [`execute`](Self::execute).
    pub async fn execute_tolerant<T: DeserializeOwned>(
        &self,
        request: &RequestConfig,
        policy: &Policy,
    ) -> ApiResult<Tolerated<T>> {
        let body = self.execute_raw(request, policy).await?;
        match T::deserialize(&body) {
            Ok(value) => Ok(Tolerated::Decoded(value)),
            Err(e) if policy.tolerant => {
                tracing::warn!(error = %e, "tolerating undecodable response data");
                Ok(Tolerated::Raw(body))
            }
            Err(e) => Err(ApiError::invalid_data(e)),
        }
    }

    /// Execute a request and return the body the validator accepted, or in
    /// tolerant mode the raw body.
    pub async fn execute_raw(&self, request: &RequestConfig, policy: &Policy) -> ApiResult<Value> {
        let overrides = match policy.timeout_ms {
            Some(timeout_ms) => request.clone().timeout_ms(timeout_ms),
            None => request.clone(),
        };
        let merged = merge(&self.defaults, &overrides);

        let span = spans::request_span(
            merged.method.unwrap_or_default().as_str(),
            merged.url.as_deref().unwrap_or_default(),
        );

        async {
            let descriptor = match merged.into_descriptor() {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    tracing::warn!(error = %e, "rejected request configuration");
                    return Err(ApiError::validation(e.to_string()));
                }
            };

            if let Some(retry) = &policy.retry {
                if let Err(e) = retry.validate() {
                    tracing::warn!(error = %e, "rejected retry policy");
                    return Err(ApiError::validation(e.to_string()));
                }
            }

            self.run(&descriptor, policy).await
        }
        .instrument(span)
        .await
    }

    async fn run(&self, descriptor: &RequestDescriptor, policy: &Policy) -> ApiResult<Value> {
        let timer = spans::Timer::start("execute");
        let mut state = RetryState::new(policy.retry.as_ref());

        let result = loop {
            let attempt = state.attempt();
            let outcome = spans::instrument_future(
                self.attempt(descriptor, policy),
                spans::attempt_span(attempt, state.max_attempts()),
            )
            .await;

            let error = match outcome {
                Attempt::Done(result) => break result,
                Attempt::Failed(error) => error,
            };

            match state.on_failure(&error) {
                RetryDecision::Retry { attempt, delay } => {
                    tracing::warn!(
                        category = %error.category,
                        status = error.status,
                        error = %error.message,
                        next_attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        "attempt failed, retrying"
                    );
                    if let Err(cancelled) = self.wait(delay, policy).await {
                        break Err(cancelled);
                    }
                }
                RetryDecision::Stop => break Err(error),
            }
        };

        let outcome = match &result {
            Ok(_) => "success",
            Err(error) => error.category.as_str(),
        };
        spans::record_outcome(&tracing::Span::current(), state.attempt(), outcome);
        if let Err(error) = &result {
            tracing::debug!(
                category = %error.category,
                status = error.status,
                error = %error.message,
                attempts = state.attempt(),
                elapsed_ms = %timer.elapsed_ms(),
                "request failed"
            );
        }
        timer.finish();
        result
    }

    async fn attempt(&self, descriptor: &RequestDescriptor, policy: &Policy) -> Attempt {
        if policy.cancel.as_ref().is_some_and(CancellationWatcher::is_cancelled) {
            return Attempt::Done(Err(ApiError::cancelled("Request cancelled")));
        }

        let response = match self.dispatch(descriptor, policy).await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(kind = %e.kind, error = %e.message, "transport error");
                return Attempt::Failed(ApiError::from_transport(&e));
            }
        };

        let TransportResponse { status, body, .. } = response;
        let body = match body {
            Some(body) if status::is_valid_status(status) => body,
            Some(_) => {
                return Attempt::Done(Err(ApiError::validation(format!(
                    "Invalid response: status {status} is not an HTTP status"
                ))))
            }
            None => {
                return Attempt::Done(Err(ApiError::validation(
                    "Invalid response: missing body",
                )))
            }
        };

        if !status::is_success(status) {
            return Attempt::Failed(ApiError::from_response(status, Some(&body)));
        }

        tracing::debug!(status, "response received");
        Attempt::Done(self.validate(descriptor, policy, body))
    }

    async fn dispatch(
        &self,
        descriptor: &RequestDescriptor,
        policy: &Policy,
    ) -> Result<TransportResponse, TransportError> {
        match &policy.cancel {
            Some(watcher) => {
                let mut watcher = watcher.clone();
                tokio::select! {
                    result = self.transport.dispatch(descriptor) => result,
                    _ = watcher.cancelled() => Err(TransportError::cancelled("Request cancelled")),
                }
            }
            None => self.transport.dispatch(descriptor).await,
        }
    }

    /// Sleep between attempts; cancellation cuts the wait short.
    async fn wait(&self, delay: Duration, policy: &Policy) -> ApiResult<()> {
        match &policy.cancel {
            Some(watcher) => {
                let mut watcher = watcher.clone();
                tokio::select! {
                    _ = self.sleeper.sleep(delay) => Ok(()),
                    _ = watcher.cancelled() => Err(ApiError::cancelled("Request cancelled")),
                }
            }
            None => {
                self.sleeper.sleep(delay).await;
                Ok(())
            }
        }
    }

    fn validate(
        &self,
        descriptor: &RequestDescriptor,
        policy: &Policy,
        body: Value,
    ) -> ApiResult<Value> {
        let mut ctx = ValidationContext::new(policy.label.as_deref());
        let valid =
            vetted_common_log::timed!("validate", policy.validator.check(&body, &mut ctx));
        let root = ctx.root();
        let violations = ctx.into_violations();

        if policy.tolerant {
            if !violations.is_empty() {
                let message = violations.join("; ");
                tracing::warn!(violations = violations.len(), issues = %message, "tolerating invalid response data");
                if let Some(handler) = &policy.on_validation_issue {
                    let context = IssueContext {
                        category: ErrorCategory::Validation,
                        url: descriptor.resolved_url(),
                        method: descriptor.method(),
                    };
                    handler(&message, &context);
                }
            }
            return Ok(body);
        }

        if valid {
            return Ok(body);
        }

        let detail = if violations.is_empty() {
            format!("{root} does not match the expected shape")
        } else {
            violations.join("; ")
        };
        Err(ApiError::invalid_data(detail))
    }
}

impl fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}
