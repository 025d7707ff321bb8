//! Validating, retrying HTTP requests.
//!
//! Every request returns an [`ApiResult`]: the validated body, or an
//! [`ApiError`] carrying a status, a message, and an [`ErrorCategory`].
//! Nothing escapes as a panic or a raw transport error.
//!
//! ```no_run
//! use serde::Deserialize;
//! use vetted_http::{Client, RetryPolicy};
//!
//! #[derive(Deserialize)]
//! struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::new()?;
//! let user: User = client
//!     .get("https://api.example.com/users/1")
//!     .retry(RetryPolicy::exponential(3, 200)?)
//!     .send()
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod cancel;
pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod request;
pub mod response;
pub mod retry;
pub mod status;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
pub mod transport;
pub mod validate;

pub use builder::{Client, RequestBuilder};
pub use cancel::{CancellationToken, CancellationWatcher};
pub use client::{build_client, HttpConfig, HttpError, ReqwestTransport};
pub use error::{classify, ApiError, ApiResult, Classification, ErrorCategory, Failure};
pub use executor::{IssueContext, IssueHandler, Policy, RequestExecutor, Tolerated};
pub use request::{
    merge, normalize_headers, Headers, Method, RequestConfig, RequestDescriptor, RequestError,
};
pub use retry::{Backoff, PolicyError, RetryDecision, RetryPolicy, RetryState, Sleeper, TokioSleeper};
pub use transport::{HttpTransport, TransportError, TransportErrorKind, TransportResponse};
pub use validate::{from_fn, AcceptAny, FieldKind, Schema, Typed, ValidationContext, Validator};

/// Re-exports for convenience.
pub mod prelude {
    pub use crate::{
        ApiError, ApiResult, Backoff, Client, ErrorCategory, FieldKind, Policy, RequestConfig,
        RequestExecutor, RetryPolicy, Schema, Tolerated, Typed, Validator,
    };
}
