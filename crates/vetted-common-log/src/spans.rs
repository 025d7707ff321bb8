//! Span helpers for request execution.

use std::future::Future;
use tracing::{debug_span, info_span, Instrument, Span};

/// Span covering one `execute` call, from config merge to final result.
pub fn request_span(method: &str, url: &str) -> Span {
    info_span!(
        "request",
        method = %method,
        url = %url,
        attempts = tracing::field::Empty,
        outcome = tracing::field::Empty,
    )
}

/// Span covering a single dispatch attempt.
pub fn attempt_span(attempt: u32, max_attempts: u32) -> Span {
    debug_span!("attempt", attempt, max_attempts)
}

/// Instrument a future with a span.
pub fn instrument_future<F: Future>(future: F, span: Span) -> impl Future<Output = F::Output> {
    future.instrument(span)
}

/// Record the number of attempts and the outcome on a request span.
pub fn record_outcome(span: &Span, attempts: u32, outcome: &str) {
    span.record("attempts", attempts);
    span.record("outcome", outcome);
}

/// Timing utility for operations.
pub struct Timer {
    start: std::time::Instant,
    operation: &'static str,
}

impl Timer {
    /// Start a new timer.
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: std::time::Instant::now(),
            operation,
        }
    }

    /// Milliseconds elapsed since the timer started.
    pub fn elapsed_ms(&self) -> u128 {
        self.start.elapsed().as_millis()
    }

    /// Complete the timer and record duration.
    pub fn finish(self) {
        tracing::debug!(
            operation = %self.operation,
            duration_ms = %self.elapsed_ms(),
            "operation completed"
        );
    }
}

/// Macro for timing a block of code.
#[macro_export]
macro_rules! timed {
    ($name:expr, $body:expr) => {{
        let _timer = $crate::spans::Timer::start($name);
        let result = $body;
        _timer.finish();
        result
    }};
}
