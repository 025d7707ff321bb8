//! In-memory transport and sleeper for exercising the executor without a
//! network.

use crate::request::RequestDescriptor;
use crate::retry::Sleeper;
use crate::transport::{HttpTransport, TransportError, TransportResponse};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// Replays queued outcomes in order and records every request it sees.
///
/// Dispatching past the end of the script yields a transport error of kind
/// `Other`.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<TransportResponse, TransportError>>>,
    requests: Mutex<Vec<RequestDescriptor>>,
}

impl ScriptedTransport {
    /// Create a new transport with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response.
    pub fn respond(&self, status: u16, body: Value) -> &Self {
        self.push(Ok(TransportResponse::new(status, body)))
    }

    /// Queue a full response.
    pub fn respond_with(&self, response: TransportResponse) -> &Self {
        self.push(Ok(response))
    }

    /// Queue a transport failure.
    pub fn fail(&self, error: TransportError) -> &Self {
        self.push(Err(error))
    }

    fn push(&self, outcome: Result<TransportResponse, TransportError>) -> &Self {
        self.script.lock().unwrap().push_back(outcome);
        self
    }

    /// Number of dispatches so far.
    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Every request dispatched so far, in order.
    pub fn requests(&self) -> Vec<RequestDescriptor> {
        self.requests.lock().unwrap().clone()
    }

    /// Outcomes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn dispatch(
        &self,
        request: &RequestDescriptor,
    ) -> Result<TransportResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::other("script exhausted")))
    }
}

/// Records requested delays and returns immediately.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    /// Requested delays, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }

    /// Sum of requested delays.
    pub fn total(&self) -> Duration {
        self.sleeps.lock().unwrap().iter().sum()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequestConfig;
    use serde_json::json;

    #[tokio::test]
    async fn test_scripted_transport_replays_in_order() {
        let transport = ScriptedTransport::new();
        transport
            .fail(TransportError::network("down"))
            .respond(200, json!({"ok": true}));
        let request = RequestConfig::get("/x").into_descriptor().unwrap();

        assert!(transport.dispatch(&request).await.is_err());
        let response = transport.dispatch(&request).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(transport.calls(), 2);
        assert_eq!(transport.remaining(), 0);

        let exhausted = transport.dispatch(&request).await.unwrap_err();
        assert_eq!(exhausted.message, "script exhausted");
    }

    #[tokio::test]
    async fn test_recording_sleeper() {
        let sleeper = RecordingSleeper::default();
        sleeper.sleep(Duration::from_millis(5)).await;
        sleeper.sleep(Duration::from_millis(10)).await;

        assert_eq!(sleeper.sleeps().len(), 2);
        assert_eq!(sleeper.total(), Duration::from_millis(15));
    }
}
