use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use http::HeaderMap;
use transport_errors::TransportError;

use crate::executor::{HttpExecutor, InboundResponse, OutboundRequest, ResponsePayload};

/// One scripted outcome for [`MockExecutor`].
#[derive(Clone)]
pub enum MockOutcome {
    /// Respond with the given status, headers, and buffered body.
    Response {
        /// HTTP status code to report.
        status: u16,
        /// Response headers.
        headers: HeaderMap,
        /// Response body bytes.
        body: Vec<u8>,
    },
    /// Fail the attempt with the given error, without touching the socket.
    Fail(fn() -> TransportError),
}

/// A scripted [`HttpExecutor`] that returns one [`MockOutcome`] per call, in
/// order, looping the last entry once exhausted. Lets tests exercise retry,
/// resurrection, and error-mapping logic without opening a socket.
pub struct MockExecutor {
    outcomes: Mutex<Vec<MockOutcome>>,
    calls: Mutex<usize>,
}

impl MockExecutor {
    /// Build an executor that yields `outcomes` in order.
    pub fn new(outcomes: Vec<MockOutcome>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes),
            calls: Mutex::new(0),
        }
    }

    /// Number of times `execute` has been called.
    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl HttpExecutor for MockExecutor {
    async fn execute(&self, _request: OutboundRequest) -> Result<InboundResponse, TransportError> {
        let mut calls = self.calls.lock().unwrap();
        let index = *calls;
        *calls += 1;
        drop(calls);

        let outcomes = self.outcomes.lock().unwrap();
        let outcome = outcomes
            .get(index)
            .or_else(|| outcomes.last())
            .expect("MockExecutor called with no scripted outcomes");

        match outcome {
            MockOutcome::Response { status, headers, body } => Ok(InboundResponse {
                status: *status,
                headers: headers.clone(),
                body: ResponsePayload::Bytes(Bytes::from(body.clone())),
            }),
            MockOutcome::Fail(make_err) => Err(make_err()),
        }
    }
}
