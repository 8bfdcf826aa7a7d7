//! Transport events
//!
//! The emitter is an injected sink; when absent, every emit is a no-op. No
//! subscriber should assume a specific thread/task context delivers these.

use std::sync::Arc;

use http::Method;
use transport_pool::ResurrectOutcome;
use transport_types::{RequestId, SniffReason};

/// One observable transition in a request's or the transport's lifecycle.
#[derive(Debug, Clone)]
pub enum Event {
    /// Fired just before a request attempt hits the wire.
    Request {
        /// Request id.
        request_id: RequestId,
        /// HTTP method.
        method: Method,
        /// Resolved request path.
        path: String,
        /// Attempt number, starting at 0.
        attempt: u32,
    },
    /// Fired exactly once per request, after its terminal outcome.
    Response {
        /// Request id.
        request_id: RequestId,
        /// Status code, when the outcome reached the HTTP layer.
        status: Option<u16>,
        /// A short description of the failure, when the outcome was an
        /// error.
        error: Option<String>,
    },
    /// Fired after a sniff round completes, successfully or not.
    Sniff {
        /// Request id of the sniff sub-request.
        request_id: RequestId,
        /// Number of hosts discovered, when successful.
        hosts: usize,
        /// Why this sniff was triggered.
        reason: SniffReason,
        /// A short description of the failure, when the sniff failed.
        error: Option<String>,
    },
    /// Forwarded from the pool's own resurrection bookkeeping.
    Resurrect(ResurrectOutcome),
}

/// An injected sink for [`Event`]s. Defaults to a no-op.
pub type EventSink = Arc<dyn Fn(Event) + Send + Sync>;

/// A sink that discards every event.
pub fn no_op_sink() -> EventSink {
    Arc::new(|_event: Event| {})
}
