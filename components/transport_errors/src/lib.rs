//! transport_errors component
//!
//! Error taxonomy shared by every layer of the transport: connections, pools,
//! and the orchestrator. All failure kinds funnel into a single enum so
//! callers can match on `TransportError` without caring which layer raised it.
//!
//! # Examples
//!
//! ```
//! use transport_errors::{TransportError, TransportResult};
//!
//! fn pick_endpoint(has_any: bool) -> TransportResult<()> {
//!     if !has_any {
//!         return Err(TransportError::NoLivingConnections);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

use std::time::Duration;
use thiserror::Error;

/// Metadata attached to a [`TransportError::Response`], enough for a caller
/// to distinguish application-level failures (bad query, missing index, ...)
/// from transport-level ones without re-parsing the body.
#[derive(Debug, Clone)]
pub struct ResponseErrorMeta {
    /// HTTP status code returned by the endpoint.
    pub status: u16,
    /// Parsed JSON body, when the response carried one.
    pub body: Option<serde_json::Value>,
    /// Request id this response belongs to, for log correlation.
    pub request_id: u64,
}

impl ResponseErrorMeta {
    /// `body.error.type`, when the body is a JSON object shaped like a
    /// typical error response. Used to build a short, stable error message.
    pub fn error_type(&self) -> Option<&str> {
        self.body.as_ref()?.get("error")?.get("type")?.as_str()
    }
}

/// The errors that may occur while routing a request through the transport.
///
/// Every variant is either retry-eligible or not; see [`TransportError::is_retryable`].
#[derive(Debug, Error)]
pub enum TransportError {
    /// Invalid configuration supplied at construction time (bad connection
    /// scheme, bad compression value, unknown role name, ...). Never
    /// retried; always surfaced synchronously.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A value could not be JSON-encoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A response body could not be JSON-decoded.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// The per-attempt deadline elapsed before a response arrived.
    /// Retry-eligible; marks the connection dead.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Any other transport-level failure (socket error, broken pipe, a
    /// stream that errored mid-body). Retry-eligible; marks the connection
    /// dead.
    #[error("connection error: {0}")]
    Connection(String),

    /// The pool had no alive, filter-approved connection to offer.
    /// Never retried; surfaced immediately.
    #[error("no living connections")]
    NoLivingConnections,

    /// The endpoint returned a status code >= 400 that the caller did not
    /// ask to ignore.
    #[error("response error: {}", display_response(.0))]
    Response(ResponseErrorMeta),

    /// The caller aborted the request. Never retried.
    #[error("request aborted")]
    RequestAborted,
}

fn display_response(meta: &ResponseErrorMeta) -> String {
    match meta.error_type() {
        Some(kind) => format!("{} ({kind})", meta.status),
        None => meta.status.to_string(),
    }
}

impl TransportError {
    /// Whether the transport should attempt another try after this error,
    /// ignoring the retry budget itself (see the design's error policy:
    /// 429 and aborts are never retried even though other conditions might
    /// allow it).
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Timeout(_) | TransportError::Connection(_) => true,
            TransportError::Response(meta) => matches!(meta.status, 502..=504),
            _ => false,
        }
    }

    /// Whether this error should cause the originating connection to be
    /// marked dead.
    pub fn marks_dead(&self) -> bool {
        self.is_retryable()
    }
}

/// A `Result` alias where the `Err` case is [`TransportError`].
pub type TransportResult<T> = Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_error_extracts_error_type() {
        let meta = ResponseErrorMeta {
            status: 404,
            body: Some(serde_json::json!({"error": {"type": "index_not_found_exception"}})),
            request_id: 1,
        };
        assert_eq!(meta.error_type(), Some("index_not_found_exception"));
        let err = TransportError::Response(meta);
        assert!(err.to_string().contains("index_not_found_exception"));
    }

    #[test]
    fn retry_eligibility_matches_taxonomy() {
        assert!(TransportError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(TransportError::Connection("reset".into()).is_retryable());
        assert!(!TransportError::RequestAborted.is_retryable());
        assert!(!TransportError::NoLivingConnections.is_retryable());
        assert!(!TransportError::Configuration("bad".into()).is_retryable());

        let retryable_status = ResponseErrorMeta {
            status: 503,
            body: None,
            request_id: 1,
        };
        assert!(TransportError::Response(retryable_status).is_retryable());

        let non_retryable_status = ResponseErrorMeta {
            status: 429,
            body: None,
            request_id: 1,
        };
        assert!(!TransportError::Response(non_retryable_status).is_retryable());
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TransportError>();
    }
}
