use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use http::{HeaderMap, Method};
use transport_errors::TransportError;
use url::Url;

/// A request body, either fully buffered or a stream of chunks.
///
/// Stream bodies are piped through as they arrive; errors encountered while
/// draining the stream surface as [`TransportError::Connection`].
pub enum RequestPayload {
    /// A body already resident in memory.
    Bytes(Bytes),
    /// A body produced incrementally by the caller.
    Stream(Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send + Sync>>),
}

impl RequestPayload {
    /// Whether this payload is a stream, which forces `maxRetries=0` at the
    /// transport layer (stream bodies are not replayable).
    pub fn is_stream(&self) -> bool {
        matches!(self, RequestPayload::Stream(_))
    }
}

/// A fully specified outbound HTTP request, as built by the transport after
/// body encoding, compression, and header merging.
pub struct OutboundRequest {
    /// HTTP method.
    pub method: Method,
    /// Fully resolved request URL, including any merged querystring.
    pub url: Url,
    /// Request headers, already merged and case-normalized.
    pub headers: HeaderMap,
    /// Request body.
    pub body: RequestPayload,
    /// Per-attempt deadline.
    pub timeout: Duration,
    /// When true, the caller wants the raw response handed through without
    /// buffering or decompression.
    pub as_stream: bool,
}

/// A response body, either fully buffered or a stream of chunks.
pub enum ResponsePayload {
    /// A body collected in full, already decompressed when `as_stream` was
    /// false and `Content-Encoding` named a supported scheme.
    Bytes(Bytes),
    /// The raw response stream, handed through untouched because the
    /// caller asked for `as_stream`.
    Stream(Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send + Sync>>),
}

impl std::fmt::Debug for ResponsePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponsePayload::Bytes(b) => f.debug_tuple("Bytes").field(b).finish(),
            ResponsePayload::Stream(_) => write!(f, "Stream(..)"),
        }
    }
}

/// The outcome of one request/response exchange over a single connection.
#[derive(Debug)]
pub struct InboundResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: ResponsePayload,
}

/// The pluggable HTTP layer a [`crate::Connection`] drives.
///
/// Production code uses [`crate::HyperExecutor`]; tests inject a mock that
/// returns scripted outcomes without opening a socket, per the teacher's
/// pattern of injecting the HTTP layer as a trait object.
#[async_trait]
pub trait HttpExecutor: Send + Sync {
    /// Execute one request and return its response, or a transport-level
    /// failure (timeout, connection reset, abort).
    async fn execute(&self, request: OutboundRequest) -> Result<InboundResponse, TransportError>;
}
