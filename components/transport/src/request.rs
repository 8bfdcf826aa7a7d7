//! Request/response shapes for [`crate::Transport::request`]
//!
//! `RequestParams` is what a caller builds; `RequestOptions` carries the
//! per-call overrides the distilled spec keeps separate from the params
//! object (timeout, retries, compression, `ignore` list); `TransportResponse`
//! is the terminal outcome, win or lose.

use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures::Stream;
use http::{HeaderMap, Method};
use serde_json::Value;
use transport_types::{Compression, RequestId, SniffReason};

/// A byte stream used for request or response bodies that should not be
/// buffered in full.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send + Sync>>;

/// A request body, in one of the forms the body-encoding step understands.
pub enum RequestBody {
    /// JSON-encoded via `Serializer::serialize` unless the caller already
    /// set a `Content-Type`.
    Json(Value),
    /// Sent as-is; the caller is responsible for `Content-Type`.
    Raw(Bytes),
    /// Piped through; forces `max_retries` to 0 (not replayable).
    Stream(ByteStream),
}

impl RequestBody {
    /// Whether this body forces the retry budget to zero.
    pub fn is_stream(&self) -> bool {
        matches!(self, RequestBody::Stream(_))
    }
}

/// One element of a `bulkBody`: emitted verbatim if already a string, else
/// JSON-encoded, each followed by `\n` (`Serializer::ndserialize`).
pub enum BulkBodyItem {
    /// Emitted as-is.
    Raw(String),
    /// JSON-encoded.
    Value(Value),
}

/// A `bulkBody`, encoded as newline-delimited JSON.
pub enum BulkBody {
    /// A sequence of actions/documents to ndjson-encode.
    Items(Vec<BulkBodyItem>),
    /// A pre-encoded ndjson payload, sent as-is.
    Raw(Bytes),
}

/// The request a caller wants to send. Exactly one of `body`/`bulk_body`
/// should be set.
pub struct RequestParams {
    /// HTTP method.
    pub method: Method,
    /// Request path, resolved against the chosen connection's URL.
    pub path: String,
    /// Query parameters, URL-form-encoded by the transport.
    pub querystring: Vec<(String, String)>,
    /// A JSON/raw/stream body.
    pub body: Option<RequestBody>,
    /// An ndjson bulk body.
    pub bulk_body: Option<BulkBody>,
}

impl RequestParams {
    /// A request with no body and no querystring.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            querystring: Vec::new(),
            body: None,
            bulk_body: None,
        }
    }

    /// Attach a JSON body.
    pub fn with_json_body(mut self, value: Value) -> Self {
        self.body = Some(RequestBody::Json(value));
        self
    }

    /// Attach query parameters.
    pub fn with_querystring(mut self, pairs: Vec<(String, String)>) -> Self {
        self.querystring = pairs;
        self
    }
}

/// Per-call overrides layered on top of the transport's own configuration.
#[derive(Default)]
pub struct RequestOptions {
    /// Explicit request id; generated if absent.
    pub id: Option<RequestId>,
    /// Overrides `TransportConfig::max_retries` for this call.
    pub max_retries: Option<u32>,
    /// Overrides `TransportConfig::compression` for this call.
    pub compression: Option<Compression>,
    /// Overrides `TransportConfig::request_timeout` for this call.
    pub request_timeout: Option<Duration>,
    /// Per-call headers; these win over the transport's defaults.
    pub headers: HeaderMap,
    /// Query parameters; when non-empty, overlaid onto `params.querystring`
    /// (this wins on key collision).
    pub querystring: Vec<(String, String)>,
    /// Prepended with `opaque_id_prefix` and sent as `X-Opaque-Id`.
    pub opaque_id: Option<String>,
    /// Deliver the response body as a stream instead of buffering it.
    pub as_stream: bool,
    /// Status codes that should not produce a `Response` error.
    pub ignore: Vec<u16>,
}

/// The terminal, successful outcome of a request.
#[derive(Debug)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status_code: u16,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body, in whichever shape the content negotiation picked.
    pub body: ResponseBody,
    /// Parsed `Warning` header entries, in header order.
    pub warnings: Vec<String>,
    /// Bookkeeping about how this response was obtained.
    pub meta: ResponseMeta,
}

/// A response body, after content-type/method-based decoding.
pub enum ResponseBody {
    /// `Content-Type: application/json` and a non-empty payload.
    Json(Value),
    /// Any other non-empty, non-JSON payload.
    Text(String),
    /// A `HEAD` request's outcome: `true` unless the status was 404.
    Bool(bool),
    /// An empty payload.
    Empty,
    /// Handed through untouched because the caller asked for `as_stream`.
    Stream(ByteStream),
}

impl std::fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseBody::Json(v) => f.debug_tuple("Json").field(v).finish(),
            ResponseBody::Text(s) => f.debug_tuple("Text").field(s).finish(),
            ResponseBody::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            ResponseBody::Empty => write!(f, "Empty"),
            ResponseBody::Stream(_) => write!(f, "Stream(..)"),
        }
    }
}

/// Bookkeeping attached to every [`TransportResponse`].
#[derive(Debug)]
pub struct ResponseMeta {
    /// Request id this response belongs to.
    pub request_id: RequestId,
    /// Number of attempts made, including the first.
    pub attempts: u32,
    /// Id of the connection that produced the final outcome.
    pub connection_id: String,
    /// Set when a sniff fired during this request.
    pub sniff: Option<SniffMeta>,
}

/// Recorded on a [`ResponseMeta`] when a sniff fired during the request
/// that produced it.
#[derive(Debug, Clone)]
pub struct SniffMeta {
    /// Number of hosts discovered.
    pub hosts: usize,
    /// Why the sniff fired.
    pub reason: SniffReason,
}
