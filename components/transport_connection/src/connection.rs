use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use http::{HeaderMap, HeaderName, HeaderValue, Method};
use tracing::debug;
use transport_errors::TransportError;
use transport_types::{ConnectionStatus, RoleSet};
use url::Url;

use crate::abort::AbortHandle;
use crate::executor::{HttpExecutor, InboundResponse, OutboundRequest, RequestPayload, ResponsePayload};
use crate::path::build_request_url;

/// Parameters for one request attempt against a [`Connection`], already
/// resolved by the transport (encoded body, merged headers, timeout).
pub struct RequestParams {
    /// HTTP method.
    pub method: Method,
    /// Request path, resolved against the connection's URL.
    pub path: String,
    /// Already-encoded querystring, without a leading `?`.
    pub querystring: String,
    /// Request body.
    pub body: RequestPayload,
    /// Per-attempt headers; merged with the connection's own headers, with
    /// these taking precedence.
    pub headers: HeaderMap,
    /// Per-attempt deadline.
    pub timeout: Duration,
    /// When true, deliver the raw response body as a stream instead of
    /// buffering and decompressing it.
    pub as_stream: bool,
}

/// Opaque TLS configuration, passed through to the HTTP layer unexamined
/// when the connection's scheme is `https`. Negotiation itself is out of
/// scope; this only carries the data a caller configured.
#[derive(Debug, Clone, Default)]
pub struct TlsOptions {
    /// Reject certificates that don't chain to a trusted root. Defaulted
    /// on; exposed for test/dev endpoints with self-signed certificates.
    pub reject_unauthorized: bool,
    /// Minimum TLS protocol version to request, when known.
    pub min_version: Option<TlsVersion>,
}

/// A TLS protocol version, as requested by a [`TlsOptions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsVersion {
    /// TLS 1.0
    Tls1_0,
    /// TLS 1.1
    Tls1_1,
    /// TLS 1.2
    Tls1_2,
    /// TLS 1.3
    Tls1_3,
}

impl std::fmt::Display for TlsVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TlsVersion::Tls1_0 => "TLSv1.0",
            TlsVersion::Tls1_1 => "TLSv1.1",
            TlsVersion::Tls1_2 => "TLSv1.2",
            TlsVersion::Tls1_3 => "TLSv1.3",
        };
        f.write_str(s)
    }
}

/// One endpoint in a pool: a stable identity, a set of advertised roles, and
/// the health bookkeeping the pool reads and mutates on every request.
pub struct Connection {
    /// Unique id within the owning pool.
    pub id: String,
    /// Absolute endpoint URL (scheme + host, optional port).
    pub url: Url,
    /// Headers applied to every request on this connection (merged under
    /// per-request headers).
    pub headers: HeaderMap,
    /// Advertised roles, used by the default node filter.
    pub roles: RoleSet,
    /// TLS configuration, consulted only when `url.scheme() == "https"`.
    pub tls_options: Option<TlsOptions>,
    health: std::sync::Mutex<Health>,
    open_requests: AtomicU64,
    executor: Arc<dyn HttpExecutor>,
}

struct Health {
    status: ConnectionStatus,
    dead_count: u32,
    resurrect_timeout: Instant,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("url", &self.url.as_str())
            .field("status", &self.status())
            .finish()
    }
}

impl Connection {
    /// Construct a connection bound to `executor` for I/O.
    pub fn new(
        id: String,
        url: Url,
        roles: RoleSet,
        headers: HeaderMap,
        tls_options: Option<TlsOptions>,
        executor: Arc<dyn HttpExecutor>,
    ) -> Self {
        Self {
            id,
            url,
            headers,
            roles,
            tls_options,
            health: std::sync::Mutex::new(Health {
                status: ConnectionStatus::Alive,
                dead_count: 0,
                resurrect_timeout: Instant::now(),
            }),
            open_requests: AtomicU64::new(0),
            executor,
        }
    }

    /// Current health status.
    pub fn status(&self) -> ConnectionStatus {
        self.health.lock().unwrap().status
    }

    /// Number of consecutive times this connection has been marked dead
    /// without an intervening `mark_alive`.
    pub fn dead_count(&self) -> u32 {
        self.health.lock().unwrap().dead_count
    }

    /// The instant before which resurrection attempts are skipped.
    pub fn resurrect_timeout(&self) -> Instant {
        self.health.lock().unwrap().resurrect_timeout
    }

    /// Mark this connection alive: resets `dead_count` and clears the
    /// resurrection backoff.
    pub fn mark_alive(&self) {
        let mut health = self.health.lock().unwrap();
        health.status = ConnectionStatus::Alive;
        health.dead_count = 0;
        health.resurrect_timeout = Instant::now();
    }

    /// Mark this connection dead and compute the next resurrection backoff:
    /// `base * 2^min(dead_count-1, cutoff)`.
    pub fn mark_dead(&self, base: Duration, cutoff: u32) {
        let mut health = self.health.lock().unwrap();
        health.status = ConnectionStatus::Dead;
        health.dead_count += 1;
        let exponent = (health.dead_count - 1).min(cutoff);
        let backoff = base.saturating_mul(1u32 << exponent);
        health.resurrect_timeout = Instant::now() + backoff;
    }

    /// Number of requests currently in flight on this connection.
    pub fn open_requests(&self) -> u64 {
        self.open_requests.load(Ordering::SeqCst)
    }

    /// Execute one request attempt, tracking `open_requests` for the
    /// duration and honoring `abort`.
    ///
    /// # Errors
    /// Returns [`TransportError::RequestAborted`] if `abort` fires before
    /// the exchange completes, [`TransportError::Timeout`] if `params.timeout`
    /// elapses first, or [`TransportError::Connection`] for any other
    /// transport-level failure.
    pub async fn request(
        &self,
        params: RequestParams,
        abort: &AbortHandle,
    ) -> Result<InboundResponse, TransportError> {
        if abort.is_aborted() {
            return Err(TransportError::RequestAborted);
        }

        let qs = params.querystring.clone();
        let url = build_request_url(&self.url, &params.path, &qs)?;

        let mut headers = self.headers.clone();
        for (name, value) in params.headers.iter() {
            headers.insert(name.clone(), value.clone());
        }

        let request = OutboundRequest {
            method: params.method.clone(),
            url: url.clone(),
            headers,
            body: params.body,
            timeout: params.timeout,
            as_stream: params.as_stream,
        };

        self.open_requests.fetch_add(1, Ordering::SeqCst);
        debug!(id = %self.id, %url, method = %params.method, "request attempt");

        let outcome = tokio::select! {
            biased;
            _ = abort.aborted() => Err(TransportError::RequestAborted),
            result = self.executor.execute(request) => result,
        };

        self.open_requests.fetch_sub(1, Ordering::SeqCst);
        outcome
    }

    /// Close this connection: wait until `open_requests` reaches zero
    /// (polling, matching the teacher's drain loop) then drop the executor
    /// reference, releasing the underlying agent.
    pub async fn close(&self) {
        while self.open_requests() > 0 {
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }
}

/// Header name/value helper used when building `Authorization`/`X-Opaque-Id`
/// headers outside the hot path, returning a config error instead of
/// panicking on invalid bytes.
pub fn header(name: &str, value: String) -> Result<(HeaderName, HeaderValue), TransportError> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| TransportError::Configuration(format!("invalid header name {name:?}: {e}")))?;
    let value = HeaderValue::from_str(&value)
        .map_err(|e| TransportError::Configuration(format!("invalid header value: {e}")))?;
    Ok((name, value))
}

/// Split the contents of the response's `body` so callers can tell whether
/// it was delivered as a stream or fully buffered, without matching on
/// [`ResponsePayload`] directly.
pub fn response_is_stream(response: &InboundResponse) -> bool {
    matches!(response.body, ResponsePayload::Stream(_))
}
