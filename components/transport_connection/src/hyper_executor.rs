use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::Frame;
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use transport_errors::TransportError;
use url::Url;

use crate::executor::{HttpExecutor, InboundResponse, OutboundRequest, RequestPayload, ResponsePayload};

/// An [`HttpExecutor`] backed by a single persistent HTTP/1.1 connection to
/// one endpoint, reusing the handshake across requests and re-handshaking
/// when the prior connection task has exited.
pub struct HyperExecutor {
    origin: Url,
    sender: Mutex<Option<http1::SendRequest<BoxBody>>>,
}

type BoxBody = http_body_util::combinators::BoxBody<Bytes, std::io::Error>;

impl HyperExecutor {
    /// Create an executor bound to `origin`'s host and port. Only `http`/
    /// `https` schemes are meaningful; TLS is not yet implemented, matching
    /// the teacher's HTTP/1.1-only starting point.
    pub fn new(origin: Url) -> Self {
        Self {
            origin,
            sender: Mutex::new(None),
        }
    }

    async fn handshake(&self) -> Result<http1::SendRequest<BoxBody>, TransportError> {
        let host = self
            .origin
            .host_str()
            .ok_or_else(|| TransportError::Configuration("missing host in connection URL".into()))?;
        let port = self
            .origin
            .port_or_known_default()
            .ok_or_else(|| TransportError::Configuration("cannot determine port".into()))?;

        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|e| TransportError::Connection(format!("connect to {host}:{port} failed: {e}")))?;
        stream
            .set_nodelay(true)
            .map_err(|e| TransportError::Connection(format!("setsockopt TCP_NODELAY failed: {e}")))?;

        let io = TokioIo::new(stream);
        let (sender, conn) = http1::handshake(io)
            .await
            .map_err(|e| TransportError::Connection(format!("handshake with {host}:{port} failed: {e}")))?;

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                warn!(error = %e, "http/1.1 connection task ended");
            }
        });

        Ok(sender)
    }

    async fn send(
        &self,
        request: hyper::Request<BoxBody>,
        timeout: std::time::Duration,
    ) -> Result<hyper::Response<hyper::body::Incoming>, TransportError> {
        let mut guard = self.sender.lock().await;
        let needs_handshake = match guard.as_mut() {
            Some(sender) => sender.ready().await.is_err(),
            None => true,
        };
        if needs_handshake {
            *guard = Some(self.handshake().await?);
        }
        let sender = guard.as_mut().expect("just populated above");
        let send = sender.send_request(request);
        match tokio::time::timeout(timeout, send).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => Err(TransportError::Connection(e.to_string())),
            Err(_) => Err(TransportError::Timeout(timeout)),
        }
    }
}

#[async_trait]
impl HttpExecutor for HyperExecutor {
    async fn execute(&self, request: OutboundRequest) -> Result<InboundResponse, TransportError> {
        let body: BoxBody = match request.body {
            RequestPayload::Bytes(bytes) => Full::new(bytes).map_err(|never| match never {}).boxed(),
            RequestPayload::Stream(stream) => {
                let mapped = futures::StreamExt::map(stream, |chunk| chunk.map(Frame::data));
                StreamBody::new(mapped).boxed()
            }
        };

        let mut builder = hyper::Request::builder()
            .method(request.method.clone())
            .uri(request.url.as_str());
        for (name, value) in request.headers.iter() {
            builder = builder.header(name, value);
        }
        let http_request = builder
            .body(body)
            .map_err(|e| TransportError::Connection(format!("malformed request: {e}")))?;

        debug!(url = %request.url, method = %request.method, "sending request");

        let response = self.send(http_request, request.timeout).await?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();

        let body = if request.as_stream {
            let stream = response.into_body().into_data_stream();
            let mapped = futures::StreamExt::map(stream, |chunk| {
                chunk.map_err(|e| std::io::Error::other(e.to_string()))
            });
            ResponsePayload::Stream(Box::pin(mapped))
        } else {
            let collected = response
                .into_body()
                .collect()
                .await
                .map_err(|e| TransportError::Connection(format!("reading body failed: {e}")))?
                .to_bytes();
            let decoded = if headers
                .get(http::header::CONTENT_ENCODING)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.eq_ignore_ascii_case("gzip"))
                .unwrap_or(false)
            {
                transport_serializer::decompress(&collected)?
            } else {
                collected.to_vec()
            };
            ResponsePayload::Bytes(Bytes::from(decoded))
        };

        Ok(InboundResponse { status, headers, body })
    }
}

/// Shared ownership of a [`HyperExecutor`], for the common case of one
/// executor backing many sequential requests on the same Connection.
pub type SharedExecutor = Arc<dyn HttpExecutor>;

/// Convenience constructor returning a [`SharedExecutor`].
pub fn hyper_executor(origin: Url) -> SharedExecutor {
    Arc::new(HyperExecutor::new(origin))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn executor_is_send_sync() {
        assert_send_sync::<HyperExecutor>();
    }
}
