//! The core orchestrator
//!
//! `Transport::request` is the single async entry point the design notes
//! call for: it resolves retry budget, encodes the body, merges headers,
//! drives the attempt loop against the connection pool, and interprets the
//! response per the status-code policy in the error handling design.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Method};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use transport_connection::{AbortHandle, RequestPayload};
use transport_errors::{ResponseErrorMeta, TransportError};
use transport_pool::ConnectionContext;
use transport_types::{Compression, RequestId, SniffReason};

use crate::auth::Credentials;
use crate::config::TransportConfig;
use crate::events::{no_op_sink, Event, EventSink};
use crate::pool::Pool;
use crate::request::{
    BulkBody, BulkBodyItem, RequestBody, RequestOptions, RequestParams, ResponseBody, ResponseMeta,
    SniffMeta, TransportResponse,
};
use crate::user_agent::user_agent;
use crate::warning::parse_warning_values;

/// Node-aware HTTP request transport: one pool of cluster endpoints, a
/// retry/sniff/health policy layered over it, and a single `request` entry
/// point every caller goes through.
pub struct Transport {
    config: TransportConfig,
    pool: Pool,
    credentials: Option<Credentials>,
    emit: EventSink,
    next_id: AtomicU64,
    sniffing: AtomicBool,
    next_sniff: Mutex<Option<Instant>>,
}

impl Transport {
    /// Construct a transport over an already-built pool. Fires
    /// `sniff_on_start` in the background (fire-and-forget, matching the
    /// pool's own resurrection contract) when configured.
    pub fn new(config: TransportConfig, pool: Pool, credentials: Option<Credentials>, emit: EventSink) -> Arc<Self> {
        let sniff_on_start = config.sniff_on_start;
        let transport = Arc::new(Self {
            config,
            pool,
            credentials,
            emit,
            next_id: AtomicU64::new(1),
            sniffing: AtomicBool::new(false),
            next_sniff: Mutex::new(None),
        });
        if sniff_on_start {
            let t = Arc::clone(&transport);
            tokio::spawn(async move {
                t.sniff(SniffReason::OnStart).await;
            });
        }
        transport
    }

    /// Construct a transport over a freshly built [`transport_pool::StandardPool`],
    /// seeded with `seeds`.
    pub async fn with_standard_pool(
        config: TransportConfig,
        executor_factory: transport_pool::ExecutorFactory,
        seeds: Vec<transport_types::NodeDescriptor>,
        credentials: Option<Credentials>,
    ) -> Result<Arc<Self>, TransportError> {
        let pool_config = config.pool.clone();
        let standard = transport_pool::StandardPool::new(executor_factory, pool_config);
        standard.add_connections(seeds).await?;
        Ok(Self::new(config, Pool::Standard(Arc::new(standard)), credentials, no_op_sink()))
    }

    /// Construct a transport over a [`transport_pool::CloudConnectionPool`]
    /// resolved from an Elastic Cloud id.
    pub async fn with_cloud_pool(
        config: TransportConfig,
        executor_factory: transport_pool::ExecutorFactory,
        cloud_id: &str,
        credentials: Option<Credentials>,
    ) -> Result<Arc<Self>, TransportError> {
        let cloud = transport_pool::CloudConnectionPool::new(executor_factory);
        cloud.update_from_cloud_id(cloud_id).await?;
        Ok(Self::new(config, Pool::Cloud(Arc::new(cloud)), credentials, no_op_sink()))
    }

    fn next_request_id(&self) -> RequestId {
        self.next_id.fetch_add(1, Ordering::SeqCst) & 0x7FFF_FFFF
    }

    /// Execute one request, retrying per the configured policy. The caller
    /// owns `abort`: calling `abort.abort()` concurrently cancels the
    /// in-flight attempt and short-circuits any further retry.
    ///
    /// Written as a boxed future rather than `async fn`: sniffing recurses
    /// back into `request` (the sniff probe is itself a request), and an
    /// `async fn` can't resolve its own opaque return type through that
    /// cycle.
    pub fn request<'a>(
        self: &'a Arc<Self>,
        params: RequestParams,
        mut options: RequestOptions,
        abort: &'a AbortHandle,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<TransportResponse, TransportError>> + Send + 'a>>
    {
        Box::pin(async move {
        let request_id = options.id.take().unwrap_or_else(|| self.next_request_id());

        let stream_body = matches!(params.body, Some(RequestBody::Stream(_)));
        let max_retries = if stream_body {
            0
        } else {
            options.max_retries.unwrap_or(self.config.max_retries)
        };

        let compression = options.compression.or(self.config.compression);
        let encoded = encode_body(params.body, params.bulk_body, compression)?;

        let querystring = build_querystring(params.querystring, std::mem::take(&mut options.querystring));
        let headers = self.build_headers(&options, &encoded)?;

        let timeout = options.request_timeout.unwrap_or(self.config.request_timeout);

        let method = params.method;
        let path = params.path;

        let mut attempts: u32 = 0;
        let mut sniff_meta: Option<SniffMeta> = None;

        let mut bytes_payload: Option<Bytes> = None;
        let mut stream_payload: Option<transport_connection::RequestPayload> = None;
        match encoded.payload {
            RequestPayload::Bytes(b) => bytes_payload = Some(b),
            stream @ RequestPayload::Stream(_) => stream_payload = Some(stream),
        }

        loop {
            if abort.is_aborted() {
                return Err(TransportError::RequestAborted);
            }
            self.maybe_fire_interval_sniff(request_id).await;

            let ctx = ConnectionContext {
                request_id,
                name: self.config.name.clone(),
            };
            let Some(conn) = self.pool.get_connection(ctx).await else {
                warn!(%request_id, "no living connections");
                (self.emit)(Event::Response {
                    request_id,
                    status: None,
                    error: Some("no living connections".to_string()),
                });
                return Err(TransportError::NoLivingConnections);
            };

            (self.emit)(Event::Request {
                request_id,
                method: method.clone(),
                path: path.clone(),
                attempt: attempts,
            });
            debug!(%request_id, %method, %path, attempt = attempts, connection = %conn.id, "request attempt");

            let body = match &bytes_payload {
                Some(bytes) => RequestPayload::Bytes(bytes.clone()),
                None => stream_payload
                    .take()
                    .expect("stream bodies force max_retries=0, so this executes only once"),
            };
            let conn_params = transport_connection::RequestParams {
                method: method.clone(),
                path: path.clone(),
                querystring: querystring.clone(),
                body,
                headers: headers.clone(),
                timeout,
                as_stream: options.as_stream,
            };

            let outcome = conn.request(conn_params, abort).await;

            match outcome {
                Err(TransportError::RequestAborted) => return Err(TransportError::RequestAborted),
                Err(err) => {
                    self.pool
                        .mark_dead(&conn, self.config.pool.resurrect_timeout_base, self.config.pool.resurrect_timeout_cutoff)
                        .await;
                    if self.config.sniff_on_connection_fault {
                        let t = Arc::clone(self);
                        tokio::spawn(async move {
                            t.sniff(SniffReason::OnConnectionFault).await;
                        });
                    }
                    if attempts < max_retries {
                        attempts += 1;
                        continue;
                    }
                    warn!(%request_id, error = %err, "request failed after exhausting retries");
                    (self.emit)(Event::Response {
                        request_id,
                        status: None,
                        error: Some(err.to_string()),
                    });
                    return Err(err);
                }
                Ok(response) => {
                    let status = response.status;
                    let response_headers = response.headers.clone();
                    let warnings = response_headers
                        .get(http::header::WARNING)
                        .and_then(|v| v.to_str().ok())
                        .map(parse_warning_values)
                        .unwrap_or_default();

                    if options.as_stream {
                        let body = match response.body {
                            transport_connection::ResponsePayload::Stream(s) => ResponseBody::Stream(s),
                            transport_connection::ResponsePayload::Bytes(b) => ResponseBody::Stream(Box::pin(
                                futures::stream::once(async move { Ok(b) }),
                            )),
                        };
                        (self.emit)(Event::Response {
                            request_id,
                            status: Some(status),
                            error: None,
                        });
                        return Ok(TransportResponse {
                            status_code: status,
                            headers: response_headers,
                            body,
                            warnings,
                            meta: ResponseMeta {
                                request_id,
                                attempts: attempts + 1,
                                connection_id: conn.id.clone(),
                                sniff: sniff_meta,
                            },
                        });
                    }

                    let payload = match response.body {
                        transport_connection::ResponsePayload::Bytes(b) => b,
                        transport_connection::ResponsePayload::Stream(_) => Bytes::new(),
                    };

                    let ignore_status = options.ignore.contains(&status) || (method == Method::HEAD && status == 404);

                    if !ignore_status && matches!(status, 502..=504) {
                        self.pool
                            .mark_dead(&conn, self.config.pool.resurrect_timeout_base, self.config.pool.resurrect_timeout_cutoff)
                            .await;
                        if attempts < max_retries && status != 429 {
                            attempts += 1;
                            continue;
                        }
                        self.pool.mark_alive(&conn).await;
                    }

                    let body = decide_response_body(&method, status, &response_headers, &payload)?;

                    if !ignore_status && status >= 400 {
                        let json_body = match &body {
                            ResponseBody::Json(v) => Some(v.clone()),
                            _ => None,
                        };
                        let meta = ResponseErrorMeta {
                            status,
                            body: json_body,
                            request_id,
                        };
                        (self.emit)(Event::Response {
                            request_id,
                            status: Some(status),
                            error: Some(meta.error_type().unwrap_or("response_error").to_string()),
                        });
                        return Err(TransportError::Response(meta));
                    }

                    (self.emit)(Event::Response {
                        request_id,
                        status: Some(status),
                        error: None,
                    });
                    return Ok(TransportResponse {
                        status_code: status,
                        headers: response_headers,
                        body,
                        warnings,
                        meta: ResponseMeta {
                            request_id,
                            attempts: attempts + 1,
                            connection_id: conn.id.clone(),
                            sniff: sniff_meta.take(),
                        },
                    });
                }
            }
        }
        })
    }

    async fn maybe_fire_interval_sniff(self: &Arc<Self>, request_id: RequestId) {
        let Some(interval) = self.config.sniff_interval else {
            return;
        };
        let mut next = self.next_sniff.lock().await;
        let due = match *next {
            Some(at) => Instant::now() >= at,
            None => true,
        };
        if !due {
            return;
        }
        *next = Some(Instant::now() + interval);
        drop(next);
        let t = Arc::clone(self);
        tokio::spawn(async move {
            let _ = request_id;
            t.sniff(SniffReason::Interval).await;
        });
    }

    /// Probe the cluster for its current node list and reconcile the pool.
    /// At most one sniff runs at a time (P7); a concurrent call is dropped
    /// silently.
    pub async fn sniff(self: &Arc<Self>, reason: SniffReason) {
        if self.sniffing.swap(true, Ordering::SeqCst) {
            return;
        }

        let result = self.sniff_inner().await;

        self.sniffing.store(false, Ordering::SeqCst);

        match result {
            Ok(hosts) => {
                debug!(hosts, %reason, "sniff completed");
                (self.emit)(Event::Sniff {
                    request_id: 0,
                    hosts,
                    reason,
                    error: None,
                });
            }
            Err(err) => {
                warn!(error = %err, %reason, "sniff failed");
                (self.emit)(Event::Sniff {
                    request_id: 0,
                    hosts: 0,
                    reason,
                    error: Some(err.to_string()),
                });
            }
        }
    }

    async fn sniff_inner(self: &Arc<Self>) -> Result<usize, TransportError> {
        let params = RequestParams::new(Method::GET, self.config.sniff_endpoint.clone());
        let options = RequestOptions::default();
        let abort = AbortHandle::new();
        let response = self.request(params, options, &abort).await?;

        let ResponseBody::Json(body) = response.body else {
            return Err(TransportError::Deserialization("sniff response was not JSON".into()));
        };
        let nodes_value = body
            .get("nodes")
            .cloned()
            .ok_or_else(|| TransportError::Deserialization("sniff response missing 'nodes'".into()))?;
        let nodes: transport_types::SniffNodesMap = serde_json::from_value(nodes_value)
            .map_err(|e| TransportError::Deserialization(e.to_string()))?;

        let protocol = self.connection_scheme().unwrap_or("http");
        let descriptors = transport_pool::BaseConnectionPool::nodes_to_host(&nodes, protocol)?;
        let count = descriptors.len();
        self.pool.update(descriptors).await?;
        Ok(count)
    }

    fn connection_scheme(&self) -> Option<&'static str> {
        None
    }

    fn build_headers(&self, options: &RequestOptions, encoded: &EncodedBody) -> Result<HeaderMap, TransportError> {
        let mut headers = self.config.headers.clone();
        for (name, value) in options.headers.iter() {
            headers.insert(name.clone(), value.clone());
        }

        insert_if_absent(&mut headers, http::header::USER_AGENT, user_agent())?;

        if self.config.suggest_compression {
            insert_if_absent(&mut headers, http::header::ACCEPT_ENCODING, "gzip,deflate")?;
        }
        if let Some(content_type) = encoded.content_type {
            insert_if_absent(&mut headers, http::header::CONTENT_TYPE, content_type)?;
        }
        if encoded.gzip_applied {
            headers.insert(http::header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        }
        if let Some(length) = encoded.content_length {
            headers.insert(http::header::CONTENT_LENGTH, HeaderValue::from_str(&length.to_string()).unwrap());
        }

        if let Some(credentials) = &self.credentials {
            insert_if_absent(&mut headers, http::header::AUTHORIZATION, &credentials.authorization_header())?;
        }

        if let Some(opaque_id) = &options.opaque_id {
            let value = match &self.config.opaque_id_prefix {
                Some(prefix) => format!("{prefix}{opaque_id}"),
                None => opaque_id.clone(),
            };
            let name = http::HeaderName::from_static("x-opaque-id");
            headers.insert(name, HeaderValue::from_str(&value).map_err(|e| {
                TransportError::Configuration(format!("invalid X-Opaque-Id value: {e}"))
            })?);
        }

        Ok(headers)
    }
}

fn insert_if_absent(headers: &mut HeaderMap, name: http::HeaderName, value: &str) -> Result<(), TransportError> {
    if !headers.contains_key(&name) {
        let value = HeaderValue::from_str(value)
            .map_err(|e| TransportError::Configuration(format!("invalid header value for {name}: {e}")))?;
        headers.insert(name, value);
    }
    Ok(())
}

fn build_querystring(params_qs: Vec<(String, String)>, options_qs: Vec<(String, String)>) -> String {
    let mut merged: Vec<(String, String)> = params_qs;
    if !options_qs.is_empty() {
        for (key, value) in options_qs {
            if let Some(existing) = merged.iter_mut().find(|(k, _)| *k == key) {
                existing.1 = value;
            } else {
                merged.push((key, value));
            }
        }
    }
    let pairs: Vec<(&str, &str)> = merged.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
    transport_serializer::qserialize(pairs)
}

struct EncodedBody {
    payload: RequestPayload,
    content_type: Option<&'static str>,
    gzip_applied: bool,
    content_length: Option<u64>,
}

fn encode_body(
    body: Option<RequestBody>,
    bulk_body: Option<BulkBody>,
    compression: Option<Compression>,
) -> Result<EncodedBody, TransportError> {
    if body.is_some() && bulk_body.is_some() {
        return Err(TransportError::Configuration(
            "params.body and params.bulk_body are mutually exclusive".into(),
        ));
    }

    let (payload, content_type) = match (body, bulk_body) {
        (Some(RequestBody::Json(value)), None) => {
            let bytes = transport_serializer::serialize(&value)?;
            (RequestPayload::Bytes(Bytes::from(bytes)), Some("application/json"))
        }
        (Some(RequestBody::Raw(bytes)), None) => (RequestPayload::Bytes(bytes), None),
        (Some(RequestBody::Stream(stream)), None) => (RequestPayload::Stream(stream), None),
        (None, Some(BulkBody::Items(items))) => {
            let nd_items: Vec<transport_serializer::NdItem<'_, Value>> = items
                .iter()
                .map(|item| match item {
                    BulkBodyItem::Raw(s) => transport_serializer::NdItem::Raw(s.as_str()),
                    BulkBodyItem::Value(v) => transport_serializer::NdItem::Value(v),
                })
                .collect();
            let bytes = transport_serializer::ndserialize(&nd_items)?;
            (RequestPayload::Bytes(Bytes::from(bytes)), Some("application/x-ndjson"))
        }
        (None, Some(BulkBody::Raw(bytes))) => (RequestPayload::Bytes(bytes), Some("application/x-ndjson")),
        (None, None) => (RequestPayload::Bytes(Bytes::new()), None),
        (Some(_), Some(_)) => unreachable!("checked above"),
    };

    match payload {
        RequestPayload::Bytes(bytes) if compression == Some(Compression::Gzip) && !bytes.is_empty() => {
            let compressed = transport_serializer::compress(&bytes)?;
            let length = compressed.len() as u64;
            Ok(EncodedBody {
                payload: RequestPayload::Bytes(Bytes::from(compressed)),
                content_type,
                gzip_applied: true,
                content_length: Some(length),
            })
        }
        RequestPayload::Bytes(bytes) => {
            let length = if bytes.is_empty() { None } else { Some(bytes.len() as u64) };
            Ok(EncodedBody {
                payload: RequestPayload::Bytes(bytes),
                content_type,
                gzip_applied: false,
                content_length: length,
            })
        }
        // Stream bodies are piped through as-is; compressing a stream in
        // flight would need an async gzip transformer, which nothing in
        // this stack's dependencies provides, and P9 already forces
        // max_retries to 0 for them so there is never a second attempt to
        // worry about re-encoding for.
        stream @ RequestPayload::Stream(_) => Ok(EncodedBody {
            payload: stream,
            content_type,
            gzip_applied: false,
            content_length: None,
        }),
    }
}

fn decide_response_body(
    method: &Method,
    status: u16,
    headers: &HeaderMap,
    payload: &Bytes,
) -> Result<ResponseBody, TransportError> {
    if method == Method::HEAD {
        return Ok(ResponseBody::Bool(status != 404));
    }
    if payload.is_empty() {
        return Ok(ResponseBody::Empty);
    }
    let is_json = headers
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("application/json"))
        .unwrap_or(false);
    if is_json {
        let value = transport_serializer::deserialize(payload)?;
        Ok(ResponseBody::Json(value))
    } else {
        Ok(ResponseBody::Text(String::from_utf8_lossy(payload).into_owned()))
    }
}
