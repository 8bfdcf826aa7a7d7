//! Integration tests for the transport component: pool + connection +
//! transport interplay, exercised through `Transport::request`/`sniff`
//! against scripted executors rather than a real socket.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use transport::{
    AbortHandle, Credentials, ExecutorFactory, NodeDescriptor, RequestBody, RequestOptions,
    RequestParams, ResponseBody, SniffReason, Transport, TransportConfig, TransportError,
};
use transport_connection::mock::{MockExecutor, MockOutcome};
use transport_connection::HttpExecutor;
use url::Url;

fn factory_returning(outcomes: Vec<MockOutcome>) -> ExecutorFactory {
    let outcomes = Arc::new(outcomes);
    Arc::new(move |_url: &Url| Arc::new(MockExecutor::new((*outcomes).clone())) as Arc<dyn HttpExecutor>)
}

fn ok_json(body: &str) -> MockOutcome {
    let mut headers = http::HeaderMap::new();
    headers.insert(http::header::CONTENT_TYPE, http::HeaderValue::from_static("application/json"));
    MockOutcome::Response {
        status: 200,
        headers,
        body: body.as_bytes().to_vec(),
    }
}

async fn single_endpoint_transport(outcomes: Vec<MockOutcome>) -> Arc<Transport> {
    let config = TransportConfig::default();
    Transport::with_standard_pool(
        config,
        factory_returning(outcomes),
        vec![NodeDescriptor::from_url(Url::parse("http://node-a:9200").unwrap())],
        None,
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn basic_success_round_trips_json_body() {
    let transport = single_endpoint_transport(vec![ok_json(r#"{"ok":true}"#)]).await;
    let abort = AbortHandle::new();
    let response = transport
        .request(RequestParams::new(http::Method::GET, "/_search"), RequestOptions::default(), &abort)
        .await
        .unwrap();
    assert_eq!(response.status_code, 200);
    match response.body {
        ResponseBody::Json(v) => assert_eq!(v["ok"], true),
        _ => panic!("expected json body"),
    }
}

#[tokio::test]
async fn retries_on_503_then_succeeds() {
    let outcomes = vec![
        MockOutcome::Response {
            status: 503,
            headers: http::HeaderMap::new(),
            body: Vec::new(),
        },
        ok_json(r#"{"recovered":true}"#),
    ];
    let transport = single_endpoint_transport(outcomes).await;
    let abort = AbortHandle::new();
    let response = transport
        .request(RequestParams::new(http::Method::GET, "/_cluster/health"), RequestOptions::default(), &abort)
        .await
        .unwrap();
    assert_eq!(response.status_code, 200);
}

#[tokio::test]
async fn head_404_yields_false_body_not_error() {
    let outcomes = vec![MockOutcome::Response {
        status: 404,
        headers: http::HeaderMap::new(),
        body: Vec::new(),
    }];
    let transport = single_endpoint_transport(outcomes).await;
    let abort = AbortHandle::new();
    let response = transport
        .request(RequestParams::new(http::Method::HEAD, "/index/_doc/1"), RequestOptions::default(), &abort)
        .await
        .unwrap();
    assert_eq!(response.status_code, 404);
    assert!(matches!(response.body, ResponseBody::Bool(false)));
}

#[tokio::test]
async fn ignore_list_suppresses_response_error() {
    let outcomes = vec![MockOutcome::Response {
        status: 404,
        headers: http::HeaderMap::new(),
        body: br#"{"found":false}"#.to_vec(),
    }];
    let transport = single_endpoint_transport(outcomes).await;
    let abort = AbortHandle::new();
    let mut options = RequestOptions::default();
    options.ignore = vec![404];
    let response = transport
        .request(RequestParams::new(http::Method::GET, "/index/_doc/1"), options, &abort)
        .await
        .unwrap();
    assert_eq!(response.status_code, 404);
}

#[tokio::test]
async fn unknown_parameter_warning_header_is_parsed() {
    let mut headers = http::HeaderMap::new();
    headers.insert(
        http::header::WARNING,
        http::HeaderValue::from_static(r#"299 elasticsearch "[size] unknown parameter""#),
    );
    let outcomes = vec![MockOutcome::Response {
        status: 200,
        headers,
        body: br#"{"ok":true}"#.to_vec(),
    }];
    let transport = single_endpoint_transport(outcomes).await;
    let abort = AbortHandle::new();
    let response = transport
        .request(RequestParams::new(http::Method::GET, "/_search"), RequestOptions::default(), &abort)
        .await
        .unwrap();
    assert_eq!(response.warnings, vec![r#"299 elasticsearch "[size] unknown parameter""#]);
}

#[tokio::test]
async fn response_error_is_returned_for_unignored_4xx() {
    let mut headers = http::HeaderMap::new();
    headers.insert(http::header::CONTENT_TYPE, http::HeaderValue::from_static("application/json"));
    let outcomes = vec![MockOutcome::Response {
        status: 400,
        headers,
        body: br#"{"error":{"type":"parsing_exception"}}"#.to_vec(),
    }];
    let transport = single_endpoint_transport(outcomes).await;
    let abort = AbortHandle::new();
    let err = transport
        .request(RequestParams::new(http::Method::GET, "/_search"), RequestOptions::default(), &abort)
        .await
        .unwrap_err();
    match err {
        TransportError::Response(meta) => assert_eq!(meta.error_type(), Some("parsing_exception")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn status_429_is_not_retried() {
    let outcomes = vec![
        MockOutcome::Response {
            status: 429,
            headers: http::HeaderMap::new(),
            body: Vec::new(),
        },
        ok_json(r#"{"unreached":true}"#),
    ];
    let transport = single_endpoint_transport(outcomes).await;
    let abort = AbortHandle::new();
    let err = transport
        .request(RequestParams::new(http::Method::GET, "/_search"), RequestOptions::default(), &abort)
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Response(ref meta) if meta.status == 429));
}

#[tokio::test]
async fn aborting_before_dispatch_yields_request_aborted() {
    let transport = single_endpoint_transport(vec![ok_json("{}")]).await;
    let abort = AbortHandle::new();
    abort.abort();
    let err = transport
        .request(RequestParams::new(http::Method::GET, "/_search"), RequestOptions::default(), &abort)
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::RequestAborted));
}

#[tokio::test]
async fn round_robin_fairness_across_many_nodes() {
    let config = TransportConfig::default();
    let outcomes = vec![ok_json("{}"); 8];
    let executor_factory = factory_returning(outcomes);
    let transport = Transport::with_standard_pool(
        config,
        executor_factory,
        vec![
            NodeDescriptor::from_url(Url::parse("http://a:9200").unwrap()),
            NodeDescriptor::from_url(Url::parse("http://b:9200").unwrap()),
        ],
        None,
    )
    .await
    .unwrap();

    let seen = Arc::new(StdMutex::new(std::collections::HashSet::new()));
    for _ in 0..2 {
        let abort = AbortHandle::new();
        let response = transport
            .request(RequestParams::new(http::Method::GET, "/_cluster/health"), RequestOptions::default(), &abort)
            .await
            .unwrap();
        seen.lock().unwrap().insert(response.meta.connection_id);
    }
    assert_eq!(seen.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn cloud_pool_construction_resolves_single_endpoint() {
    let payload = "example.com$instance-1$instance-2";
    let encoded = {
        use base64::engine::general_purpose::STANDARD as BASE64;
        use base64::Engine;
        BASE64.encode(payload)
    };
    let cloud_id = format!("deployment:{encoded}");
    let config = TransportConfig::default();
    let transport = Transport::with_cloud_pool(
        config,
        factory_returning(vec![ok_json("{}")]),
        &cloud_id,
        Some(Credentials::ApiKeyEncoded("token".into())),
    )
    .await
    .unwrap();
    let abort = AbortHandle::new();
    let response = transport
        .request(RequestParams::new(http::Method::GET, "/"), RequestOptions::default(), &abort)
        .await
        .unwrap();
    assert_eq!(response.status_code, 200);
}

#[tokio::test]
async fn stream_body_forces_zero_retries() {
    let outcomes = vec![
        MockOutcome::Response {
            status: 503,
            headers: http::HeaderMap::new(),
            body: Vec::new(),
        },
        ok_json("{}"),
    ];
    let transport = single_endpoint_transport(outcomes).await;
    let abort = AbortHandle::new();
    let chunk: Result<bytes::Bytes, std::io::Error> = Ok(bytes::Bytes::from_static(b"{}"));
    let stream = futures::stream::iter(vec![chunk]);
    let mut params = RequestParams::new(http::Method::POST, "/_bulk");
    params.body = Some(RequestBody::Stream(Box::pin(stream)));
    let err = transport.request(params, RequestOptions::default(), &abort).await.unwrap_err();
    assert!(matches!(err, TransportError::Response(ref meta) if meta.status == 503));
}

struct SlowExecutor {
    calls: StdMutex<usize>,
}

#[async_trait::async_trait]
impl HttpExecutor for SlowExecutor {
    async fn execute(
        &self,
        _request: transport_connection::OutboundRequest,
    ) -> Result<transport_connection::InboundResponse, TransportError> {
        *self.calls.lock().unwrap() += 1;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let mut headers = http::HeaderMap::new();
        headers.insert(http::header::CONTENT_TYPE, http::HeaderValue::from_static("application/json"));
        let body = r#"{"nodes":{"n1":{"http":{"publish_address":"node-a:9200"}}}}"#;
        Ok(transport_connection::InboundResponse {
            status: 200,
            headers,
            body: transport_connection::ResponsePayload::Bytes(bytes::Bytes::from_static(body.as_bytes())),
        })
    }
}

#[tokio::test]
async fn concurrent_sniffs_run_at_most_one_at_a_time() {
    let executor = Arc::new(SlowExecutor { calls: StdMutex::new(0) });
    let executor_for_factory = executor.clone();
    let factory: ExecutorFactory = Arc::new(move |_url: &Url| executor_for_factory.clone() as Arc<dyn HttpExecutor>);

    let config = TransportConfig::default();
    let transport = Transport::with_standard_pool(
        config,
        factory,
        vec![NodeDescriptor::from_url(Url::parse("http://node-a:9200").unwrap())],
        None,
    )
    .await
    .unwrap();

    let (t1, t2) = (transport.clone(), transport.clone());
    let (r1, r2) = tokio::join!(
        tokio::spawn(async move { t1.sniff(SniffReason::Default).await }),
        tokio::spawn(async move { t2.sniff(SniffReason::Default).await }),
    );
    r1.unwrap();
    r2.unwrap();

    // One of the two concurrent calls is dropped (P7); only one
    // executes the underlying sniff request.
    assert_eq!(*executor.calls.lock().unwrap(), 1);
}
