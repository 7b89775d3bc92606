//! Integration tests for the runtime loop.
//!
//! Uses wiremock as the control endpoint. Covers the response and error
//! paths, once-only handler loading, delivery ordering and fatal protocol
//! failures.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use relay_runtime::{
    ControlClient, EventLoop, Export, Handler, HandlerLoader, InvocationOutcome, Request,
    Response, RuntimeConfig, RuntimeError, RuntimeResult, StaticLoader,
};
use serde_json::json;
use serial_test::serial;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const NEXT: &str = "/2018-06-01/runtime/invocation/next";

struct HelloHandler {
    calls: AtomicUsize,
}

#[async_trait]
impl Handler for HelloHandler {
    async fn call(&self, request: Request) -> anyhow::Result<Option<Response>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match request.url.path() {
            "/fail" => anyhow::bail!("boom"),
            "/nothing" => Ok(None),
            _ => Ok(Some(Response::text("Hello World!"))),
        }
    }
}

struct CountingLoader {
    loads: AtomicUsize,
    inner: StaticLoader,
}

#[async_trait]
impl HandlerLoader for CountingLoader {
    async fn load(&self, specifier: &str) -> RuntimeResult<Export> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load(specifier).await
    }
}

fn invocation(id: &str, request_path: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("lambda-runtime-aws-request-id", id)
        .insert_header("lambda-runtime-trace-id", format!("Root=trace-{}", id).as_str())
        .set_body_json(json!({
            "method": "GET",
            "path": request_path,
            "headers": {
                "x-forwarded-proto": "https",
                "x-forwarded-host": "example.com"
            },
            "body": ""
        }))
}

async fn mount_next(server: &MockServer, priority: u8, id: &str, request_path: &str) {
    Mock::given(method("GET"))
        .and(path(NEXT))
        .respond_with(invocation(id, request_path))
        .up_to_n_times(1)
        .with_priority(priority)
        .mount(server)
        .await;
}

async fn mount_result(server: &MockServer, id: &str, kind: &str, status: u16) {
    Mock::given(method("POST"))
        .and(path(format!("/2018-06-01/runtime/invocation/{}/{}", id, kind)))
        .respond_with(ResponseTemplate::new(status))
        .expect(1)
        .mount(server)
        .await;
}

fn build_loop(
    server: &MockServer,
    handler: Arc<HelloHandler>,
) -> (EventLoop<Arc<CountingLoader>>, Arc<CountingLoader>) {
    let loader = Arc::new(CountingLoader {
        loads: AtomicUsize::new(0),
        inner: StaticLoader::new().with_handler("api/hello", handler),
    });
    let config = RuntimeConfig::new(server.uri(), "api/hello");
    let client = ControlClient::new(&config).unwrap();
    (
        EventLoop::with_client(client, "api/hello", Arc::clone(&loader)),
        loader,
    )
}

fn hello() -> Arc<HelloHandler> {
    Arc::new(HelloHandler {
        calls: AtomicUsize::new(0),
    })
}

#[tokio::test]
#[serial]
async fn test_hello_world_response_envelope() {
    let server = MockServer::start().await;
    mount_next(&server, 1, "req-1", "/").await;

    Mock::given(method("POST"))
        .and(path("/2018-06-01/runtime/invocation/req-1/response"))
        .and(body_json(json!({
            "statusCode": 200,
            "headers": {"content-type": "text/plain;charset=UTF-8"},
            "encoding": "base64",
            "body": "SGVsbG8gV29ybGQh"
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let (event_loop, _) = build_loop(&server, hello());
    let outcome = event_loop.run_once().await.unwrap();

    assert_eq!(
        outcome,
        InvocationOutcome::Responded {
            id: "req-1".into(),
            status_code: 200
        }
    );
    assert!(event_loop.is_handler_loaded());
}

#[tokio::test]
#[serial]
async fn test_loop_loads_once_and_preserves_order() {
    let server = MockServer::start().await;
    mount_next(&server, 1, "a", "/").await;
    mount_next(&server, 2, "b", "/fail").await;
    mount_next(&server, 3, "c", "/nothing").await;
    Mock::given(method("GET"))
        .and(path(NEXT))
        .respond_with(ResponseTemplate::new(500))
        .with_priority(10)
        .mount(&server)
        .await;

    mount_result(&server, "a", "response", 202).await;
    Mock::given(method("POST"))
        .and(path("/2018-06-01/runtime/invocation/b/error"))
        .and(header("lambda-runtime-function-error-type", "Unhandled"))
        .and(body_json(json!({
            "errorType": "HandlerExecutionError",
            "errorMessage": "boom",
            "stackTrace": []
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/2018-06-01/runtime/invocation/c/response"))
        .and(body_json(json!({
            "statusCode": 200,
            "headers": {},
            "encoding": "base64",
            "body": ""
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let handler = hello();
    let (event_loop, loader) = build_loop(&server, Arc::clone(&handler));

    let err = event_loop.run().await.unwrap_err();
    assert!(matches!(err, RuntimeError::Protocol { .. }));

    assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
    assert_eq!(handler.calls.load(Ordering::SeqCst), 3);

    let paths: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.url.path().to_string())
        .collect();
    assert_eq!(
        paths,
        vec![
            NEXT.to_string(),
            "/2018-06-01/runtime/invocation/a/response".to_string(),
            NEXT.to_string(),
            "/2018-06-01/runtime/invocation/b/error".to_string(),
            NEXT.to_string(),
            "/2018-06-01/runtime/invocation/c/response".to_string(),
            NEXT.to_string(),
        ]
    );
}

#[tokio::test]
#[serial]
async fn test_next_failure_is_fatal_before_handler_runs() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(NEXT))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let handler = hello();
    let (event_loop, loader) = build_loop(&server, Arc::clone(&handler));
    let err = event_loop.run().await.unwrap_err();

    assert!(matches!(err, RuntimeError::Protocol { .. }));
    assert!(err.is_fatal());
    assert_ne!(err.exit_code(), 0);
    assert_eq!(loader.loads.load(Ordering::SeqCst), 0);
    assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
#[serial]
async fn test_missing_request_id_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(NEXT))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .mount(&server)
        .await;

    let (event_loop, _) = build_loop(&server, hello());
    let err = event_loop.run_once().await.unwrap_err();
    assert!(matches!(err, RuntimeError::Protocol { .. }));
}

#[tokio::test]
#[serial]
async fn test_rejected_response_post_is_fatal() {
    let server = MockServer::start().await;
    mount_next(&server, 1, "req-1", "/").await;
    mount_result(&server, "req-1", "response", 400).await;

    let (event_loop, _) = build_loop(&server, hello());
    let err = event_loop.run_once().await.unwrap_err();
    assert!(matches!(err, RuntimeError::Protocol { .. }));
}

#[tokio::test]
#[serial]
async fn test_not_callable_export_is_reported_per_invocation() {
    let server = MockServer::start().await;
    mount_next(&server, 1, "x", "/").await;
    mount_next(&server, 2, "y", "/").await;

    Mock::given(method("POST"))
        .and(path("/2018-06-01/runtime/invocation/x/error"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;
    mount_result(&server, "y", "error", 202).await;

    let loader = StaticLoader::new().with_export("api/hello", Export::NotCallable("an object".into()));
    let config = RuntimeConfig::new(server.uri(), "api/hello");
    let event_loop = EventLoop::new(&config, loader).unwrap();

    for id in ["x", "y"] {
        let outcome = event_loop.run_once().await.unwrap();
        assert_eq!(
            outcome,
            InvocationOutcome::Failed {
                id: id.into(),
                error_type: "HandlerLoadError".into()
            }
        );
    }
    assert!(!event_loop.is_handler_loaded());

    let requests = server.received_requests().await.unwrap();
    let envelope: serde_json::Value = serde_json::from_slice(&requests[1].body).unwrap();
    assert_eq!(envelope["errorType"], "HandlerLoadError");
    assert!(envelope["errorMessage"]
        .as_str()
        .unwrap()
        .contains("expected a function"));
}

#[tokio::test]
#[serial]
async fn test_trace_id_is_exported_per_invocation() {
    let server = MockServer::start().await;
    mount_next(&server, 1, "t1", "/").await;
    Mock::given(method("GET"))
        .and(path(NEXT))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("lambda-runtime-aws-request-id", "t2")
                .set_body_json(json!({"method": "GET", "path": "/"})),
        )
        .with_priority(2)
        .mount(&server)
        .await;
    mount_result(&server, "t1", "response", 202).await;
    mount_result(&server, "t2", "response", 202).await;

    let (event_loop, _) = build_loop(&server, hello());

    event_loop.run_once().await.unwrap();
    assert_eq!(
        std::env::var("_X_AMZN_TRACE_ID").as_deref(),
        Ok("Root=trace-t1")
    );

    event_loop.run_once().await.unwrap();
    assert!(std::env::var("_X_AMZN_TRACE_ID").is_err());
}
