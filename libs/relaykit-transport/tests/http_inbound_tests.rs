//! Tests for the YARPC header mapping of the HTTP inbound

use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, to_bytes};
use axum::http::{Request as HttpRequest, StatusCode};
use relaykit::{
    CallContext, Code, Encoding, Inbound, Payload, Procedure, Request, Response, Router, RpcError,
    UnaryHandler, handler_fn,
};
use relaykit_transport::{HttpInbound, http_router};
use tower::ServiceExt;

struct EchoWithHeader;

#[async_trait::async_trait]
impl UnaryHandler for EchoWithHeader {
    async fn handle(&self, ctx: CallContext, request: Request) -> Result<Response, RpcError> {
        let mut response = Response::new(request.payload);
        response
            .headers
            .insert("seen-caller".to_owned(), ctx.caller().to_owned());
        for (key, value) in request.headers {
            response.headers.insert(key, value);
        }
        Ok(response)
    }
}

fn app() -> axum::Router {
    let mut router = Router::new();
    router
        .register_all([
            Procedure::new("WorkflowService::StartWorkflowExecution", Arc::new(EchoWithHeader)),
            Procedure::new(
                "WorkflowService::SignalWorkflowExecution",
                Arc::new(handler_fn(|_ctx, _payload| async move {
                    Err::<Payload, _>(RpcError::application(
                        "EntityNotExistsError",
                        "workflow execution not found",
                        Payload::new(Encoding::Thrift, &b"\x0b\x00\x01"[..]),
                    ))
                })),
            ),
            Procedure::new(
                "WorkflowService::DescribeDomain",
                Arc::new(handler_fn(|_ctx, _payload| async move {
                    Err::<Payload, _>(RpcError::unavailable("backend connection refused"))
                })),
            ),
            Procedure::new(
                "WorkflowService::PollForDecisionTask",
                Arc::new(handler_fn(|_ctx, _payload| async move {
                    std::future::pending::<Result<Payload, RpcError>>().await
                })),
            ),
        ])
        .unwrap();
    http_router(Arc::new(router))
}

fn call(procedure: &str) -> axum::http::request::Builder {
    HttpRequest::builder()
        .method("POST")
        .uri("/")
        .header("Rpc-Caller", "cadence-cli")
        .header("Rpc-Service", "cadence-frontend")
        .header("Rpc-Procedure", procedure)
}

fn header<'a>(response: &'a axum::response::Response, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

#[tokio::test]
async fn success_carries_body_encoding_and_headers() {
    let request = call("WorkflowService::StartWorkflowExecution")
        .header("Rpc-Encoding", "json")
        .header("Rpc-Header-Cadence-Client-Name", "uber-go")
        .body(Body::from(r#"{"workflowId":"wf-1"}"#))
        .unwrap();

    let response = app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "rpc-status"), Some("success"));
    assert_eq!(header(&response, "rpc-encoding"), Some("json"));
    assert_eq!(header(&response, "rpc-header-seen-caller"), Some("cadence-cli"));
    assert_eq!(header(&response, "rpc-header-cadence-client-name"), Some("uber-go"));
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(body.as_ref(), br#"{"workflowId":"wf-1"}"#);
}

#[tokio::test]
async fn application_error_keeps_http_ok() {
    let request = call("WorkflowService::SignalWorkflowExecution")
        .header("Rpc-Encoding", "thrift")
        .body(Body::from(&b"\x0c"[..]))
        .unwrap();

    let response = app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "rpc-status"), Some("error"));
    assert_eq!(
        header(&response, "rpc-application-error-name"),
        Some("EntityNotExistsError")
    );
    assert_eq!(
        header(&response, "rpc-application-error-message"),
        Some("workflow execution not found")
    );
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(body.as_ref(), b"\x0b\x00\x01");
}

#[tokio::test]
async fn status_error_maps_to_http_status() {
    let request = call("WorkflowService::DescribeDomain")
        .body(Body::empty())
        .unwrap();

    let response = app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(header(&response, "rpc-status"), Some("error"));
    assert_eq!(header(&response, "rpc-error-code"), Some("unavailable"));
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(body.as_ref(), b"backend connection refused");
}

#[tokio::test]
async fn unknown_procedure_is_not_implemented() {
    let request = call("WorkflowService::Bogus").body(Body::empty()).unwrap();

    let response = app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    assert_eq!(
        header(&response, "rpc-error-code"),
        Some(Code::Unimplemented.as_str())
    );
}

#[tokio::test]
async fn missing_procedure_is_bad_request() {
    let request = HttpRequest::builder()
        .method("POST")
        .uri("/")
        .header("Rpc-Caller", "cadence-cli")
        .header("Rpc-Service", "cadence-frontend")
        .body(Body::empty())
        .unwrap();

    let response = app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(header(&response, "rpc-error-code"), Some("invalid-argument"));
}

#[tokio::test]
async fn non_post_is_rejected() {
    let request = HttpRequest::builder()
        .method("GET")
        .uri("/")
        .body(Body::empty())
        .unwrap();

    let response = app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(header(&response, "allow"), Some("POST"));
}

#[tokio::test]
async fn ttl_header_bounds_the_call() {
    let request = call("WorkflowService::PollForDecisionTask")
        .header("Context-TTL-MS", "50")
        .body(Body::empty())
        .unwrap();

    let response = tokio::time::timeout(Duration::from_secs(2), app().oneshot(request))
        .await
        .expect("call should end at its TTL")
        .unwrap();

    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(header(&response, "rpc-error-code"), Some("deadline-exceeded"));
}

#[tokio::test]
async fn inbound_serves_over_tcp_and_stops() {
    let inbound = HttpInbound::new("127.0.0.1:0");
    let mut router = Router::new();
    router
        .register(Procedure::new(
            "WorkflowService::ListDomains",
            Arc::new(handler_fn(|_ctx, payload| async move { Ok(payload) })),
        ))
        .unwrap();
    inbound.start(Arc::new(router)).await.unwrap();
    let address = inbound.local_addr().unwrap();

    assert!(inbound.start(Arc::new(Router::new())).await.is_err());

    let mut stream = tokio::net::TcpStream::connect(address).await.unwrap();
    let raw = "POST / HTTP/1.1\r\nHost: localhost\r\nRpc-Caller: cli\r\nRpc-Service: cadence-frontend\r\nRpc-Procedure: WorkflowService::ListDomains\r\nContent-Length: 4\r\nConnection: close\r\n\r\nping";
    tokio::io::AsyncWriteExt::write_all(&mut stream, raw.as_bytes())
        .await
        .unwrap();
    let mut reply = String::new();
    tokio::io::AsyncReadExt::read_to_string(&mut stream, &mut reply)
        .await
        .unwrap();

    assert!(reply.starts_with("HTTP/1.1 200"));
    assert!(reply.to_ascii_lowercase().contains("rpc-status: success"));
    assert!(reply.ends_with("ping"));

    inbound.stop().await;
    assert!(inbound.local_addr().is_none());
}
