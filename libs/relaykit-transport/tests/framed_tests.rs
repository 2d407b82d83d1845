//! End-to-end tests of the framed TCP transport over loopback

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use relaykit::{
    CallContext, Code, Encoding, Inbound, Payload, Procedure, Request, Response, Router, RpcError,
    UnaryHandler, UnaryOutbound,
};
use relaykit_transport::{FramedInbound, FramedOutbound, OutboundConfig};
use tokio::sync::mpsc;

/// Answers with the request headers and body, plus the caller it saw.
struct Echo;

#[async_trait]
impl UnaryHandler for Echo {
    async fn handle(&self, ctx: CallContext, request: Request) -> Result<Response, RpcError> {
        let mut headers = request.headers;
        headers.insert("seen-caller".to_owned(), ctx.caller().to_owned());
        if let Some(delay) = request.payload.body().first() {
            tokio::time::sleep(Duration::from_millis(u64::from(*delay % 20))).await;
        }
        Ok(Response {
            headers,
            payload: request.payload,
        })
    }
}

struct Fail;

#[async_trait]
impl UnaryHandler for Fail {
    async fn handle(&self, _ctx: CallContext, _request: Request) -> Result<Response, RpcError> {
        Err(RpcError::application(
            "EntityNotExistsError",
            "workflow execution not found",
            Payload::new(Encoding::Thrift, &b"\x0b\x00\x01"[..]),
        ))
    }
}

/// Sends on the channel when its future is dropped.
struct SignalOnDrop(mpsc::UnboundedSender<()>);

impl Drop for SignalOnDrop {
    fn drop(&mut self) {
        let _ = self.0.send(());
    }
}

/// Never answers; reports when the inbound side gives up on the call.
struct Hang(mpsc::UnboundedSender<()>);

#[async_trait]
impl UnaryHandler for Hang {
    async fn handle(&self, _ctx: CallContext, _request: Request) -> Result<Response, RpcError> {
        let _signal = SignalOnDrop(self.0.clone());
        std::future::pending().await
    }
}

fn router(abandoned: mpsc::UnboundedSender<()>) -> Arc<Router> {
    let mut router = Router::new();
    router
        .register_all([
            Procedure::new("Test::echo", Arc::new(Echo)),
            Procedure::new("Test::fail", Arc::new(Fail)),
            Procedure::new("Test::hang", Arc::new(Hang(abandoned))),
        ])
        .unwrap();
    Arc::new(router)
}

async fn start_inbound(address: &str) -> (FramedInbound, mpsc::UnboundedReceiver<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let inbound = FramedInbound::new(address);
    inbound.start(router(tx)).await.unwrap();
    (inbound, rx)
}

fn outbound_to(inbound: &FramedInbound) -> FramedOutbound {
    let address = inbound.local_addr().unwrap().to_string();
    FramedOutbound::new(
        address,
        OutboundConfig::new("test-backend")
            .with_connect_timeout(Duration::from_secs(1))
            .with_backoff(Duration::from_millis(10), Duration::from_millis(50)),
    )
}

fn request(procedure: &str, body: &'static [u8]) -> Request {
    Request::new(procedure, Payload::new(Encoding::Thrift, body))
        .with_caller("cadence-proxy")
        .with_service("test-backend")
}

#[tokio::test]
async fn call_round_trips_metadata_and_body() {
    let (inbound, _abandoned) = start_inbound("127.0.0.1:0").await;
    let outbound = outbound_to(&inbound);

    let mut call = request("Test::echo", b"\x00start");
    call.headers.insert("cadence-client-name".to_owned(), "uber-go".to_owned());
    let response = outbound
        .call(&CallContext::new("Test::echo"), call)
        .await
        .unwrap();

    assert_eq!(response.payload, Payload::new(Encoding::Thrift, &b"\x00start"[..]));
    assert_eq!(
        response.headers.get("cadence-client-name").map(String::as_str),
        Some("uber-go")
    );
    assert_eq!(
        response.headers.get("seen-caller").map(String::as_str),
        Some("cadence-proxy")
    );
    assert!(outbound.is_connected());

    outbound.stop().await;
    inbound.stop().await;
}

#[tokio::test]
async fn application_errors_arrive_unchanged() {
    let (inbound, _abandoned) = start_inbound("127.0.0.1:0").await;
    let outbound = outbound_to(&inbound);

    let err = outbound
        .call(&CallContext::new("Test::fail"), request("Test::fail", b""))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        RpcError::application(
            "EntityNotExistsError",
            "workflow execution not found",
            Payload::new(Encoding::Thrift, &b"\x0b\x00\x01"[..]),
        )
    );
    inbound.stop().await;
}

#[tokio::test]
async fn unknown_procedure_is_unimplemented_remotely() {
    let (inbound, _abandoned) = start_inbound("127.0.0.1:0").await;
    let outbound = outbound_to(&inbound);

    let err = outbound
        .call(&CallContext::new("Test::missing"), request("Test::missing", b""))
        .await
        .unwrap_err();

    assert_eq!(err.code(), Code::Unimplemented);
    inbound.stop().await;
}

#[tokio::test]
async fn dropping_a_call_cancels_it_on_the_inbound_side() {
    let (inbound, mut abandoned) = start_inbound("127.0.0.1:0").await;
    let outbound = outbound_to(&inbound);

    let result = tokio::time::timeout(
        Duration::from_millis(100),
        outbound.call(&CallContext::new("Test::hang"), request("Test::hang", b"")),
    )
    .await;
    assert!(result.is_err());

    tokio::time::timeout(Duration::from_secs(2), abandoned.recv())
        .await
        .expect("inbound handler should be cancelled")
        .unwrap();
    inbound.stop().await;
}

#[tokio::test]
async fn deadline_travels_with_the_call() {
    let (inbound, mut abandoned) = start_inbound("127.0.0.1:0").await;
    let outbound = outbound_to(&inbound);
    let ctx = CallContext::new("Test::hang").with_timeout(Duration::from_millis(50));

    let err = tokio::time::timeout(
        Duration::from_secs(2),
        outbound.call(&ctx, request("Test::hang", b"")),
    )
    .await
    .expect("call should end at its deadline")
    .unwrap_err();

    assert_eq!(err.code(), Code::DeadlineExceeded);
    tokio::time::timeout(Duration::from_secs(2), abandoned.recv())
        .await
        .expect("inbound handler should give up at the deadline")
        .unwrap();
    inbound.stop().await;
}

#[tokio::test]
async fn concurrent_calls_share_one_connection() {
    let (inbound, _abandoned) = start_inbound("127.0.0.1:0").await;
    let outbound = Arc::new(outbound_to(&inbound));

    let calls = (0..200u16).map(|i| {
        let outbound = Arc::clone(&outbound);
        async move {
            let body = i.to_be_bytes().to_vec();
            let call = Request::new("Test::echo", Payload::new(Encoding::Raw, body.clone()))
                .with_caller("cadence-proxy");
            let response = outbound
                .call(&CallContext::new("Test::echo"), call)
                .await
                .unwrap();
            (body, response)
        }
    });

    for (body, response) in futures::future::join_all(calls).await {
        assert_eq!(response.payload.body().as_ref(), body.as_slice());
    }
    inbound.stop().await;
}

#[tokio::test]
async fn unreachable_backend_is_unavailable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    drop(listener);

    let outbound = FramedOutbound::new(
        address,
        OutboundConfig::new("test-backend")
            .with_max_retries(1)
            .with_backoff(Duration::from_millis(1), Duration::from_millis(1)),
    );
    let err = outbound
        .call(&CallContext::new("Test::echo"), request("Test::echo", b""))
        .await
        .unwrap_err();

    assert_eq!(err.code(), Code::Unavailable);
}

#[tokio::test]
async fn reconnects_after_the_backend_restarts() {
    let (first, _abandoned) = start_inbound("127.0.0.1:0").await;
    let address = first.local_addr().unwrap().to_string();
    let outbound = outbound_to(&first);

    outbound
        .call(&CallContext::new("Test::echo"), request("Test::echo", b""))
        .await
        .unwrap();
    first.stop().await;

    tokio::time::timeout(Duration::from_secs(2), async {
        while outbound.is_connected() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("outbound should notice the closed connection");

    let (second, _abandoned) = start_inbound(&address).await;
    let response = outbound
        .call(&CallContext::new("Test::echo"), request("Test::echo", b"\x01again"))
        .await
        .unwrap();
    assert_eq!(response.payload.body().as_ref(), b"\x01again");
    second.stop().await;
}

#[tokio::test]
async fn stopped_outbound_refuses_calls() {
    let (inbound, _abandoned) = start_inbound("127.0.0.1:0").await;
    let outbound = outbound_to(&inbound);
    outbound.stop().await;

    let err = outbound
        .call(&CallContext::new("Test::echo"), request("Test::echo", b""))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::Unavailable);
    inbound.stop().await;
}
