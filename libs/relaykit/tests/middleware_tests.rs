//! Integration tests for the outbound middleware chain

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use relaykit::{
    CallContext, Code, Encoding, MiddlewareChain, Next, Payload, Request, Response, RpcError,
    TimingMiddleware, TimingRecord, TimingRecorder, UnaryOutbound, UnaryOutboundMiddleware,
};

type Events = Arc<Mutex<Vec<String>>>;

/// Records entry and exit around the next stage.
struct Tag {
    name: &'static str,
    events: Events,
}

#[async_trait]
impl UnaryOutboundMiddleware for Tag {
    async fn call(
        &self,
        ctx: &CallContext,
        request: Request,
        next: Next<'_>,
    ) -> Result<Response, RpcError> {
        self.events.lock().push(format!("{}:out", self.name));
        let result = next.run(ctx, request).await;
        self.events.lock().push(format!("{}:back", self.name));
        result
    }
}

/// Rejects every call without reaching the next stage.
struct Reject;

#[async_trait]
impl UnaryOutboundMiddleware for Reject {
    async fn call(
        &self,
        _ctx: &CallContext,
        _request: Request,
        _next: Next<'_>,
    ) -> Result<Response, RpcError> {
        Err(RpcError::status(Code::ResourceExhausted, "rate limited"))
    }
}

/// Echoes the request payload back.
struct Echo {
    events: Events,
}

#[async_trait]
impl UnaryOutbound for Echo {
    async fn call(&self, _ctx: &CallContext, request: Request) -> Result<Response, RpcError> {
        self.events.lock().push("terminal".to_owned());
        Ok(Response::new(request.payload))
    }
}

/// Fails with a fixed application error after a short delay.
struct SlowFailure;

#[async_trait]
impl UnaryOutbound for SlowFailure {
    async fn call(&self, _ctx: &CallContext, _request: Request) -> Result<Response, RpcError> {
        tokio::time::sleep(Duration::from_millis(20)).await;
        Err(not_found())
    }
}

/// Never answers.
struct Hang;

#[async_trait]
impl UnaryOutbound for Hang {
    async fn call(&self, _ctx: &CallContext, _request: Request) -> Result<Response, RpcError> {
        std::future::pending().await
    }
}

#[derive(Default)]
struct Collect {
    records: Mutex<Vec<TimingRecord>>,
}

impl TimingRecorder for Collect {
    fn record(&self, record: TimingRecord) {
        self.records.lock().push(record);
    }
}

fn not_found() -> RpcError {
    RpcError::application(
        "EntityNotExistsError",
        "workflow execution not found",
        Payload::new(Encoding::Thrift, &b"\x0b\x00\x01"[..]),
    )
}

fn signal_request() -> Request {
    Request::new(
        "WorkflowService::SignalWorkflowExecution",
        Payload::new(Encoding::Thrift, &b"signal-body"[..]),
    )
}

fn ctx() -> CallContext {
    CallContext::new("WorkflowService::SignalWorkflowExecution")
}

fn tag(name: &'static str, events: &Events) -> Tag {
    Tag {
        name,
        events: Arc::clone(events),
    }
}

#[tokio::test]
async fn units_run_in_registration_order_and_unwind_in_reverse() {
    let events = Events::default();
    let outbound = MiddlewareChain::new()
        .with(tag("a", &events))
        .with(tag("b", &events))
        .wrap(Arc::new(Echo {
            events: Arc::clone(&events),
        }));

    outbound.call(&ctx(), signal_request()).await.unwrap();

    assert_eq!(
        *events.lock(),
        vec!["a:out", "b:out", "terminal", "b:back", "a:back"]
    );
}

#[tokio::test]
async fn nesting_chains_matches_concatenation() {
    let flat_events = Events::default();
    let flat = MiddlewareChain::new()
        .with(tag("a", &flat_events))
        .with(tag("b", &flat_events))
        .wrap(Arc::new(Echo {
            events: Arc::clone(&flat_events),
        }));

    let nested_events = Events::default();
    let inner = MiddlewareChain::new()
        .with(tag("b", &nested_events))
        .wrap(Arc::new(Echo {
            events: Arc::clone(&nested_events),
        }));
    let nested = MiddlewareChain::new()
        .with(tag("a", &nested_events))
        .wrap(Arc::new(inner));

    let appended_events = Events::default();
    let appended = MiddlewareChain::new()
        .with(tag("a", &appended_events))
        .append(MiddlewareChain::new().with(tag("b", &appended_events)))
        .wrap(Arc::new(Echo {
            events: Arc::clone(&appended_events),
        }));

    let flat_response = flat.call(&ctx(), signal_request()).await.unwrap();
    let nested_response = nested.call(&ctx(), signal_request()).await.unwrap();
    let appended_response = appended.call(&ctx(), signal_request()).await.unwrap();

    assert_eq!(flat_response, nested_response);
    assert_eq!(flat_response, appended_response);
    assert_eq!(*flat_events.lock(), *nested_events.lock());
    assert_eq!(*flat_events.lock(), *appended_events.lock());
}

#[tokio::test]
async fn empty_chain_is_a_passthrough() {
    let events = Events::default();
    let terminal = Arc::new(Echo {
        events: Arc::clone(&events),
    });
    let chain = MiddlewareChain::new();
    assert!(chain.is_empty());
    let outbound = chain.wrap(terminal.clone());

    let direct = terminal.call(&ctx(), signal_request()).await.unwrap();
    let chained = outbound.call(&ctx(), signal_request()).await.unwrap();

    assert_eq!(direct, chained);
    assert_eq!(*events.lock(), vec!["terminal", "terminal"]);
}

#[tokio::test]
async fn short_circuit_skips_the_transport() {
    let events = Events::default();
    let outbound = MiddlewareChain::new()
        .with(tag("outer", &events))
        .with(Reject)
        .wrap(Arc::new(Echo {
            events: Arc::clone(&events),
        }));

    let err = outbound.call(&ctx(), signal_request()).await.unwrap_err();

    assert_eq!(err, RpcError::status(Code::ResourceExhausted, "rate limited"));
    assert_eq!(*events.lock(), vec!["outer:out", "outer:back"]);
}

#[tokio::test]
async fn timing_emits_one_record_per_call_and_keeps_results() {
    let recorder = Arc::new(Collect::default());
    let timed = MiddlewareChain::new()
        .with(TimingMiddleware::with_recorder(recorder.clone()))
        .wrap(Arc::new(SlowFailure));
    let plain = MiddlewareChain::new().wrap(Arc::new(SlowFailure));

    let timed_err = timed.call(&ctx(), signal_request()).await.unwrap_err();
    let plain_err = plain.call(&ctx(), signal_request()).await.unwrap_err();

    assert_eq!(timed_err, not_found());
    assert_eq!(timed_err, plain_err);

    let records = recorder.records.lock();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].method, "SignalWorkflowExecution");
    assert_eq!(records[0].procedure, "WorkflowService::SignalWorkflowExecution");
    assert!(records[0].elapsed_ms >= 20);
    assert!(!records[0].success);
}

#[tokio::test]
async fn timing_records_successful_calls() {
    let events = Events::default();
    let recorder = Arc::new(Collect::default());
    let outbound = MiddlewareChain::new()
        .with(TimingMiddleware::with_recorder(recorder.clone()))
        .wrap(Arc::new(Echo { events }));

    let request = Request::new(
        "WorkflowService::StartWorkflowExecution",
        Payload::new(Encoding::Json, r#"{"runId":"abc123"}"#),
    );
    let response = outbound
        .call(&CallContext::new("WorkflowService::StartWorkflowExecution"), request.clone())
        .await
        .unwrap();

    assert_eq!(response.payload, request.payload);
    let records = recorder.records.lock();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].method, "StartWorkflowExecution");
    assert!(records[0].success);
}

#[tokio::test]
async fn cancellation_aborts_the_outbound_call() {
    let recorder = Arc::new(Collect::default());
    let outbound = MiddlewareChain::new()
        .with(TimingMiddleware::with_recorder(recorder.clone()))
        .wrap(Arc::new(Hang));
    let ctx = ctx();
    let canceller = ctx.clone();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(2),
        outbound.call(&ctx, signal_request()),
    )
    .await
    .expect("cancelled call should return promptly");

    assert_eq!(result.unwrap_err().code(), Code::Cancelled);
    assert_eq!(recorder.records.lock().len(), 1);
}

#[tokio::test]
async fn deadline_aborts_the_outbound_call() {
    let outbound = MiddlewareChain::new().wrap(Arc::new(Hang));
    let ctx = ctx().with_timeout(Duration::from_millis(30));

    let result = tokio::time::timeout(
        Duration::from_secs(2),
        outbound.call(&ctx, signal_request()),
    )
    .await
    .expect("call past its deadline should return promptly");

    assert_eq!(result.unwrap_err().code(), Code::DeadlineExceeded);
}

#[tokio::test]
async fn concurrent_calls_do_not_cross_talk() {
    let events = Events::default();
    let recorder = Arc::new(Collect::default());
    let outbound = Arc::new(
        MiddlewareChain::new()
            .with(TimingMiddleware::with_recorder(recorder.clone()))
            .wrap(Arc::new(Echo { events })),
    );

    let calls = (0..300).map(|i| {
        let outbound = Arc::clone(&outbound);
        async move {
            let procedure = format!("WorkflowService::Method{}", i % 7);
            let body = format!("request-{i}");
            let request = Request::new(procedure.clone(), Payload::new(Encoding::Raw, body.clone()));
            let response = outbound
                .call(&CallContext::new(procedure), request)
                .await
                .unwrap();
            (body, response)
        }
    });

    for (body, response) in futures::future::join_all(calls).await {
        assert_eq!(response.payload.body().as_ref(), body.as_bytes());
    }
    assert_eq!(recorder.records.lock().len(), 300);
}
