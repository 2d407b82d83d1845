use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use relaykit::{CallContext, Inbound, Request, Router, TransportError};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::WRITE_QUEUE_DEPTH;
use super::codec::{CallFrame, Frame, FrameCodec};

type InFlight = Arc<DashMap<u64, CancellationToken>>;

struct Running {
    local_addr: SocketAddr,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Serves framed TCP calls from a [`Router`].
///
/// Every call runs on its own task under a context whose deadline comes from
/// the frame TTL. A `Cancel` frame, a dropped connection or [`Inbound::stop`]
/// cancels the calls still running.
pub struct FramedInbound {
    name: String,
    address: String,
    running: Mutex<Option<Running>>,
}

impl FramedInbound {
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            name: "framed".to_owned(),
            address: address.into(),
            running: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Bound address while serving. Useful when binding port 0.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.lock().as_ref().map(|running| running.local_addr)
    }
}

#[async_trait]
impl Inbound for FramedInbound {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self, router: Arc<Router>) -> Result<(), TransportError> {
        if self.running.lock().is_some() {
            return Err(TransportError::AlreadyStarted(self.name.clone()));
        }

        let listener =
            TcpListener::bind(&self.address)
                .await
                .map_err(|source| TransportError::Bind {
                    address: self.address.clone(),
                    source,
                })?;
        let local_addr = listener.local_addr()?;
        let cancel = CancellationToken::new();
        let task = tokio::spawn(accept_loop(listener, router, cancel.clone()));

        tracing::info!(inbound = %self.name, %local_addr, "framed inbound listening");
        *self.running.lock() = Some(Running {
            local_addr,
            cancel,
            task,
        });
        Ok(())
    }

    async fn stop(&self) {
        let running = self.running.lock().take();
        let Some(running) = running else {
            return;
        };

        running.cancel.cancel();
        if let Err(e) = running.task.await {
            tracing::warn!(inbound = %self.name, error = %e, "framed inbound task failed");
        }
        tracing::info!(inbound = %self.name, "framed inbound stopped");
    }
}

async fn accept_loop(listener: TcpListener, router: Arc<Router>, cancel: CancellationToken) {
    let connections = TaskTracker::new();

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    connections.spawn(serve_connection(
                        stream,
                        peer,
                        Arc::clone(&router),
                        cancel.child_token(),
                    ));
                }
                Err(e) => tracing::warn!(error = %e, "failed to accept connection"),
            },
        }
    }

    connections.close();
    connections.wait().await;
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    router: Arc<Router>,
    cancel: CancellationToken,
) {
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!(%peer, error = %e, "failed to set TCP_NODELAY");
    }
    tracing::debug!(%peer, "connection accepted");

    let (read_half, write_half) = stream.into_split();
    let mut frames = FramedRead::new(read_half, FrameCodec::new());
    let (replies, outgoing) = mpsc::channel(WRITE_QUEUE_DEPTH);
    let writer = tokio::spawn(write_replies(
        FramedWrite::new(write_half, FrameCodec::new()),
        outgoing,
        peer,
    ));

    let in_flight: InFlight = Arc::default();
    let calls = TaskTracker::new();

    loop {
        let item = tokio::select! {
            () = cancel.cancelled() => break,
            item = frames.next() => item,
        };

        match item {
            Some(Ok(Frame::Call(call))) => {
                let token = cancel.child_token();
                in_flight.insert(call.id, token.clone());
                calls.spawn(serve_call(
                    call,
                    token,
                    Arc::clone(&router),
                    Arc::clone(&in_flight),
                    replies.clone(),
                ));
            }
            Some(Ok(Frame::Cancel { id })) => {
                if let Some((_, token)) = in_flight.remove(&id) {
                    tracing::debug!(%peer, id, "call cancelled by caller");
                    token.cancel();
                }
            }
            Some(Ok(Frame::Reply { id, .. })) => {
                tracing::warn!(%peer, id, "unexpected reply frame on inbound connection");
            }
            Some(Err(e)) => {
                tracing::warn!(%peer, error = %e, "dropping connection after bad frame");
                break;
            }
            None => break,
        }
    }

    // Nobody is left to read replies for calls that are still running.
    cancel.cancel();
    calls.close();
    calls.wait().await;
    drop(replies);
    if let Err(e) = writer.await {
        tracing::warn!(%peer, error = %e, "reply writer failed");
    }
    tracing::debug!(%peer, "connection closed");
}

async fn serve_call(
    call: CallFrame,
    token: CancellationToken,
    router: Arc<Router>,
    in_flight: InFlight,
    replies: mpsc::Sender<Frame>,
) {
    let id = call.id;
    let mut ctx = CallContext::new(call.procedure.as_str())
        .with_caller(call.caller.as_str())
        .with_service(call.service.as_str())
        .with_headers(call.headers.clone())
        .with_cancellation(token);
    if call.ttl_ms > 0 {
        ctx = ctx.with_timeout(Duration::from_millis(call.ttl_ms));
    }

    let request = Request::new(call.procedure, call.payload)
        .with_caller(call.caller)
        .with_service(call.service)
        .with_headers(call.headers);
    let result = ctx.run(router.dispatch(ctx.clone(), request)).await;

    in_flight.remove(&id);
    if replies.send(Frame::Reply { id, result }).await.is_err() {
        tracing::debug!(id, "connection gone before reply");
    }
}

async fn write_replies(
    mut sink: FramedWrite<OwnedWriteHalf, FrameCodec>,
    mut replies: mpsc::Receiver<Frame>,
    peer: SocketAddr,
) {
    while let Some(reply) = replies.recv().await {
        if let Err(e) = sink.send(reply).await {
            tracing::warn!(%peer, error = %e, "failed to write reply");
            break;
        }
    }
}
