use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use relaykit::{CallContext, Request, Response, RpcError, UnaryOutbound};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;

use super::WRITE_QUEUE_DEPTH;
use super::codec::{CallFrame, Frame, FrameCodec, FrameError};
use crate::client::{OutboundConfig, connect_with_retry, duration_to_u64_ms};

type ReplySender = oneshot::Sender<Result<Response, RpcError>>;

/// One live connection and the calls waiting on it.
struct Connection {
    address: String,
    writer: mpsc::Sender<Frame>,
    pending: DashMap<u64, ReplySender>,
    closed: CancellationToken,
}

impl Connection {
    fn is_open(&self) -> bool {
        !self.closed.is_cancelled()
    }

    fn settle(&self, id: u64, result: Result<Response, RpcError>) {
        match self.pending.remove(&id) {
            Some((_, reply)) => {
                let _ = reply.send(result);
            }
            None => tracing::debug!(address = %self.address, id, "reply for abandoned call"),
        }
    }

    fn fail_pending(&self, reason: &str) {
        let ids: Vec<u64> = self.pending.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            if let Some((_, reply)) = self.pending.remove(&id) {
                let _ = reply.send(Err(RpcError::unavailable(reason)));
            }
        }
    }
}

/// Removes the call from the pending table when the caller stops waiting.
///
/// A call still pending at that point was abandoned (cancelled, timed out or
/// dropped), so the inbound side is told to stop working on it.
struct PendingCall {
    id: u64,
    conn: Arc<Connection>,
}

impl Drop for PendingCall {
    fn drop(&mut self) {
        if self.conn.pending.remove(&self.id).is_some() && self.conn.is_open() {
            tracing::debug!(address = %self.conn.address, id = self.id, "call abandoned, sending cancel");
            let _ = self.conn.writer.try_send(Frame::Cancel { id: self.id });
        }
    }
}

/// Unary outbound over a multiplexed framed TCP connection.
///
/// Connects on first use and again after the connection drops. Calls are
/// never retried; a lost connection fails every pending call with `Unavailable`.
pub struct FramedOutbound {
    address: String,
    config: OutboundConfig,
    next_id: AtomicU64,
    connection: ArcSwapOption<Connection>,
    connecting: Mutex<()>,
    stopped: CancellationToken,
}

impl FramedOutbound {
    #[must_use]
    pub fn new(address: impl Into<String>, config: OutboundConfig) -> Self {
        Self {
            address: address.into(),
            config,
            next_id: AtomicU64::new(1),
            connection: ArcSwapOption::empty(),
            connecting: Mutex::new(()),
            stopped: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    #[must_use]
    pub fn config(&self) -> &OutboundConfig {
        &self.config
    }

    /// Whether a connection is currently established.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.live_connection().is_some()
    }

    fn live_connection(&self) -> Option<Arc<Connection>> {
        self.connection.load_full().filter(|conn| conn.is_open())
    }

    async fn connection(&self) -> Result<Arc<Connection>, RpcError> {
        if let Some(conn) = self.live_connection() {
            return Ok(conn);
        }

        let _connecting = self.connecting.lock().await;
        if let Some(conn) = self.live_connection() {
            return Ok(conn);
        }
        if self.stopped.is_cancelled() {
            return Err(self.stopped_error());
        }

        let stream = connect_with_retry(&self.address, &self.config)
            .await
            .map_err(|e| RpcError::unavailable(format!("{e:#}")))?;
        let conn = self.spawn_connection(stream);
        self.connection.store(Some(Arc::clone(&conn)));
        Ok(conn)
    }

    fn spawn_connection(&self, stream: TcpStream) -> Arc<Connection> {
        let (read_half, write_half) = stream.into_split();
        let (writer, frames) = mpsc::channel(WRITE_QUEUE_DEPTH);
        let conn = Arc::new(Connection {
            address: self.address.clone(),
            writer,
            pending: DashMap::new(),
            closed: self.stopped.child_token(),
        });

        tokio::spawn(write_loop(
            FramedWrite::new(write_half, FrameCodec::new()),
            frames,
            Arc::clone(&conn),
        ));
        tokio::spawn(read_loop(
            FramedRead::new(read_half, FrameCodec::new()),
            Arc::clone(&conn),
        ));
        conn
    }

    fn stopped_error(&self) -> RpcError {
        RpcError::unavailable(format!(
            "outbound to {} ({}) is stopped",
            self.config.service_name, self.address
        ))
    }
}

async fn write_loop(
    mut sink: FramedWrite<OwnedWriteHalf, FrameCodec>,
    mut frames: mpsc::Receiver<Frame>,
    conn: Arc<Connection>,
) {
    loop {
        let frame = tokio::select! {
            () = conn.closed.cancelled() => break,
            frame = frames.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };

        let id = frame.id();
        match sink.send(frame).await {
            Ok(()) => {}
            Err(FrameError::Io(e)) => {
                tracing::warn!(address = %conn.address, error = %e, "outbound write failed");
                break;
            }
            Err(e) => conn.settle(id, Err(RpcError::invalid_argument(e.to_string()))),
        }
    }
    conn.closed.cancel();
}

async fn read_loop(mut stream: FramedRead<OwnedReadHalf, FrameCodec>, conn: Arc<Connection>) {
    let reason = loop {
        let item = tokio::select! {
            () = conn.closed.cancelled() => break format!("connection to {} closed", conn.address),
            item = stream.next() => item,
        };

        match item {
            Some(Ok(Frame::Reply { id, result })) => conn.settle(id, result),
            Some(Ok(frame)) => tracing::warn!(
                address = %conn.address,
                id = frame.id(),
                "unexpected frame on outbound connection"
            ),
            Some(Err(e)) => break format!("connection to {} failed: {e}", conn.address),
            None => break format!("connection to {} lost", conn.address),
        }
    };

    conn.closed.cancel();
    conn.fail_pending(&reason);
    tracing::info!(address = %conn.address, reason = %reason, "outbound connection closed");
}

#[async_trait]
impl UnaryOutbound for FramedOutbound {
    async fn call(&self, ctx: &CallContext, request: Request) -> Result<Response, RpcError> {
        if self.stopped.is_cancelled() {
            return Err(self.stopped_error());
        }
        let ttl = ctx.remaining().unwrap_or(self.config.call_timeout);
        if ttl.is_zero() {
            return Err(RpcError::deadline_exceeded());
        }

        let conn = self.connection().await?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply, replied) = oneshot::channel();
        conn.pending.insert(id, reply);
        let _pending = PendingCall {
            id,
            conn: Arc::clone(&conn),
        };
        if !conn.is_open() {
            return Err(RpcError::unavailable(format!("connection to {} closed", self.address)));
        }

        let frame = Frame::Call(CallFrame {
            id,
            ttl_ms: duration_to_u64_ms(ttl).max(1),
            caller: request.caller,
            service: request.service,
            procedure: request.procedure,
            headers: request.headers,
            payload: request.payload,
        });
        conn.writer
            .send(frame)
            .await
            .map_err(|_| RpcError::unavailable(format!("connection to {} closed", self.address)))?;

        match tokio::time::timeout(ttl, replied).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(RpcError::unavailable(format!(
                "connection to {} lost",
                self.address
            ))),
            Err(_) => Err(RpcError::deadline_exceeded()),
        }
    }

    async fn stop(&self) {
        self.stopped.cancel();
        self.connection.store(None);
        tracing::info!(
            service = %self.config.service_name,
            address = %self.address,
            "framed outbound stopped"
        );
    }
}

impl fmt::Debug for FramedOutbound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FramedOutbound")
            .field("address", &self.address)
            .field("service", &self.config.service_name)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}
