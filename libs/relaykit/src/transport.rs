//! Transport-facing abstractions.
//!
//! Concrete transports live in `relaykit-transport`; the core only needs an
//! outbound that turns a [`Request`] into a [`Response`] and an inbound that
//! feeds calls into a [`Router`](crate::Router).

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::context::CallContext;
use crate::error::RpcError;
use crate::payload::Payload;
use crate::router::Router;

/// Application headers. Keys are lowercase.
pub type Headers = BTreeMap<String, String>;

/// An outbound call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub caller: String,
    pub service: String,
    pub procedure: String,
    pub headers: Headers,
    pub payload: Payload,
}

impl Request {
    #[must_use]
    pub fn new(procedure: impl Into<String>, payload: Payload) -> Self {
        Self {
            caller: String::new(),
            service: String::new(),
            procedure: procedure.into(),
            headers: Headers::new(),
            payload,
        }
    }

    #[must_use]
    pub fn with_caller(mut self, caller: impl Into<String>) -> Self {
        self.caller = caller.into();
        self
    }

    #[must_use]
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }

    #[must_use]
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Response {
    pub headers: Headers,
    pub payload: Payload,
}

impl Response {
    #[must_use]
    pub fn new(payload: Payload) -> Self {
        Self {
            headers: Headers::new(),
            payload,
        }
    }
}

/// Sends a unary request to one destination.
#[async_trait]
pub trait UnaryOutbound: Send + Sync {
    /// # Errors
    /// Returns transport failures and errors reported by the remote service unchanged.
    async fn call(&self, ctx: &CallContext, request: Request) -> Result<Response, RpcError>;

    /// Release transport resources. Called once by the dispatcher on shutdown.
    async fn stop(&self) {}
}

#[async_trait]
impl<T: UnaryOutbound + ?Sized> UnaryOutbound for Arc<T> {
    async fn call(&self, ctx: &CallContext, request: Request) -> Result<Response, RpcError> {
        (**self).call(ctx, request).await
    }

    async fn stop(&self) {
        (**self).stop().await;
    }
}

/// Serves one procedure on the inbound side.
#[async_trait]
pub trait UnaryHandler: Send + Sync {
    /// # Errors
    /// Returns whatever error the implementation produced for this call.
    async fn handle(&self, ctx: CallContext, request: Request) -> Result<Response, RpcError>;
}

/// Adapter returned by [`handler_fn`].
pub struct FnHandler<F> {
    f: F,
}

/// Build a [`UnaryHandler`] from an async closure over the request payload.
#[must_use]
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(CallContext, Payload) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Payload, RpcError>> + Send,
{
    FnHandler { f }
}

#[async_trait]
impl<F, Fut> UnaryHandler for FnHandler<F>
where
    F: Fn(CallContext, Payload) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Payload, RpcError>> + Send,
{
    async fn handle(&self, ctx: CallContext, request: Request) -> Result<Response, RpcError> {
        (self.f)(ctx, request.payload).await.map(Response::new)
    }
}

/// Errors raised while starting or running a transport.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("transport '{0}' is already started")]
    AlreadyStarted(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Accepts calls from the network and hands them to a [`Router`].
#[async_trait]
pub trait Inbound: Send + Sync {
    fn name(&self) -> &str;

    /// Bind and begin serving. Returns once the transport is accepting calls.
    ///
    /// # Errors
    /// Returns an error when the transport cannot bind or is already started.
    async fn start(&self, router: Arc<Router>) -> Result<(), TransportError>;

    /// Stop accepting calls and wait for the serving task to finish.
    async fn stop(&self);
}
