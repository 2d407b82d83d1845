use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::CallContext;
use crate::error::RpcError;
use crate::transport::{Request, Response, UnaryOutbound};

/// One interception point around an outbound call.
///
/// A unit either calls `next.run(..)` once and returns its result, or
/// short-circuits by returning its own result without calling it.
#[async_trait]
pub trait UnaryOutboundMiddleware: Send + Sync {
    /// # Errors
    /// Returns the downstream error unchanged, or the unit's own rejection.
    async fn call(
        &self,
        ctx: &CallContext,
        request: Request,
        next: Next<'_>,
    ) -> Result<Response, RpcError>;
}

/// The rest of the chain, as seen by one unit.
///
/// Consumed by [`Next::run`], so a unit cannot invoke the next stage twice.
pub struct Next<'a> {
    remaining: &'a [Arc<dyn UnaryOutboundMiddleware>],
    terminal: &'a dyn UnaryOutbound,
}

impl<'a> Next<'a> {
    fn new(
        remaining: &'a [Arc<dyn UnaryOutboundMiddleware>],
        terminal: &'a dyn UnaryOutbound,
    ) -> Self {
        Self {
            remaining,
            terminal,
        }
    }

    /// Invoke the next unit, or the transport once the units are exhausted.
    ///
    /// The transport call is bounded by the context's deadline and cancellation.
    ///
    /// # Errors
    /// Returns whatever the downstream stage returned.
    pub async fn run(self, ctx: &CallContext, request: Request) -> Result<Response, RpcError> {
        match self.remaining.split_first() {
            Some((unit, rest)) => unit.call(ctx, request, Next::new(rest, self.terminal)).await,
            None => ctx.run(self.terminal.call(ctx, request)).await,
        }
    }
}

/// Ordered list of middleware units. The first registered unit is the outermost.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    units: Vec<Arc<dyn UnaryOutboundMiddleware>>,
}

impl MiddlewareChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a unit inside the ones already registered.
    #[must_use]
    pub fn with(mut self, unit: impl UnaryOutboundMiddleware + 'static) -> Self {
        self.units.push(Arc::new(unit));
        self
    }

    pub fn push(&mut self, unit: Arc<dyn UnaryOutboundMiddleware>) {
        self.units.push(unit);
    }

    /// Concatenate `inner` inside this chain.
    #[must_use]
    pub fn append(mut self, inner: MiddlewareChain) -> Self {
        self.units.extend(inner.units);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Wrap `terminal` in this chain.
    #[must_use]
    pub fn wrap(self, terminal: Arc<dyn UnaryOutbound>) -> ChainedOutbound {
        ChainedOutbound {
            units: self.units.into(),
            terminal,
        }
    }
}

impl fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareChain")
            .field("units", &self.units.len())
            .finish()
    }
}

/// An outbound with a middleware chain applied in front of it.
///
/// Immutable once built and shared by every concurrent call.
#[derive(Clone)]
pub struct ChainedOutbound {
    units: Arc<[Arc<dyn UnaryOutboundMiddleware>]>,
    terminal: Arc<dyn UnaryOutbound>,
}

#[async_trait]
impl UnaryOutbound for ChainedOutbound {
    async fn call(&self, ctx: &CallContext, request: Request) -> Result<Response, RpcError> {
        Next::new(&self.units, self.terminal.as_ref())
            .run(ctx, request)
            .await
    }

    async fn stop(&self) {
        self.terminal.stop().await;
    }
}

impl fmt::Debug for ChainedOutbound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainedOutbound")
            .field("units", &self.units.len())
            .finish_non_exhaustive()
    }
}
