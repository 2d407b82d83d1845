//! Outbound client facade primitive.
//!
//! Typed service clients are thin wrappers over [`Client::call`]; every typed
//! operation funnels into the single [`Client::invoke`] primitive.

use std::fmt;
use std::sync::Arc;

use crate::context::CallContext;
use crate::error::RpcError;
use crate::payload::{Message, Payload};
use crate::transport::{Request, UnaryOutbound};

/// Everything a client needs to reach one named destination.
///
/// Produced by the dispatcher; the outbound already carries the middleware chain.
#[derive(Clone)]
pub struct ClientConfig {
    caller: Arc<str>,
    service: Arc<str>,
    outbound: Arc<dyn UnaryOutbound>,
}

impl ClientConfig {
    #[must_use]
    pub fn new(
        caller: impl Into<Arc<str>>,
        service: impl Into<Arc<str>>,
        outbound: Arc<dyn UnaryOutbound>,
    ) -> Self {
        Self {
            caller: caller.into(),
            service: service.into(),
            outbound,
        }
    }

    #[must_use]
    pub fn caller(&self) -> &str {
        &self.caller
    }

    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    #[must_use]
    pub fn outbound(&self) -> &Arc<dyn UnaryOutbound> {
        &self.outbound
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("caller", &self.caller)
            .field("service", &self.service)
            .finish_non_exhaustive()
    }
}

/// Handle bound to one destination for its whole lifetime.
#[derive(Clone, Debug)]
pub struct Client {
    config: ClientConfig,
}

impl Client {
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Invoke `procedure` on the bound destination with an encoded payload.
    ///
    /// The context's headers are forwarded with the request.
    ///
    /// # Errors
    /// Returns the error produced by the middleware chain or the transport, unchanged.
    pub async fn invoke(
        &self,
        ctx: &CallContext,
        procedure: &str,
        payload: Payload,
    ) -> Result<Payload, RpcError> {
        let request = Request::new(procedure, payload)
            .with_caller(self.config.caller())
            .with_service(self.config.service())
            .with_headers(ctx.headers().clone());

        let response = self.config.outbound.call(ctx, request).await?;
        Ok(response.payload)
    }

    /// Typed variant of [`Client::invoke`].
    ///
    /// # Errors
    /// Returns the error produced by the middleware chain or the transport, unchanged.
    pub async fn call<Req, Resp>(
        &self,
        ctx: &CallContext,
        procedure: &str,
        request: Req,
    ) -> Result<Resp, RpcError>
    where
        Req: Message,
        Resp: Message,
    {
        let payload = self.invoke(ctx, procedure, request.into_payload()).await?;
        Resp::from_payload(payload)
    }
}
