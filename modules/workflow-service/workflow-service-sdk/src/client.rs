//! Typed outbound client of the `WorkflowService`.

use async_trait::async_trait;
use relaykit::{CallContext, Client, ClientConfig, RpcError};

use crate::api::WorkflowService;

/// [`WorkflowService`] over a [`relaykit::Client`].
///
/// Every method is a call of [`Client::call`] with the procedure name; the
/// outbound bound in the [`ClientConfig`] already carries the middleware chain.
#[derive(Clone, Debug)]
pub struct WorkflowServiceClient {
    inner: Client,
}

impl WorkflowServiceClient {
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self {
            inner: Client::new(config),
        }
    }

    /// The untyped client every method funnels into.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.inner
    }
}

macro_rules! client_methods {
    ($(($method:ident, $name:literal, $req:ty, $resp:ty)),* $(,)?) => {
        #[async_trait]
        impl WorkflowService for WorkflowServiceClient {
            $(
                async fn $method(&self, ctx: &CallContext, request: $req) -> Result<$resp, RpcError> {
                    self.inner
                        .call(ctx, concat!("WorkflowService::", $name), request)
                        .await
                }
            )*
        }
    };
}

crate::for_each_workflow_procedure!(client_methods);
