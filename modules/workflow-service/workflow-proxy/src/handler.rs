//! The forwarding handler.

use async_trait::async_trait;
use relaykit::{CallContext, ClientConfig, RpcError};
use workflow_service_sdk::{WorkflowService, WorkflowServiceClient};

/// Serves every `WorkflowService` procedure by making the same call on the
/// backing frontend.
///
/// Requests, responses and errors pass through unchanged; the handler holds no
/// per-call state and is shared by all inbound calls.
#[derive(Clone, Debug)]
pub struct ProxyHandler {
    client: WorkflowServiceClient,
}

impl ProxyHandler {
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self {
            client: WorkflowServiceClient::new(config),
        }
    }

    #[must_use]
    pub fn client(&self) -> &WorkflowServiceClient {
        &self.client
    }
}

macro_rules! forward {
    ($(($method:ident, $name:literal, $req:ty, $resp:ty)),* $(,)?) => {
        #[async_trait]
        impl WorkflowService for ProxyHandler {
            $(
                async fn $method(&self, ctx: &CallContext, request: $req) -> Result<$resp, RpcError> {
                    self.client.$method(ctx, request).await
                }
            )*
        }
    };
}

workflow_service_sdk::for_each_workflow_procedure!(forward);
