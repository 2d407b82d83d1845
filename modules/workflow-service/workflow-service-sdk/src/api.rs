//! API trait of the `WorkflowService`.

use async_trait::async_trait;
use relaykit::{CallContext, RpcError};

macro_rules! workflow_service_trait {
    ($(($method:ident, $name:literal, $req:ty, $resp:ty)),* $(,)?) => {
        /// Cadence `WorkflowService` API.
        ///
        /// Implemented by [`WorkflowServiceClient`](crate::WorkflowServiceClient) for
        /// outbound calls and by anything served through
        /// [`procedures`](crate::procedures) on the inbound side. Every method takes
        /// the call context by reference so deadline and cancellation reach the
        /// transport.
        #[async_trait]
        pub trait WorkflowService: Send + Sync {
            $(
                #[doc = concat!("`WorkflowService::", $name, "`.")]
                ///
                /// # Errors
                /// Returns the error reported by the service or the transport.
                async fn $method(&self, ctx: &CallContext, request: $req) -> Result<$resp, RpcError>;
            )*
        }
    };
}

crate::for_each_workflow_procedure!(workflow_service_trait);
