//! Inbound wiring: serve a [`WorkflowService`] implementation under its procedure names.

use std::sync::Arc;

use relaykit::{CallContext, Message, Payload, Procedure, Router, RouterError, RpcError, handler_fn};

use crate::api::WorkflowService;

macro_rules! service_procedures {
    ($(($method:ident, $name:literal, $req:ty, $resp:ty)),* $(,)?) => {
        /// One [`Procedure`] per contract method, each wrapping the request payload,
        /// calling the matching method of `service` and returning its reply payload
        /// unchanged.
        #[must_use]
        pub fn procedures(service: &Arc<dyn WorkflowService>) -> Vec<Procedure> {
            vec![
                $(
                    Procedure::new(concat!("WorkflowService::", $name), {
                        let service = Arc::clone(service);
                        Arc::new(handler_fn(move |ctx: CallContext, payload: Payload| {
                            let service = Arc::clone(&service);
                            async move {
                                let request = <$req as Message>::from_payload(payload)?;
                                let reply = service.$method(&ctx, request).await?;
                                Ok::<_, RpcError>(Message::into_payload(reply))
                            }
                        }))
                    }),
                )*
            ]
        }
    };
}

crate::for_each_workflow_procedure!(service_procedures);

/// Register every procedure of `service` on `router`.
///
/// # Errors
/// Returns [`RouterError::Duplicate`] if one of the names is already registered.
pub fn register_workflow_service(
    router: &mut Router,
    service: &Arc<dyn WorkflowService>,
) -> Result<(), RouterError> {
    router.register_all(procedures(service))?;
    tracing::debug!(procedures = router.len(), "WorkflowService procedures registered");
    Ok(())
}
