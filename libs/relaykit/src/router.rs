//! Procedure routing on the inbound side.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::context::CallContext;
use crate::error::RpcError;
use crate::transport::{Request, Response, UnaryHandler};

/// A named handler, ready to be registered.
#[derive(Clone)]
pub struct Procedure {
    pub name: String,
    pub handler: Arc<dyn UnaryHandler>,
}

impl Procedure {
    #[must_use]
    pub fn new(name: impl Into<String>, handler: Arc<dyn UnaryHandler>) -> Self {
        Self {
            name: name.into(),
            handler,
        }
    }
}

impl fmt::Debug for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Procedure")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouterError {
    #[error("procedure '{0}' is already registered")]
    Duplicate(String),
}

/// Procedure name to handler table. Read-only once serving starts.
#[derive(Default, Clone)]
pub struct Router {
    handlers: HashMap<String, Arc<dyn UnaryHandler>>,
}

impl Router {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    /// Returns [`RouterError::Duplicate`] if the procedure name is taken.
    pub fn register(&mut self, procedure: Procedure) -> Result<(), RouterError> {
        if self.handlers.contains_key(&procedure.name) {
            return Err(RouterError::Duplicate(procedure.name));
        }
        tracing::debug!(procedure = %procedure.name, "registered procedure");
        self.handlers.insert(procedure.name, procedure.handler);
        Ok(())
    }

    /// # Errors
    /// Returns [`RouterError::Duplicate`] on the first name that is taken.
    pub fn register_all(
        &mut self,
        procedures: impl IntoIterator<Item = Procedure>,
    ) -> Result<(), RouterError> {
        procedures
            .into_iter()
            .try_for_each(|procedure| self.register(procedure))
    }

    #[must_use]
    pub fn contains(&self, procedure: &str) -> bool {
        self.handlers.contains_key(procedure)
    }

    /// Registered procedure names, sorted.
    #[must_use]
    pub fn procedures(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Deliver a call to the handler registered for its procedure.
    ///
    /// # Errors
    /// Returns `Unimplemented` for unknown procedures, otherwise the handler's result.
    pub async fn dispatch(&self, ctx: CallContext, request: Request) -> Result<Response, RpcError> {
        let Some(handler) = self.handlers.get(&request.procedure) else {
            return Err(RpcError::unimplemented(format!(
                "unrecognized procedure \"{}\" for service \"{}\"",
                request.procedure, request.service
            )));
        };
        handler.handle(ctx, request).await
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("procedures", &self.procedures())
            .finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::error::Code;
    use crate::payload::{Encoding, Payload};
    use crate::transport::handler_fn;

    fn echo() -> Arc<dyn UnaryHandler> {
        Arc::new(handler_fn(|_ctx, payload| async move { Ok(payload) }))
    }

    #[tokio::test]
    async fn dispatches_by_procedure_name() {
        let mut router = Router::new();
        router
            .register(Procedure::new("WorkflowService::DescribeDomain", echo()))
            .unwrap();

        let payload = Payload::new(Encoding::Json, r#"{"name":"samples"}"#);
        let request = Request::new("WorkflowService::DescribeDomain", payload.clone());
        let response = router
            .dispatch(CallContext::new("WorkflowService::DescribeDomain"), request)
            .await
            .unwrap();
        assert_eq!(response.payload, payload);
    }

    #[tokio::test]
    async fn unknown_procedure_is_unimplemented() {
        let router = Router::new();
        let request = Request::new("WorkflowService::Nope", Payload::default())
            .with_service("cadence-frontend");
        let err = router
            .dispatch(CallContext::new("WorkflowService::Nope"), request)
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::Unimplemented);
        assert!(err.message().contains("WorkflowService::Nope"));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut router = Router::new();
        router.register(Procedure::new("A::b", echo())).unwrap();
        assert_eq!(
            router.register(Procedure::new("A::b", echo())),
            Err(RouterError::Duplicate("A::b".to_owned()))
        );
    }

    #[test]
    fn procedures_are_sorted() {
        let mut router = Router::new();
        router
            .register_all([
                Procedure::new("S::c", echo()),
                Procedure::new("S::a", echo()),
                Procedure::new("S::b", echo()),
            ])
            .unwrap();
        assert_eq!(router.procedures(), vec!["S::a", "S::b", "S::c"]);
        assert_eq!(router.len(), 3);
    }
}
