//! Wiring of inbounds, outbounds, middleware and procedures, plus lifecycle.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::client::ClientConfig;
use crate::middleware::MiddlewareChain;
use crate::router::{Procedure, Router, RouterError};
use crate::transport::{Inbound, TransportError, UnaryOutbound};

#[derive(Error, Debug)]
pub enum DispatcherError {
    #[error("no outbound configured for service '{0}'")]
    UnknownOutbound(String),

    #[error("dispatcher '{0}' is already started")]
    AlreadyStarted(String),

    #[error(transparent)]
    Router(#[from] RouterError),

    #[error("failed to start inbound '{inbound}': {source}")]
    Inbound {
        inbound: String,
        #[source]
        source: TransportError,
    },
}

/// Resolved dispatcher settings. Nothing here is read from the environment.
pub struct DispatcherConfig {
    /// Name of this process, used as the caller of outbound requests.
    pub name: String,
    pub inbounds: Vec<Arc<dyn Inbound>>,
    /// Outbound per destination service name.
    pub outbounds: HashMap<String, Arc<dyn UnaryOutbound>>,
    /// Applied to every outbound.
    pub outbound_middleware: MiddlewareChain,
}

impl DispatcherConfig {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inbounds: Vec::new(),
            outbounds: HashMap::new(),
            outbound_middleware: MiddlewareChain::new(),
        }
    }

    #[must_use]
    pub fn with_inbound(mut self, inbound: Arc<dyn Inbound>) -> Self {
        self.inbounds.push(inbound);
        self
    }

    #[must_use]
    pub fn with_outbound(
        mut self,
        service: impl Into<String>,
        outbound: Arc<dyn UnaryOutbound>,
    ) -> Self {
        self.outbounds.insert(service.into(), outbound);
        self
    }

    #[must_use]
    pub fn with_outbound_middleware(mut self, chain: MiddlewareChain) -> Self {
        self.outbound_middleware = chain;
        self
    }
}

pub struct Dispatcher {
    name: String,
    inbounds: Vec<Arc<dyn Inbound>>,
    outbounds: HashMap<String, Arc<dyn UnaryOutbound>>,
    /// Shared with the inbounds once started. Registration copies on write.
    router: Arc<Router>,
    started: bool,
}

impl Dispatcher {
    /// Build the dispatcher. No I/O happens until [`Dispatcher::start`].
    #[must_use]
    pub fn new(config: DispatcherConfig) -> Self {
        let chain = config.outbound_middleware;
        let outbounds = config
            .outbounds
            .into_iter()
            .map(|(service, outbound)| {
                let chained: Arc<dyn UnaryOutbound> = Arc::new(chain.clone().wrap(outbound));
                (service, chained)
            })
            .collect();

        Self {
            name: config.name,
            inbounds: config.inbounds,
            outbounds,
            router: Arc::new(Router::new()),
            started: false,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Client configuration bound to the outbound registered for `service`.
    ///
    /// # Errors
    /// Returns [`DispatcherError::UnknownOutbound`] if no outbound serves `service`.
    pub fn client_config(&self, service: &str) -> Result<ClientConfig, DispatcherError> {
        let outbound = self
            .outbounds
            .get(service)
            .ok_or_else(|| DispatcherError::UnknownOutbound(service.to_owned()))?;
        Ok(ClientConfig::new(
            self.name.as_str(),
            service,
            Arc::clone(outbound),
        ))
    }

    /// Register procedures served by the inbounds.
    ///
    /// # Errors
    /// Fails after [`Dispatcher::start`] or when a procedure name is taken.
    pub fn register(
        &mut self,
        procedures: impl IntoIterator<Item = Procedure>,
    ) -> Result<(), DispatcherError> {
        if self.started {
            return Err(DispatcherError::AlreadyStarted(self.name.clone()));
        }
        // An inbound that failed to start may still hold the previous table.
        Arc::make_mut(&mut self.router).register_all(procedures)?;
        Ok(())
    }

    /// Registered procedure names, sorted.
    #[must_use]
    pub fn procedures(&self) -> Vec<&str> {
        self.router.procedures()
    }

    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Start every inbound. If one fails, the ones already started are stopped
    /// and the dispatcher does not serve.
    ///
    /// # Errors
    /// Returns the first inbound failure, or [`DispatcherError::AlreadyStarted`].
    pub async fn start(&mut self) -> Result<(), DispatcherError> {
        if self.started {
            return Err(DispatcherError::AlreadyStarted(self.name.clone()));
        }

        for (index, inbound) in self.inbounds.iter().enumerate() {
            if let Err(source) = inbound.start(Arc::clone(&self.router)).await {
                tracing::error!(
                    dispatcher = %self.name,
                    inbound = inbound.name(),
                    error = %source,
                    "inbound failed to start"
                );
                for started in &self.inbounds[..index] {
                    started.stop().await;
                }
                let inbound = inbound.name().to_owned();
                return Err(DispatcherError::Inbound { inbound, source });
            }
        }

        tracing::info!(
            dispatcher = %self.name,
            inbounds = self.inbounds.len(),
            outbounds = self.outbounds.len(),
            procedures = self.router.len(),
            "dispatcher started"
        );
        self.started = true;
        Ok(())
    }

    /// Stop inbounds first so no new calls arrive, then release outbounds.
    pub async fn stop(&mut self) {
        for inbound in &self.inbounds {
            inbound.stop().await;
        }
        for outbound in self.outbounds.values() {
            outbound.stop().await;
        }
        tracing::info!(dispatcher = %self.name, "dispatcher stopped");
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("name", &self.name)
            .field("inbounds", &self.inbounds.len())
            .field("outbounds", &self.outbounds.keys().collect::<Vec<_>>())
            .field("started", &self.is_started())
            .finish()
    }
}
