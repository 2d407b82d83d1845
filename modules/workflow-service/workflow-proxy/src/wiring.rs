//! Proxy assembly: HTTP inbound, framed outbound to Cadence, middleware and procedures.

use std::net::SocketAddr;
use std::sync::Arc;

use relaykit::{
    Dispatcher, DispatcherConfig, DispatcherError, Inbound, MiddlewareChain, TimingMiddleware,
};
use relaykit_transport::{FramedOutbound, HttpInbound};
use workflow_service_sdk::{WorkflowService, procedures};

use crate::config::ProxyConfig;
use crate::handler::ProxyHandler;

/// Outbound middleware for the given settings: the timing unit when enabled,
/// otherwise an empty chain.
#[must_use]
pub fn middleware_chain(timing: bool) -> MiddlewareChain {
    let chain = MiddlewareChain::new();
    if timing {
        chain.with(TimingMiddleware::new())
    } else {
        chain
    }
}

/// Serve every `WorkflowService` procedure through a [`ProxyHandler`] bound to
/// the outbound of `service`.
///
/// # Errors
/// Fails when `service` has no outbound, the dispatcher is started, or a
/// procedure is already registered.
pub fn register_proxy(dispatcher: &mut Dispatcher, service: &str) -> Result<(), DispatcherError> {
    let handler: Arc<dyn WorkflowService> =
        Arc::new(ProxyHandler::new(dispatcher.client_config(service)?));
    dispatcher.register(procedures(&handler))
}

/// A wired proxy, ready to start.
#[derive(Debug)]
pub struct Proxy {
    dispatcher: Dispatcher,
    http: Arc<HttpInbound>,
}

impl Proxy {
    /// Build the dispatcher and register the forwarding handler. No I/O happens
    /// until [`Proxy::start`]; the Cadence connection is opened on the first call.
    ///
    /// # Errors
    /// Returns [`DispatcherError`] if procedure registration fails.
    pub fn new(config: &ProxyConfig) -> Result<Self, DispatcherError> {
        let http = Arc::new(HttpInbound::new(config.bind_address.as_str()));
        let inbound: Arc<dyn Inbound> = http.clone();
        let outbound = Arc::new(FramedOutbound::new(
            config.cadence_address.as_str(),
            config.outbound.clone(),
        ));

        let dispatcher_config = DispatcherConfig::new(config.name.as_str())
            .with_inbound(inbound)
            .with_outbound(config.service.as_str(), outbound)
            .with_outbound_middleware(middleware_chain(config.timing));

        let mut dispatcher = Dispatcher::new(dispatcher_config);
        register_proxy(&mut dispatcher, &config.service)?;

        tracing::debug!(
            bind = %config.bind_address,
            cadence = %config.cadence_address,
            timing = config.timing,
            procedures = dispatcher.procedures().len(),
            "proxy wired"
        );
        Ok(Self { dispatcher, http })
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Address the HTTP inbound is bound to, once started.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.http.local_addr()
    }

    /// Bind the inbound and begin serving.
    ///
    /// # Errors
    /// Returns [`DispatcherError`] if the inbound cannot bind or the proxy already runs.
    pub async fn start(&mut self) -> Result<(), DispatcherError> {
        self.dispatcher.start().await
    }

    pub async fn stop(&mut self) {
        self.dispatcher.stop().await;
    }

    #[must_use]
    pub fn into_dispatcher(self) -> Dispatcher {
        self.dispatcher
    }
}

/// Wire the proxy described by `config` and return its dispatcher.
///
/// # Errors
/// Returns [`DispatcherError`] if procedure registration fails.
pub fn build_dispatcher(config: &ProxyConfig) -> Result<Dispatcher, DispatcherError> {
    Proxy::new(config).map(Proxy::into_dispatcher)
}
