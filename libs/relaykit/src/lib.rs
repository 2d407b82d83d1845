#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

//! Transport-agnostic RPC forwarding core.
//!
//! The crate provides the pieces a forwarding proxy is assembled from:
//! - [`CallContext`] - per-call metadata, deadline and cancellation
//! - [`Payload`] / [`Message`] - opaque bodies and the typed messages that carry them
//! - [`middleware`] - ordered outbound interception around a terminal transport
//! - [`Client`] / [`ClientConfig`] - outbound facade bound to one destination
//! - [`Router`] / [`Dispatcher`] - inbound procedure table and process lifecycle
//!
//! # Example
//!
//! ```ignore
//! use relaykit::{Dispatcher, DispatcherConfig, MiddlewareChain, TimingMiddleware};
//!
//! let config = DispatcherConfig::new("cadence-proxy")
//!     .with_inbound(http_inbound)
//!     .with_outbound("cadence-frontend", framed_outbound)
//!     .with_outbound_middleware(MiddlewareChain::new().with(TimingMiddleware::new()));
//!
//! let mut dispatcher = Dispatcher::new(config);
//! let client_config = dispatcher.client_config("cadence-frontend")?;
//! let handler: Arc<dyn WorkflowService> = Arc::new(ProxyHandler::new(client_config));
//! dispatcher.register(procedures(&handler))?;
//! dispatcher.start().await?;
//! ```

pub mod client;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod middleware;
pub mod payload;
pub mod procedure;
pub mod router;
pub mod transport;

pub use client::{Client, ClientConfig};
pub use context::CallContext;
pub use dispatcher::{Dispatcher, DispatcherConfig, DispatcherError};
pub use error::{Code, RpcError};
pub use middleware::{
    ChainedOutbound, LogTimingRecorder, MiddlewareChain, Next, TimingMiddleware, TimingRecord,
    TimingRecorder, UnaryOutboundMiddleware,
};
pub use payload::{Encoding, Message, Payload};
pub use procedure::{ProcedureSpec, method_name};
pub use router::{Procedure, Router, RouterError};
pub use transport::{
    FnHandler, Headers, Inbound, Request, Response, TransportError, UnaryHandler, UnaryOutbound,
    handler_fn,
};
