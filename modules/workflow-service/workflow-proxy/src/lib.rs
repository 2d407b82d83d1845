#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

//! Transparent `WorkflowService` proxy.
//!
//! Accepts calls over HTTP and forwards each one, unchanged, to a Cadence
//! frontend over the framed TCP transport. [`ProxyHandler`] is the forwarding
//! handler; [`Proxy`] wires it into a dispatcher together with the inbound, the
//! outbound and the middleware chain.

mod config;
mod handler;
mod wiring;

pub use config::ProxyConfig;
pub use handler::ProxyHandler;
pub use wiring::{Proxy, build_dispatcher, middleware_chain, register_proxy};
