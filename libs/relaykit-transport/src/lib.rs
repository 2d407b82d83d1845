#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

//! Concrete relaykit transports.
//!
//! - [`HttpInbound`] accepts YARPC-style HTTP calls.
//! - [`FramedOutbound`] and [`FramedInbound`] speak a multiplexed, length-prefixed
//!   binary protocol over TCP.
//! - [`OutboundConfig`] holds connection settings for outbounds.

pub mod client;
pub mod framed;
pub mod http_inbound;

pub use client::{OutboundConfig, connect_with_retry, connect_with_stack};
pub use framed::{FramedInbound, FramedOutbound};
pub use http_inbound::{HttpInbound, http_router, http_status};
