//! Outbound middleware.
//!
//! Units are composed in registration order around a terminal outbound: the
//! first registered unit sees the call first on the way out and last on the
//! way back. An empty chain is a direct passthrough to the transport.
//!
//! ## Available units
//!
//! - [`TimingMiddleware`] - emits one `method=<name> elapsed_ms=<n>` record per call

mod chain;
mod timing;

pub use chain::{ChainedOutbound, MiddlewareChain, Next, UnaryOutboundMiddleware};
pub use timing::{LogTimingRecorder, TimingMiddleware, TimingRecord, TimingRecorder};
