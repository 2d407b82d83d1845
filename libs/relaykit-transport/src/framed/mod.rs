//! Multiplexed framed TCP transport.
//!
//! One connection carries many concurrent calls, each identified by a call id.
//! The outbound side sends `Call` and `Cancel` frames; the inbound side answers
//! every call it receives with exactly one `Reply` frame.

pub mod codec;
mod inbound;
mod outbound;

pub use codec::{CallFrame, Frame, FrameCodec, FrameError};
pub use inbound::FramedInbound;
pub use outbound::FramedOutbound;

/// Frames buffered per connection before writers wait.
const WRITE_QUEUE_DEPTH: usize = 1024;
