//! Real-time progress channel
//!
//! One WebSocket connection per session, addressed by the session identity:
//! - Connection establishment bounded by a fixed budget
//! - Periodic `{"type":"ping"}` keepalive while open
//! - Decoding of `connected` / `progress` / `pong` messages
//! - Intentional closure with a "work complete" reason

pub mod client;
pub mod messages;

pub use client::{ChannelState, ProgressChannel};
pub use messages::{ChannelEvent, ClientMessage};
