//! Event system for pushing live project changes to streaming clients.
//!
//! The bus provides:
//! - Publish-subscribe fan-out with a bounded queue per subscriber
//! - A drop-slow-subscriber policy so publishers never block
//! - SSE-framed streaming sessions with heartbeats and leak-free cleanup
//!
//! # Architecture
//!
//! Events flow from mutations → ChangeNotifier → `EventBus` → one
//! `StreamSession` per connected client:
//! - `EventBus`: in-memory subscriber registry, serialize-once delivery
//! - `StreamSession`: long-lived writer that drains one subscription and
//!   interleaves heartbeats; unsubscribes on every exit path

mod event_bus;
mod stream;

#[cfg(test)]
mod tests;

pub use event_bus::{EventBus, Subscription, BUS_CAPACITY};
pub use stream::{sse_frame, StreamSession, HEARTBEAT_INTERVAL, POLL_INTERVAL};
