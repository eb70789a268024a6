use std::io;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::{timeout, Instant};

use super::{EventBus, Subscription};

/// Minimum idle time before a heartbeat frame is emitted.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Granularity of the receive wait. Bounds how long a disconnect or
/// heartbeat check can be delayed.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Minimal SSE framing: one self-delimited text record per event.
pub fn sse_frame(data: &str) -> String {
    format!("data: {data}\n\n")
}

/// One long-lived streaming client.
///
/// Subscribes on open, emits a `hello` frame, then relays queued events as
/// they arrive, falling back to heartbeats after 15 idle seconds. The
/// subscription is owned by the session, so cleanup happens exactly once on
/// every exit path — normal end, downstream write failure, or the session
/// future being dropped on client disconnect.
pub struct StreamSession<W> {
    subscription: Subscription,
    downstream: W,
}

impl<W: AsyncWrite + Unpin> StreamSession<W> {
    pub fn open(bus: &Arc<EventBus>, downstream: W) -> Self {
        Self {
            subscription: bus.subscribe(),
            downstream,
        }
    }

    /// Run the session until the downstream writer fails or the bus goes
    /// away. A write error terminates the session; there are no retries.
    pub async fn run(mut self) -> io::Result<()> {
        let hello = json!({ "type": "hello", "ts": Utc::now().to_rfc3339() });
        self.emit(&hello.to_string()).await?;
        let mut last_emit = Instant::now();

        loop {
            let received = timeout(POLL_INTERVAL, self.subscription.recv()).await;
            match received {
                Ok(Some(payload)) => {
                    self.emit(&payload).await?;
                    last_emit = Instant::now();
                }
                // Bus gone; nothing more will arrive.
                Ok(None) => return Ok(()),
                // Poll timeout. Heartbeat if the line has been quiet.
                Err(_) => {
                    if last_emit.elapsed() >= HEARTBEAT_INTERVAL {
                        self.emit(&json!({ "type": "heartbeat" }).to_string()).await?;
                        last_emit = Instant::now();
                    }
                }
            }
        }
    }

    async fn emit(&mut self, payload: &str) -> io::Result<()> {
        self.downstream
            .write_all(sse_frame(payload).as_bytes())
            .await?;
        self.downstream.flush().await
    }
}
