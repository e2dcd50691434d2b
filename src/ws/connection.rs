//! State for one accepted client connection.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use axum::extract::ws::Message;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A connected WebSocket client.
///
/// Holds the sending half of the connection's bounded outbound queue plus
/// the liveness flag the probe timer checks. The receiving half is owned
/// exclusively by the connection's write loop.
pub struct ClientConnection {
    /// Unique connection ID.
    pub id: String,
    /// Send channel into the connection's write loop.
    tx: mpsc::Sender<Message>,
    /// When this connection was established.
    pub connected_at: Instant,
    /// Whether any inbound activity arrived since the last probe tick.
    is_alive: AtomicBool,
    /// Count of frames dropped due to a full or closed queue.
    dropped_frames: AtomicU64,
    /// Cancelled exactly once when the hub removes this connection; both
    /// loops observe it and exit.
    closed: CancellationToken,
}

impl ClientConnection {
    /// Create a new connection around the sending half of its queue.
    pub fn new(id: String, tx: mpsc::Sender<Message>) -> Self {
        Self {
            id,
            tx,
            connected_at: Instant::now(),
            is_alive: AtomicBool::new(true),
            dropped_frames: AtomicU64::new(0),
            closed: CancellationToken::new(),
        }
    }

    /// Enqueue a frame for the write loop without blocking.
    ///
    /// Returns `false` if the queue is full or closed; the frame is dropped
    /// and the drop counter incremented.
    pub fn enqueue(&self, frame: Message) -> bool {
        if self.tx.try_send(frame).is_ok() {
            true
        } else {
            let _ = self.dropped_frames.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Total frames dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }

    /// Record inbound activity (data frame or pong), resetting the deadline.
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
    }

    /// Consume the alive flag for one probe tick.
    ///
    /// Returns `true` if any activity arrived since the previous tick.
    pub fn take_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Signal both loops to stop and the write loop to emit one Close frame.
    ///
    /// Safe to call more than once; only the first call has an effect.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Whether the connection has been signalled to close.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Token the loops select on to observe the close signal.
    pub fn close_token(&self) -> CancellationToken {
        self.closed.clone()
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
