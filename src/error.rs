//! Per-connection error taxonomy.
//!
//! All of these are local to one connection's pair of loops. They never
//! propagate past teardown: other connections only observe the membership
//! change in the hub.

use thiserror::Error;

/// Why a connection's loops exited.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Peer closed the stream cleanly (Close frame or clean EOF), or the
    /// server itself initiated the close. Not reported as an error.
    #[error("connection closed gracefully")]
    ClosedGracefully,

    /// Transport failed mid-stream (reset, protocol error, unexpected EOF).
    #[error("connection closed abnormally: {source}")]
    ClosedAbnormally {
        /// Underlying transport error.
        source: axum::Error,
    },

    /// Writing a frame to the peer failed. The in-flight frame is dropped,
    /// never retried.
    #[error("write failed: {source}")]
    WriteFailed {
        /// Underlying transport error.
        source: axum::Error,
    },

    /// No inbound activity or probe ack before the idle deadline.
    #[error("liveness deadline lapsed")]
    LivenessTimeout,
}

impl ConnectionError {
    /// Graceful closes are expected and logged at info, everything else at
    /// warn. Cleanup is identical either way.
    pub fn is_graceful(&self) -> bool {
        matches!(self, Self::ClosedGracefully)
    }

    /// Short label for logs and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::ClosedGracefully => "graceful",
            Self::ClosedAbnormally { .. } => "abnormal",
            Self::WriteFailed { .. } => "write_failed",
            Self::LivenessTimeout => "liveness_timeout",
        }
    }
}
