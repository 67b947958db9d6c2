//! Error types for the session layer.

use wirehub_transport::ConnectionId;

/// Errors that can occur on a single connection's session or while
/// talking to the presence store.
///
/// None of these ever cross a pump or the manager actor: callers log them
/// and carry on.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The outbound queue has been closed; the connection is tearing down.
    #[error("outbound queue of {0} is closed")]
    QueueClosed(ConnectionId),

    /// The outbound queue is at capacity; the consumer is too slow.
    #[error("outbound queue of {0} is full")]
    QueueFull(ConnectionId),

    /// The presence store has no record under this key.
    #[error("no presence record for {0}")]
    PresenceNotFound(String),

    /// The presence store failed for another reason.
    #[error("presence store failure: {0}")]
    Presence(String),
}
