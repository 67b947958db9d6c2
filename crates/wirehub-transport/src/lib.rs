//! Transport abstraction layer for wirehub.
//!
//! Provides the [`Transport`] and [`Socket`] traits that the hub core
//! consumes. The core never sees the handshake or upgrade; it only gets an
//! accepted [`Socket`] that can send, receive, and be closed from any task.
//!
//! [`MemorySocket`] is an in-process implementation for tests and
//! embedding.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

mod error;
mod memory;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use memory::{MemoryPeer, MemorySocket};
#[cfg(feature = "websocket")]
pub use websocket::{PendingWebSocket, WebSocketSocket, WebSocketTransport};

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for generating unique connection IDs across all transports.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_connection_id() -> ConnectionId {
    ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
}

/// Opaque identifier for an accepted socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming sockets.
pub trait Transport: Send + 'static {
    /// The socket type produced by this transport.
    type Socket: Socket;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Waits for and accepts the next incoming socket.
    fn accept(
        &mut self,
    ) -> impl Future<Output = Result<Self::Socket, Self::Error>> + Send;
}

/// A single accepted socket that can send and receive frames.
///
/// A socket is shared between two pumps (one reading, one writing) and
/// may be closed from a third task (the heartbeat sweep), so every method
/// takes `&self`. Implementations must make [`close`](Self::close)
/// idempotent and must fail a pending [`recv`](Self::recv) or
/// [`send`](Self::send) promptly, even when the peer has stopped reading.
pub trait Socket: Send + Sync + 'static {
    /// The error type for socket operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Sends one frame to the remote peer.
    fn send(
        &self,
        data: &[u8],
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Receives the next frame from the remote peer.
    ///
    /// Returns `Ok(None)` when the peer closed the socket cleanly.
    fn recv(
        &self,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, Self::Error>> + Send;

    /// Closes the socket.
    fn close(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Returns the unique identifier for this socket.
    fn id(&self) -> ConnectionId;

    /// Returns the remote peer address, e.g. `"10.0.0.7:53412"`.
    fn remote_addr(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new(7);
        assert_eq!(id.to_string(), "conn-7");
    }

    #[test]
    fn test_connection_id_works_as_map_key() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(ConnectionId::new(1), "10.0.0.1:4000");
        map.insert(ConnectionId::new(2), "10.0.0.2:4000");
        assert_eq!(map[&ConnectionId::new(1)], "10.0.0.1:4000");
        assert_ne!(ConnectionId::new(1), ConnectionId::new(2));
    }
}
