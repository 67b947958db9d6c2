//! The [`Connection`]: one accepted socket plus its session state.
//!
//! A connection is shared (`Arc`) between its two pumps, the registry, the
//! heartbeat sweep, and whoever is sending to it. Everything mutable sits
//! behind an atomic or a short-lived `parking_lot` lock so no caller ever
//! holds a lock across an `.await`.
//!
//! ```text
//!   accept ──→ Anonymous ──(authenticate)──→ Authenticated
//!                  │                               │
//!                  └──────(close_queue / expiry)───┴──→ Closing ──→ Gone
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc::{self, error::TrySendError};
use wirehub_protocol::{AppId, UserKey};
use wirehub_transport::{ConnectionId, Socket};

use crate::SessionError;

/// Seconds without a heartbeat after which a connection counts as dead.
pub const HEARTBEAT_EXPIRY_SECS: u64 = 6 * 60;

/// Who the connection belongs to. `user_id` stays empty until login.
#[derive(Debug, Default)]
struct Identity {
    app_id: AppId,
    user_id: String,
}

/// One accepted socket, its outbound queue, and its session metadata.
pub struct Connection<S: Socket> {
    id: ConnectionId,
    addr: String,
    socket: S,
    /// Sender half of the outbound queue. Taking it out closes the queue:
    /// the outbound pump drains what is buffered, then sees the end.
    outbound: Mutex<Option<mpsc::Sender<Vec<u8>>>>,
    identity: RwLock<Identity>,
    first_time: u64,
    heartbeat_time: AtomicU64,
    login_time: AtomicU64,
}

/// Receiving half of a connection's outbound queue, owned by the
/// outbound pump.
#[derive(Debug)]
pub struct OutboundQueue {
    receiver: mpsc::Receiver<Vec<u8>>,
}

impl OutboundQueue {
    /// Waits for the next payload. `None` means the queue was closed and
    /// everything buffered before the close has been handed out.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.receiver.recv().await
    }
}

impl<S: Socket> Connection<S> {
    /// Wraps an accepted socket. `first_time` doubles as the initial
    /// heartbeat so a connection that never logs in still expires.
    pub fn new(
        socket: S,
        first_time: u64,
        queue_capacity: usize,
    ) -> (Arc<Self>, OutboundQueue) {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let conn = Self {
            id: socket.id(),
            addr: socket.remote_addr().to_string(),
            socket,
            outbound: Mutex::new(Some(tx)),
            identity: RwLock::new(Identity::default()),
            first_time,
            heartbeat_time: AtomicU64::new(first_time),
            login_time: AtomicU64::new(0),
        };
        (Arc::new(conn), OutboundQueue { receiver: rx })
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Remote address of the peer. Used as the ownership check when an
    /// authenticated entry is removed.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn socket(&self) -> &S {
        &self.socket
    }

    pub fn app_id(&self) -> AppId {
        self.identity.read().app_id
    }

    pub fn user_id(&self) -> String {
        self.identity.read().user_id.clone()
    }

    /// The composite key this connection is (or would be) registered under.
    pub fn key(&self) -> UserKey {
        let identity = self.identity.read();
        UserKey::new(identity.app_id, &identity.user_id)
    }

    pub fn first_time(&self) -> u64 {
        self.first_time
    }

    pub fn heartbeat_time(&self) -> u64 {
        self.heartbeat_time.load(Ordering::Acquire)
    }

    /// Login time, or 0 if the connection never authenticated.
    pub fn login_time(&self) -> u64 {
        self.login_time.load(Ordering::Acquire)
    }

    // -- Outbound queue ---------------------------------------------------

    /// Pushes a payload onto the outbound queue without waiting.
    ///
    /// # Errors
    /// - [`SessionError::QueueClosed`] if the queue has been closed
    /// - [`SessionError::QueueFull`] if the consumer is behind
    pub fn try_enqueue(&self, payload: Vec<u8>) -> Result<(), SessionError> {
        let outbound = self.outbound.lock();
        let sender = outbound
            .as_ref()
            .ok_or(SessionError::QueueClosed(self.id))?;
        sender.try_send(payload).map_err(|e| match e {
            TrySendError::Full(_) => SessionError::QueueFull(self.id),
            TrySendError::Closed(_) => SessionError::QueueClosed(self.id),
        })
    }

    /// Best-effort send: failures are logged and the payload is dropped.
    pub fn enqueue(&self, payload: Vec<u8>) {
        if let Err(e) = self.try_enqueue(payload) {
            tracing::warn!(
                conn_id = %self.id,
                addr = %self.addr,
                error = %e,
                "dropping outbound payload"
            );
        }
    }

    /// Closes the outbound queue. Returns `false` if it was already closed.
    pub fn close_queue(&self) -> bool {
        self.outbound.lock().take().is_some()
    }

    pub fn is_queue_closed(&self) -> bool {
        self.outbound.lock().is_none()
    }

    // -- Heartbeat / identity --------------------------------------------

    pub fn mark_heartbeat(&self, now: u64) {
        self.heartbeat_time.store(now, Ordering::Release);
    }

    /// `true` once [`HEARTBEAT_EXPIRY_SECS`] or more have passed since the
    /// last heartbeat.
    pub fn is_heartbeat_expired(&self, now: u64) -> bool {
        self.heartbeat_time().saturating_add(HEARTBEAT_EXPIRY_SECS) <= now
    }

    /// Binds the connection to a user. Logging in counts as a heartbeat.
    pub fn authenticate(&self, app_id: AppId, user_id: impl Into<String>, now: u64) {
        {
            let mut identity = self.identity.write();
            identity.app_id = app_id;
            identity.user_id = user_id.into();
        }
        self.login_time.store(now, Ordering::Release);
        self.mark_heartbeat(now);
    }

    pub fn is_authenticated(&self) -> bool {
        !self.identity.read().user_id.is_empty()
    }

    /// Closes the underlying socket, logging any failure.
    pub async fn close_socket(&self) {
        if let Err(e) = self.socket.close().await {
            tracing::debug!(conn_id = %self.id, error = %e, "socket close failed");
        }
    }
}

impl<S: Socket> fmt::Debug for Connection<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let identity = self.identity.read();
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("addr", &self.addr)
            .field("app_id", &identity.app_id)
            .field("user_id", &identity.user_id)
            .field("heartbeat_time", &self.heartbeat_time())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wirehub_transport::{MemoryPeer, MemorySocket};

    fn conn(
        capacity: usize,
    ) -> (Arc<Connection<MemorySocket>>, OutboundQueue, MemoryPeer) {
        let (socket, peer) = MemorySocket::pair("10.0.0.1:5000");
        let (conn, queue) = Connection::new(socket, 1_000, capacity);
        (conn, queue, peer)
    }

    #[test]
    fn test_new_connection_is_anonymous() {
        let (c, _rx, _peer) = conn(4);
        assert!(!c.is_authenticated());
        assert_eq!(c.user_id(), "");
        assert_eq!(c.login_time(), 0);
        assert_eq!(c.first_time(), 1_000);
        assert_eq!(c.heartbeat_time(), 1_000);
        assert_eq!(c.addr(), "10.0.0.1:5000");
    }

    #[test]
    fn test_authenticate_sets_identity_and_heartbeat() {
        let (c, _rx, _peer) = conn(4);
        c.authenticate(AppId(101), "alice", 1_050);

        assert!(c.is_authenticated());
        assert_eq!(c.app_id(), AppId(101));
        assert_eq!(c.user_id(), "alice");
        assert_eq!(c.login_time(), 1_050);
        assert_eq!(c.heartbeat_time(), 1_050);
        assert_eq!(c.key().as_str(), "101_alice");
    }

    #[test]
    fn test_heartbeat_expiry_boundary() {
        let (c, _rx, _peer) = conn(4);
        c.mark_heartbeat(10_000);

        assert!(!c.is_heartbeat_expired(10_000 + 359));
        assert!(c.is_heartbeat_expired(10_000 + 360));
        assert!(c.is_heartbeat_expired(10_000 + 361));
    }

    #[test]
    fn test_heartbeat_expiry_does_not_overflow() {
        let (c, _rx, _peer) = conn(4);
        c.mark_heartbeat(u64::MAX - 1);
        assert!(!c.is_heartbeat_expired(u64::MAX - 1));
    }

    #[tokio::test]
    async fn test_enqueue_delivers_in_order() {
        let (c, mut rx, _peer) = conn(4);
        c.enqueue(b"one".to_vec());
        c.enqueue(b"two".to_vec());

        assert_eq!(rx.recv().await.unwrap(), b"one");
        assert_eq!(rx.recv().await.unwrap(), b"two");
    }

    #[test]
    fn test_try_enqueue_full_queue_returns_error() {
        let (c, _rx, _peer) = conn(1);
        c.try_enqueue(b"fits".to_vec()).unwrap();

        let result = c.try_enqueue(b"overflow".to_vec());
        assert!(matches!(result, Err(SessionError::QueueFull(_))));
    }

    #[tokio::test]
    async fn test_close_queue_drains_then_ends() {
        let (c, mut rx, _peer) = conn(4);
        c.enqueue(b"last".to_vec());

        assert!(c.close_queue());
        assert!(!c.close_queue(), "second close reports already closed");
        assert!(c.is_queue_closed());

        assert_eq!(rx.recv().await.unwrap(), b"last");
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_enqueue_after_close_is_swallowed() {
        let (c, _rx, _peer) = conn(4);
        c.close_queue();

        // Must not panic; the error is only logged.
        c.enqueue(b"late".to_vec());
        assert!(matches!(
            c.try_enqueue(b"late".to_vec()),
            Err(SessionError::QueueClosed(_))
        ));
    }

    #[tokio::test]
    async fn test_close_socket_reaches_peer() {
        let (c, _rx, peer) = conn(4);
        c.close_socket().await;
        assert!(peer.is_closed());
    }
}
