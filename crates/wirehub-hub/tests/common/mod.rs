//! Shared helpers for hub integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use wirehub_hub::{Dispatcher, Hub, HubConfig};
use wirehub_protocol::{AppId, PushData, Response};
use wirehub_session::{unix_now, Connection, MemoryPresenceStore, OutboundQueue, TimeOrderIds};
use wirehub_transport::{MemoryPeer, MemorySocket, Socket};

pub type TestHub = Hub<MemorySocket>;
pub type TestConn = Arc<Connection<MemorySocket>>;

pub fn spawn_hub(config: HubConfig) -> (TestHub, Arc<MemoryPresenceStore>) {
    let presence = Arc::new(MemoryPresenceStore::new());
    let hub = Hub::spawn(config, Arc::clone(&presence), Arc::new(TimeOrderIds::new()));
    (hub, presence)
}

pub fn new_conn(addr: &str, capacity: usize) -> (TestConn, OutboundQueue, MemoryPeer) {
    let (socket, peer) = MemorySocket::pair(addr);
    let (conn, queue) = Connection::new(socket, unix_now(), capacity);
    (conn, queue, peer)
}

/// Submits `conn` and waits until the actor has registered it.
pub async fn register_conn(hub: &TestHub, conn: &TestConn) {
    hub.register(Arc::clone(conn)).await.unwrap();
    eventually(|| hub.is_registered(conn)).await;
}

pub async fn register(hub: &TestHub, addr: &str) -> (TestConn, OutboundQueue, MemoryPeer) {
    let (conn, queue, peer) = new_conn(addr, 16);
    register_conn(hub, &conn).await;
    (conn, queue, peer)
}

/// Logs `conn` in and waits until the actor has indexed it.
pub async fn login(hub: &TestHub, conn: &TestConn, app: u32, user: &str) {
    hub.login(conn, AppId(app), user, unix_now()).await.unwrap();
    eventually(|| {
        hub.lookup(AppId(app), user)
            .is_some_and(|c| c.id() == conn.id())
    })
    .await;
}

/// Waits until every unregister submitted so far has been handled.
///
/// The unregister mailbox is FIFO, so once a throwaway connection pushed
/// in behind them is gone, so are they.
pub async fn flush_unregister(hub: &TestHub) {
    let (marker, _queue, _peer) = register(hub, "192.0.2.1:9").await;
    hub.unregister(Arc::clone(&marker)).await.unwrap();
    eventually(|| !hub.is_registered(&marker)).await;
}

/// Polls `cond` until it holds, failing the test after two seconds.
pub async fn eventually(mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !cond() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Everything currently sitting in `queue`.
pub async fn drain(queue: &mut OutboundQueue) -> Vec<Vec<u8>> {
    let mut frames = Vec::new();
    while let Ok(Some(frame)) =
        tokio::time::timeout(Duration::from_millis(20), queue.recv()).await
    {
        frames.push(frame);
    }
    frames
}

pub fn decode_push(frame: &[u8]) -> Response<PushData> {
    serde_json::from_slice(frame).expect("frame should be a push")
}

/// Ignores every frame.
pub struct NoopDispatcher;

impl<S: Socket> Dispatcher<S> for NoopDispatcher {
    async fn process(&self, _conn: &Arc<Connection<S>>, _frame: Vec<u8>) {}
}

/// Panics on every frame.
pub struct PanicDispatcher;

impl<S: Socket> Dispatcher<S> for PanicDispatcher {
    async fn process(&self, _conn: &Arc<Connection<S>>, frame: Vec<u8>) {
        panic!("dispatcher exploded on {} bytes", frame.len());
    }
}
