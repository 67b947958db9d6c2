//! Manager actor: the single task that mutates the registry.
//!
//! It owns the receiving ends of four bounded mailboxes and handles one
//! message at a time. `select!` picks among ready mailboxes at random, so
//! none starves the others and no ordering holds *between* mailboxes.
//! Within one mailbox messages are handled in submission order.

use std::sync::Arc;

use tokio::sync::mpsc;
use wirehub_protocol::{AppId, Codec, JsonCodec, PushKind, Response, UserKey};
use wirehub_session::{unix_now, Connection, OrderIdSource, PresenceStore};
use wirehub_transport::Socket;

use crate::Registry;

/// Text carried by the "user entered" push.
pub const ENTER_MSG: &str = "joined";
/// Text carried by the "user left" push.
pub const EXIT_MSG: &str = "left";

/// A request to bind a connection to a user, consumed once by the actor.
pub(crate) struct LoginRequest<S: Socket> {
    pub(crate) app_id: AppId,
    pub(crate) user_id: String,
    pub(crate) conn: Arc<Connection<S>>,
}

impl<S: Socket> LoginRequest<S> {
    pub(crate) fn key(&self) -> UserKey {
        UserKey::new(self.app_id, &self.user_id)
    }
}

/// Receiving ends of the four mailboxes.
pub(crate) struct Mailboxes<S: Socket> {
    pub(crate) register: mpsc::Receiver<Arc<Connection<S>>>,
    pub(crate) login: mpsc::Receiver<LoginRequest<S>>,
    pub(crate) unregister: mpsc::Receiver<Arc<Connection<S>>>,
    pub(crate) broadcast: mpsc::Receiver<Vec<u8>>,
}

pub(crate) struct ManagerActor<S: Socket, P: PresenceStore> {
    pub(crate) registry: Arc<Registry<S>>,
    pub(crate) presence: Arc<P>,
    pub(crate) order_ids: Arc<dyn OrderIdSource>,
    pub(crate) codec: JsonCodec,
    pub(crate) mailboxes: Mailboxes<S>,
}

impl<S: Socket, P: PresenceStore> ManagerActor<S, P> {
    /// Runs until every [`Hub`](crate::Hub) handle has been dropped.
    pub(crate) async fn run(mut self) {
        tracing::info!("manager actor started");

        loop {
            tokio::select! {
                Some(conn) = self.mailboxes.register.recv() => {
                    self.on_register(conn);
                }
                Some(req) = self.mailboxes.login.recv() => {
                    self.on_login(req);
                }
                Some(conn) = self.mailboxes.unregister.recv() => {
                    self.on_unregister(conn).await;
                }
                Some(payload) = self.mailboxes.broadcast.recv() => {
                    self.on_broadcast(payload);
                }
                else => break,
            }
        }

        tracing::info!("manager actor stopped");
    }

    fn on_register(&self, conn: Arc<Connection<S>>) {
        tracing::info!(
            conn_id = %conn.id(),
            addr = conn.addr(),
            clients = self.registry.clients_len() + 1,
            "connection registered"
        );
        self.registry.add_client(conn);
    }

    fn on_login(&self, req: LoginRequest<S>) {
        // The connection may have unregistered while the request waited.
        if !self.registry.contains(&req.conn) {
            tracing::debug!(
                conn_id = %req.conn.id(),
                app_id = %req.app_id,
                user_id = %req.user_id,
                "login for unregistered connection dropped"
            );
            return;
        }

        let key = req.key();
        // Only index a key the connection itself carries, otherwise
        // `remove_user` could never find the entry again.
        if !req.conn.is_authenticated() || req.conn.key() != key {
            tracing::warn!(
                conn_id = %req.conn.id(),
                %key,
                conn_key = %req.conn.key(),
                "login does not match connection identity, dropped"
            );
            return;
        }
        tracing::info!(
            conn_id = %req.conn.id(),
            addr = req.conn.addr(),
            %key,
            "user logged in"
        );
        self.registry.add_user(key, Arc::clone(&req.conn));
        self.notify(req.app_id, &req.user_id, PushKind::Enter, ENTER_MSG);
    }

    async fn on_unregister(&self, conn: Arc<Connection<S>>) {
        let was_registered = self.registry.remove_client(&conn);
        let key = conn.key();

        if !self.registry.remove_user(&key, &conn) {
            if was_registered {
                tracing::info!(
                    conn_id = %conn.id(),
                    addr = conn.addr(),
                    "connection unregistered"
                );
            }
            return;
        }

        tracing::info!(
            conn_id = %conn.id(),
            addr = conn.addr(),
            %key,
            "user unregistered"
        );

        match self.presence.get_online_info(&key).await {
            Ok(mut info) => {
                info.log_out(unix_now());
                if let Err(e) = self.presence.set_online_info(&key, info).await {
                    tracing::warn!(%key, error = %e, "presence update failed");
                }
            }
            Err(e) => {
                tracing::debug!(%key, error = %e, "presence update skipped");
            }
        }

        self.notify(conn.app_id(), &conn.user_id(), PushKind::Exit, EXIT_MSG);
    }

    /// Offers `payload` to every registered connection. A connection that
    /// cannot take it right now has its queue closed.
    fn on_broadcast(&self, payload: Vec<u8>) {
        for conn in self.registry.clients() {
            if let Err(e) = conn.try_enqueue(payload.clone()) {
                tracing::warn!(
                    conn_id = %conn.id(),
                    addr = conn.addr(),
                    error = %e,
                    "closing queue of slow consumer"
                );
                if conn.close_queue() {
                    // The outbound pump may be parked on a write the peer
                    // never drains; only a closed socket releases it.
                    let conn = Arc::clone(&conn);
                    tokio::spawn(async move { conn.close_socket().await });
                }
            }
        }
    }

    /// Sends a system push about `user_id` to every authenticated
    /// connection except that user's own.
    fn notify(&self, app_id: AppId, user_id: &str, kind: PushKind, msg: &str) {
        let push = Response::push(self.order_ids.next_order_id(), kind, user_id, msg);
        let payload = match self.codec.encode(&push) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode push");
                return;
            }
        };
        let ignore = self.registry.lookup(app_id, user_id);
        self.registry.send_all(&payload, ignore.as_deref());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::{Hub, HubConfig};
    use wirehub_session::{MemoryPresenceStore, TimeOrderIds};
    use wirehub_transport::MemorySocket;

    async fn until(mut cond: impl FnMut() -> bool) {
        for _ in 0..400 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn test_on_login_drops_key_the_connection_does_not_hold() {
        let hub: Hub<MemorySocket> = Hub::spawn(
            HubConfig::default(),
            Arc::new(MemoryPresenceStore::new()),
            Arc::new(TimeOrderIds::new()),
        );
        let (socket, _peer) = MemorySocket::pair("10.0.0.1:1000");
        let (conn, _queue) = Connection::new(socket, unix_now(), 4);
        hub.register(Arc::clone(&conn)).await.unwrap();
        until(|| hub.is_registered(&conn)).await;

        conn.authenticate(AppId(1), "alice", unix_now());
        for user_id in ["mallory", "alice"] {
            hub.submit_login(LoginRequest {
                app_id: AppId(1),
                user_id: user_id.to_string(),
                conn: Arc::clone(&conn),
            })
            .await
            .unwrap();
        }
        // FIFO: once alice is indexed, mallory's request was handled.
        until(|| hub.users_len() > 0).await;

        assert!(hub.lookup(AppId(1), "alice").is_some());
        assert!(hub.lookup(AppId(1), "mallory").is_none());
        assert_eq!(hub.users_len(), 1);
    }
}
