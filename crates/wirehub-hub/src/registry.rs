//! The connection registry: every live connection, plus the authenticated
//! ones indexed by [`UserKey`].
//!
//! Each container has its own `RwLock`. Only the manager actor mutates
//! them (the mutators are `pub(crate)`); everyone else reads snapshots.
//! Locks are held for a single lookup, insert, or copy. Enqueueing onto
//! connections always happens after the guard is dropped.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use wirehub_protocol::{AppId, UserKey};
use wirehub_session::Connection;
use wirehub_transport::{ConnectionId, Socket};

use crate::RoomMatch;

pub struct Registry<S: Socket> {
    clients: RwLock<HashMap<ConnectionId, Arc<Connection<S>>>>,
    users: RwLock<HashMap<UserKey, Arc<Connection<S>>>>,
}

impl<S: Socket> Registry<S> {
    pub fn new() -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            users: RwLock::new(HashMap::new()),
        }
    }

    // -- Mutation (manager actor only) ------------------------------------

    pub(crate) fn add_client(&self, conn: Arc<Connection<S>>) {
        self.clients.write().insert(conn.id(), conn);
    }

    /// Returns `false` if the connection was not registered.
    pub(crate) fn remove_client(&self, conn: &Connection<S>) -> bool {
        self.clients.write().remove(&conn.id()).is_some()
    }

    /// Binds `key` to `conn`, replacing any previous holder of the key.
    pub(crate) fn add_user(&self, key: UserKey, conn: Arc<Connection<S>>) {
        self.users.write().insert(key, conn);
    }

    /// Removes `key` only if it is still held by a connection from the
    /// same remote address as `conn`.
    ///
    /// A connection superseded by a newer login under the same key gets
    /// `false` and leaves the newer entry alone. So does a connection that
    /// never authenticated.
    pub(crate) fn remove_user(&self, key: &UserKey, conn: &Connection<S>) -> bool {
        if !conn.is_authenticated() {
            return false;
        }
        let mut users = self.users.write();
        match users.get(key) {
            Some(stored) if stored.addr() == conn.addr() => {
                users.remove(key);
                true
            }
            _ => false,
        }
    }

    // -- Queries ----------------------------------------------------------

    pub fn contains(&self, conn: &Connection<S>) -> bool {
        self.clients.read().contains_key(&conn.id())
    }

    /// Snapshot of every registered connection.
    pub fn clients(&self) -> Vec<Arc<Connection<S>>> {
        self.clients.read().values().cloned().collect()
    }

    pub fn clients_len(&self) -> usize {
        self.clients.read().len()
    }

    pub fn users_len(&self) -> usize {
        self.users.read().len()
    }

    /// The connection currently holding `(app_id, user_id)`, if any.
    pub fn lookup(&self, app_id: AppId, user_id: &str) -> Option<Arc<Connection<S>>> {
        self.users.read().get(&UserKey::new(app_id, user_id)).cloned()
    }

    pub fn user_keys(&self) -> Vec<UserKey> {
        self.users.read().keys().cloned().collect()
    }

    /// User ids of every authenticated connection.
    pub fn user_ids(&self) -> Vec<String> {
        self.users.read().values().map(|c| c.user_id()).collect()
    }

    /// Remote addresses of every registered connection.
    pub fn client_addrs(&self) -> Vec<String> {
        self.clients
            .read()
            .values()
            .map(|c| c.addr().to_string())
            .collect()
    }

    /// Snapshot of every authenticated connection.
    pub fn user_connections(&self) -> Vec<Arc<Connection<S>>> {
        self.users.read().values().cloned().collect()
    }

    /// Authenticated connections that belong to room `room` under `mode`.
    pub fn room_connections(&self, room: AppId, mode: RoomMatch) -> Vec<Arc<Connection<S>>> {
        self.users
            .read()
            .iter()
            .filter(|(key, conn)| mode.is_member(room, key, conn.app_id()))
            .map(|(_, conn)| Arc::clone(conn))
            .collect()
    }

    // -- Fan-out ----------------------------------------------------------

    /// Enqueues `payload` on every authenticated connection except
    /// `ignore`. Returns how many connections it was offered to.
    pub fn send_all(&self, payload: &[u8], ignore: Option<&Connection<S>>) -> usize {
        fan_out(self.user_connections(), payload, ignore)
    }

    /// Like [`send_all`](Self::send_all), scoped to one room.
    pub fn send_room(
        &self,
        room: AppId,
        mode: RoomMatch,
        payload: &[u8],
        ignore: Option<&Connection<S>>,
    ) -> usize {
        fan_out(self.room_connections(room, mode), payload, ignore)
    }
}

impl<S: Socket> Default for Registry<S> {
    fn default() -> Self {
        Self::new()
    }
}

fn fan_out<S: Socket>(
    targets: Vec<Arc<Connection<S>>>,
    payload: &[u8],
    ignore: Option<&Connection<S>>,
) -> usize {
    let ignored = ignore.map(|c| c.id());
    let mut offered = 0;
    for conn in targets {
        if Some(conn.id()) == ignored {
            continue;
        }
        conn.enqueue(payload.to_vec());
        offered += 1;
    }
    offered
}

#[cfg(test)]
mod tests {
    use super::*;
    use wirehub_session::OutboundQueue;
    use wirehub_transport::{MemoryPeer, MemorySocket};

    type Conn = Arc<Connection<MemorySocket>>;

    fn conn(addr: &str) -> (Conn, OutboundQueue, MemoryPeer) {
        let (socket, peer) = MemorySocket::pair(addr);
        let (conn, queue) = Connection::new(socket, 100, 8);
        (conn, queue, peer)
    }

    /// Registers and authenticates in one step, as the actor would.
    fn login(reg: &Registry<MemorySocket>, conn: &Conn, app: u32, user: &str) {
        reg.add_client(Arc::clone(conn));
        conn.authenticate(AppId(app), user, 200);
        reg.add_user(conn.key(), Arc::clone(conn));
    }

    #[test]
    fn test_remove_user_refuses_superseded_connection() {
        let reg = Registry::new();
        let (old, _q1, _p1) = conn("10.0.0.1:1000");
        let (new, _q2, _p2) = conn("10.0.0.2:2000");
        login(&reg, &old, 1, "alice");
        login(&reg, &new, 1, "alice");

        assert!(!reg.remove_user(&old.key(), &old));

        let current = reg.lookup(AppId(1), "alice").unwrap();
        assert_eq!(current.id(), new.id());
        assert!(reg.remove_user(&new.key(), &new));
        assert!(reg.lookup(AppId(1), "alice").is_none());
    }

    #[test]
    fn test_remove_user_anonymous_connection_returns_false() {
        let reg = Registry::new();
        let (c, _q, _p) = conn("10.0.0.1:1000");
        reg.add_client(Arc::clone(&c));

        assert!(!reg.remove_user(&c.key(), &c));
        assert!(reg.remove_client(&c));
        assert!(!reg.remove_client(&c));
    }

    #[test]
    fn test_queries_return_snapshots() {
        let reg = Registry::new();
        let (a, _qa, _pa) = conn("10.0.0.1:1000");
        let (b, _qb, _pb) = conn("10.0.0.2:2000");
        login(&reg, &a, 101, "alice");
        reg.add_client(Arc::clone(&b));

        assert_eq!(reg.clients_len(), 2);
        assert_eq!(reg.users_len(), 1);
        assert!(reg.contains(&b));
        assert_eq!(reg.user_ids(), vec!["alice".to_string()]);
        assert_eq!(reg.user_keys(), vec![UserKey::new(AppId(101), "alice")]);

        let mut addrs = reg.client_addrs();
        addrs.sort();
        assert_eq!(addrs, vec!["10.0.0.1:1000", "10.0.0.2:2000"]);
    }

    #[tokio::test]
    async fn test_send_all_skips_ignored_and_anonymous() {
        let reg = Registry::new();
        let (a, mut qa, _pa) = conn("10.0.0.1:1000");
        let (b, mut qb, _pb) = conn("10.0.0.2:2000");
        let (anon, mut qn, _pn) = conn("10.0.0.3:3000");
        login(&reg, &a, 1, "alice");
        login(&reg, &b, 1, "bob");
        reg.add_client(Arc::clone(&anon));

        let offered = reg.send_all(b"hi", Some(&a));

        assert_eq!(offered, 1);
        assert_eq!(qb.recv().await.unwrap(), b"hi");
        a.close_queue();
        anon.close_queue();
        assert!(qa.recv().await.is_none());
        assert!(qn.recv().await.is_none());
    }

    #[test]
    fn test_room_connections_by_mode() {
        let reg = Registry::new();
        let (a, _qa, _pa) = conn("10.0.0.1:1");
        let (b, _qb, _pb) = conn("10.0.0.2:2");
        let (c, _qc, _pc) = conn("10.0.0.3:3");
        let (d, _qd, _pd) = conn("10.0.0.4:4");
        login(&reg, &a, 7, "a");
        login(&reg, &b, 17, "x");
        login(&reg, &c, 70, "x");
        login(&reg, &d, 8, "y");

        let mut loose: Vec<String> = reg
            .room_connections(AppId(7), RoomMatch::KeySubstring)
            .iter()
            .map(|c| c.key().into_string())
            .collect();
        loose.sort();
        assert_eq!(loose, vec!["17_x", "70_x", "7_a"]);

        let exact = reg.room_connections(AppId(7), RoomMatch::ExactAppId);
        assert_eq!(exact.len(), 1);
        assert_eq!(exact[0].id(), a.id());
    }
}
