//! [`Hub`]: the cloneable handle everything outside the actor talks to.
//!
//! Mutations (register, login, unregister, broadcast) are submitted to the
//! actor's mailboxes and may wait when a mailbox is full. Queries and
//! direct sends read the registry under its locks and never wait on the
//! actor.

use std::sync::Arc;

use tokio::sync::mpsc;
use wirehub_protocol::{AppId, UserKey};
use wirehub_session::{unix_now, Connection, OrderIdSource, PresenceStore};
use wirehub_transport::Socket;

use crate::manager::{LoginRequest, Mailboxes, ManagerActor};
use crate::{HubConfig, HubError, ManagerInfo, Registry};

pub struct Hub<S: Socket> {
    registry: Arc<Registry<S>>,
    register_tx: mpsc::Sender<Arc<Connection<S>>>,
    login_tx: mpsc::Sender<LoginRequest<S>>,
    unregister_tx: mpsc::Sender<Arc<Connection<S>>>,
    broadcast_tx: mpsc::Sender<Vec<u8>>,
    config: HubConfig,
}

impl<S: Socket> Clone for Hub<S> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            register_tx: self.register_tx.clone(),
            login_tx: self.login_tx.clone(),
            unregister_tx: self.unregister_tx.clone(),
            broadcast_tx: self.broadcast_tx.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S: Socket> Hub<S> {
    /// Spawns the manager actor on the current Tokio runtime and returns a
    /// handle to it. The actor stops once every handle is dropped.
    pub fn spawn<P: PresenceStore>(
        config: HubConfig,
        presence: Arc<P>,
        order_ids: Arc<dyn OrderIdSource>,
    ) -> Self {
        let capacity = config.mailbox_capacity.max(1);
        let (register_tx, register) = mpsc::channel(capacity);
        let (login_tx, login) = mpsc::channel(capacity);
        let (unregister_tx, unregister) = mpsc::channel(capacity);
        let (broadcast_tx, broadcast) = mpsc::channel(capacity);

        let registry = Arc::new(Registry::new());
        let actor = ManagerActor {
            registry: Arc::clone(&registry),
            presence,
            order_ids,
            codec: Default::default(),
            mailboxes: Mailboxes {
                register,
                login,
                unregister,
                broadcast,
            },
        };
        tokio::spawn(actor.run());

        Self {
            registry,
            register_tx,
            login_tx,
            unregister_tx,
            broadcast_tx,
            config,
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    // -- Mailbox submissions ----------------------------------------------

    pub async fn register(&self, conn: Arc<Connection<S>>) -> Result<(), HubError> {
        self.register_tx
            .send(conn)
            .await
            .map_err(|_| HubError::MailboxClosed("register"))
    }

    pub(crate) async fn submit_login(&self, req: LoginRequest<S>) -> Result<(), HubError> {
        self.login_tx
            .send(req)
            .await
            .map_err(|_| HubError::MailboxClosed("login"))
    }

    /// Authenticates `conn` as `(app_id, user_id)` and asks the actor to
    /// index it. Credentials must already have been checked.
    pub async fn login(
        &self,
        conn: &Arc<Connection<S>>,
        app_id: AppId,
        user_id: &str,
        now: u64,
    ) -> Result<(), HubError> {
        conn.authenticate(app_id, user_id, now);
        self.submit_login(LoginRequest {
            app_id,
            user_id: user_id.to_string(),
            conn: Arc::clone(conn),
        })
        .await
    }

    /// Safe to call more than once for the same connection.
    pub async fn unregister(&self, conn: Arc<Connection<S>>) -> Result<(), HubError> {
        self.unregister_tx
            .send(conn)
            .await
            .map_err(|_| HubError::MailboxClosed("unregister"))
    }

    /// Sends `payload` to every registered connection, authenticated or
    /// not. Connections too slow to take it are disconnected.
    pub async fn broadcast(&self, payload: Vec<u8>) -> Result<(), HubError> {
        self.broadcast_tx
            .send(payload)
            .await
            .map_err(|_| HubError::MailboxClosed("broadcast"))
    }

    // -- Queries ----------------------------------------------------------

    pub fn is_registered(&self, conn: &Connection<S>) -> bool {
        self.registry.contains(conn)
    }

    pub fn clients(&self) -> Vec<Arc<Connection<S>>> {
        self.registry.clients()
    }

    pub fn clients_len(&self) -> usize {
        self.registry.clients_len()
    }

    pub fn users_len(&self) -> usize {
        self.registry.users_len()
    }

    pub fn lookup(&self, app_id: AppId, user_id: &str) -> Option<Arc<Connection<S>>> {
        self.registry.lookup(app_id, user_id)
    }

    /// User ids of everyone logged in.
    pub fn user_list(&self) -> Vec<String> {
        self.registry.user_ids()
    }

    pub fn user_keys(&self) -> Vec<UserKey> {
        self.registry.user_keys()
    }

    // -- Outbound send API ------------------------------------------------

    /// Sends `data` to every authenticated connection except the sender's.
    /// Returns the number of connections it was offered to.
    pub fn send_message_all(&self, app_id: AppId, user_id: &str, data: &[u8]) -> usize {
        let ignore = self.registry.lookup(app_id, user_id);
        self.registry.send_all(data, ignore.as_deref())
    }

    /// Sends `data` to the sender's room, except the sender.
    pub fn send_room_messages(&self, app_id: AppId, user_id: &str, data: &[u8]) -> usize {
        let ignore = self.registry.lookup(app_id, user_id);
        self.registry
            .send_room(app_id, self.config.room_match, data, ignore.as_deref())
    }

    /// Delivers `data` to one user. Returns `false` if they are not
    /// connected here.
    pub fn send_to_user(&self, app_id: AppId, user_id: &str, data: Vec<u8>) -> bool {
        match self.registry.lookup(app_id, user_id) {
            Some(conn) => {
                conn.enqueue(data);
                true
            }
            None => false,
        }
    }

    // -- Admin ------------------------------------------------------------

    /// Diagnostic snapshot. With `debug`, includes every remote address
    /// and user key.
    pub fn manager_info(&self, debug: bool) -> ManagerInfo {
        ManagerInfo {
            clients_len: self.registry.clients_len(),
            users_len: self.registry.users_len(),
            chan_register_len: depth(&self.register_tx),
            chan_login_len: depth(&self.login_tx),
            chan_unregister_len: depth(&self.unregister_tx),
            chan_broadcast_len: depth(&self.broadcast_tx),
            clients: debug.then(|| self.registry.client_addrs()),
            users: debug.then(|| {
                self.registry
                    .user_keys()
                    .into_iter()
                    .map(UserKey::into_string)
                    .collect()
            }),
        }
    }

    // -- Heartbeat sweep --------------------------------------------------

    /// Closes and unregisters every connection whose heartbeat expired,
    /// using the current wall-clock time.
    pub async fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(unix_now()).await
    }

    /// [`sweep_expired`](Self::sweep_expired) at an explicit time. Returns
    /// how many connections were torn down.
    pub async fn sweep_expired_at(&self, now: u64) -> usize {
        let mut expired = 0;
        for conn in self.registry.clients() {
            if !conn.is_heartbeat_expired(now) {
                continue;
            }
            tracing::info!(
                conn_id = %conn.id(),
                addr = conn.addr(),
                heartbeat_time = conn.heartbeat_time(),
                "heartbeat expired"
            );
            conn.close_socket().await;
            if let Err(e) = self.unregister(conn).await {
                tracing::warn!(error = %e, "sweep stopped");
                break;
            }
            expired += 1;
        }
        expired
    }
}

/// Messages waiting in a mailbox.
fn depth<T>(tx: &mpsc::Sender<T>) -> usize {
    tx.max_capacity() - tx.capacity()
}
