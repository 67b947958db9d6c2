//! `WirehubServer` builder and server loop.
//!
//! Ties the layers together: accept a TCP stream, upgrade it on its own
//! task, wrap it in a [`Connection`], register it with the [`Hub`], start
//! its pumps. A separate ticker runs the heartbeat sweep.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use wirehub_hub::{spawn_pumps, Hub, HubConfig};
use wirehub_protocol::AppId;
use wirehub_session::{
    unix_now, Connection, MemoryPresenceStore, OrderIdSource, PresenceStore,
    TimeOrderIds,
};
use wirehub_transport::{PendingWebSocket, Socket, WebSocketSocket, WebSocketTransport};

use crate::{CommandDispatcher, WirehubError};

/// Default period of the heartbeat sweep.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Builder for configuring and starting a wirehub server.
///
/// # Example
///
/// ```rust,no_run
/// use wirehub::prelude::*;
///
/// # async fn run() -> Result<(), WirehubError> {
/// let server = WirehubServer::builder()
///     .bind("0.0.0.0:8080")
///     .app_ids([AppId(101), AppId(102)])
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct WirehubServerBuilder<P: PresenceStore = MemoryPresenceStore> {
    bind_addr: String,
    hub_config: HubConfig,
    sweep_interval: Duration,
    app_ids: Vec<AppId>,
    presence: Arc<P>,
    order_ids: Arc<dyn OrderIdSource>,
}

impl WirehubServerBuilder {
    /// Creates a new builder with default settings and an in-memory
    /// presence store.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            hub_config: HubConfig::default(),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            app_ids: vec![AppId(101), AppId(102)],
            presence: Arc::new(MemoryPresenceStore::new()),
            order_ids: Arc::new(TimeOrderIds::new()),
        }
    }
}

impl Default for WirehubServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: PresenceStore> WirehubServerBuilder<P> {
    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    pub fn hub_config(mut self, config: HubConfig) -> Self {
        self.hub_config = config;
        self
    }

    /// How often to sweep for expired heartbeats.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Applications users may log in under.
    pub fn app_ids(mut self, ids: impl IntoIterator<Item = AppId>) -> Self {
        self.app_ids = ids.into_iter().collect();
        self
    }

    /// Replaces the presence store.
    pub fn presence<Q: PresenceStore>(self, store: Arc<Q>) -> WirehubServerBuilder<Q> {
        WirehubServerBuilder {
            bind_addr: self.bind_addr,
            hub_config: self.hub_config,
            sweep_interval: self.sweep_interval,
            app_ids: self.app_ids,
            presence: store,
            order_ids: self.order_ids,
        }
    }

    pub fn order_ids(mut self, source: Arc<dyn OrderIdSource>) -> Self {
        self.order_ids = source;
        self
    }

    /// Binds the listener and spawns the manager actor.
    pub async fn build(self) -> Result<WirehubServer<P>, WirehubError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;
        let hub = Hub::spawn(self.hub_config, Arc::clone(&self.presence), self.order_ids);
        let dispatcher = Arc::new(CommandDispatcher::new(
            hub.clone(),
            self.presence,
            self.app_ids,
        ));

        Ok(WirehubServer {
            transport,
            hub,
            dispatcher,
            sweep_interval: self.sweep_interval,
        })
    }
}

/// A wirehub server ready to accept connections.
///
/// Call [`run()`](Self::run) to start accepting.
pub struct WirehubServer<P: PresenceStore = MemoryPresenceStore> {
    transport: WebSocketTransport,
    hub: Hub<WebSocketSocket>,
    dispatcher: Arc<CommandDispatcher<WebSocketSocket, P>>,
    sweep_interval: Duration,
}

impl WirehubServer {
    /// Creates a new builder.
    pub fn builder() -> WirehubServerBuilder {
        WirehubServerBuilder::new()
    }
}

impl<P: PresenceStore> WirehubServer<P> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The hub handle, for sending messages and introspection from
    /// outside the connection pumps.
    pub fn hub(&self) -> &Hub<WebSocketSocket> {
        &self.hub
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(mut self) -> Result<(), WirehubError> {
        tracing::info!(
            sweep_interval_secs = self.sweep_interval.as_secs(),
            "wirehub server running"
        );
        let _sweeper = spawn_sweeper(self.hub.clone(), self.sweep_interval);

        loop {
            match self.transport.accept_pending().await {
                Ok(pending) => {
                    let hub = self.hub.clone();
                    let dispatcher = Arc::clone(&self.dispatcher);
                    tokio::spawn(admit(hub, dispatcher, pending));
                }
                Err(e) => tracing::error!(error = %e, "accept failed"),
            }
        }
    }
}

/// Finishes the handshake, registers the connection, and starts its pumps.
async fn admit<P: PresenceStore>(
    hub: Hub<WebSocketSocket>,
    dispatcher: Arc<CommandDispatcher<WebSocketSocket, P>>,
    pending: PendingWebSocket,
) {
    let peer = pending.peer_addr();
    let socket = match pending.upgrade().await {
        Ok(socket) => socket,
        Err(e) => {
            tracing::debug!(%peer, error = %e, "handshake failed");
            return;
        }
    };

    let (conn, queue) = Connection::new(socket, unix_now(), hub.config().outbound_capacity);
    if let Err(e) = hub.register(Arc::clone(&conn)).await {
        tracing::error!(conn_id = %conn.id(), error = %e, "register failed");
        conn.close_socket().await;
        return;
    }
    spawn_pumps(hub, conn, queue, dispatcher);
}

/// Runs [`Hub::sweep_expired`] every `period`. The immediate first tick
/// is skipped.
pub(crate) fn spawn_sweeper<S: Socket>(hub: Hub<S>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let expired = hub.sweep_expired().await;
            if expired > 0 {
                tracing::info!(expired, "heartbeat sweep");
            }
        }
    })
}
