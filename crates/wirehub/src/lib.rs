//! # wirehub
//!
//! A real-time messaging hub. Clients hold a WebSocket open, log in as a
//! user of an application, and receive direct, room, and hub-wide
//! messages plus "user entered" / "user left" notifications.
//!
//! The layers are separate crates, re-exported here:
//!
//! ```text
//! wirehub-transport   sockets (WebSocket, in-memory)
//! wirehub-protocol    frames, user keys, JSON codec
//! wirehub-session     Connection, presence, order ids
//! wirehub-hub         registry, manager actor, pumps, fan-out
//! wirehub             server, sweep ticker, reference dispatcher
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use wirehub::prelude::*;
//!
//! # async fn run() -> Result<(), WirehubError> {
//! let server = WirehubServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .build()
//!     .await?;
//! let hub = server.hub().clone();
//! tokio::spawn(async move {
//!     // e.g. an admin endpoint
//!     let _info = hub.manager_info(false);
//! });
//! server.run().await
//! # }
//! ```

mod dispatcher;
mod error;
mod server;

pub use dispatcher::CommandDispatcher;
pub use error::WirehubError;
pub use server::{WirehubServer, WirehubServerBuilder, DEFAULT_SWEEP_INTERVAL};

pub use wirehub_hub as hub;
pub use wirehub_protocol as protocol;
pub use wirehub_session as session;
pub use wirehub_transport as transport;

pub mod prelude {
    pub use crate::{CommandDispatcher, WirehubError, WirehubServer, WirehubServerBuilder};
    pub use wirehub_hub::{Dispatcher, Hub, HubConfig, ManagerInfo, RoomMatch};
    pub use wirehub_protocol::{AppId, PushData, PushKind, Response, StatusCode, UserKey};
    pub use wirehub_session::{
        Connection, MemoryPresenceStore, OnlineInfo, OrderIdSource, PresenceStore, TimeOrderIds,
    };
    pub use wirehub_transport::{Socket, WebSocketSocket};
}
