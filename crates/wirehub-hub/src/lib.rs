//! Connection registry, manager actor, and fan-out for wirehub.
//!
//! # Key types
//!
//! - [`Hub`]: cloneable handle that submits register / login / unregister /
//!   broadcast to the manager actor, answers queries, sends to users
//! - [`Registry`]: live connections and authenticated users, each behind
//!   its own `RwLock`
//! - [`Dispatcher`]: what the inbound pump hands frames to
//! - [`spawn_pumps`]: starts a connection's inbound and outbound pumps
//! - [`ManagerInfo`]: admin snapshot
//! - [`HubConfig`] / [`RoomMatch`]: mailbox and queue sizes, room rule
//!
//! ```text
//!   pumps, sweeper, dispatchers
//!        │ register / login / unregister / broadcast
//!        ▼
//!   ┌──────────────┐   mutates   ┌──────────┐   reads   ┌──────────────┐
//!   │ ManagerActor │ ──────────→ │ Registry │ ←──────── │ Hub queries  │
//!   └──────────────┘             └──────────┘           │ and fan-out  │
//!                                                       └──────────────┘
//! ```

mod config;
mod dispatch;
mod error;
mod hub;
mod info;
mod manager;
mod pump;
mod registry;

pub use config::{HubConfig, RoomMatch};
pub use dispatch::Dispatcher;
pub use error::HubError;
pub use hub::Hub;
pub use info::ManagerInfo;
pub use manager::{ENTER_MSG, EXIT_MSG};
pub use pump::{read_pump, spawn_pumps, write_pump};
pub use registry::Registry;
