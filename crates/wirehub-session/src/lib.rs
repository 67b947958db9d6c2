//! Per-connection session state for wirehub.
//!
//! This crate owns everything that belongs to a single accepted socket and
//! the small external collaborators the hub consults about it:
//!
//! 1. **Connection**: the socket, its bounded outbound queue, and the
//!    session metadata (identity, first-seen / heartbeat / login times)
//! 2. **Presence**: the best-effort online/offline record kept per user
//!    ([`PresenceStore`])
//! 3. **Order ids**: identifiers stamped on system notifications
//!    ([`OrderIdSource`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Hub layer (above)      ← registers, authenticates, fans out to connections
//!     ↕
//! Session layer (this)   ← one Connection per socket, presence, order ids
//!     ↕
//! Transport / Protocol   ← Socket, AppId, UserKey
//! ```

mod connection;
mod error;
mod order;
mod presence;

pub use connection::{Connection, OutboundQueue, HEARTBEAT_EXPIRY_SECS};
pub use error::SessionError;
pub use order::{OrderIdSource, TimeOrderIds};
pub use presence::{MemoryPresenceStore, OnlineInfo, PresenceStore};

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in whole seconds since the Unix epoch.
///
/// All session timestamps use this unit.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
