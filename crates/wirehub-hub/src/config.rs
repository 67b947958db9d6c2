//! Hub configuration.

use serde::{Deserialize, Serialize};
use wirehub_protocol::{AppId, UserKey};

// ---------------------------------------------------------------------------
// HubConfig
// ---------------------------------------------------------------------------

/// Configuration for a [`Hub`](crate::Hub) and the connections it serves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Capacity of each of the four manager mailboxes. A full mailbox
    /// makes the submitting task wait.
    pub mailbox_capacity: usize,

    /// Capacity of each connection's outbound queue.
    pub outbound_capacity: usize,

    /// How room fan-out decides membership.
    pub room_match: RoomMatch,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 1000,
            outbound_capacity: 100,
            room_match: RoomMatch::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// RoomMatch
// ---------------------------------------------------------------------------

/// Membership test for "room" fan-out.
///
/// A room is named by an application id. [`KeySubstring`] reproduces the
/// historical rule: a user is in room `7` if the text `"7"` occurs
/// anywhere in their composite key, which also admits `17_x` and `70_x`.
/// [`ExactAppId`] compares the application id itself.
///
/// [`KeySubstring`]: RoomMatch::KeySubstring
/// [`ExactAppId`]: RoomMatch::ExactAppId
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RoomMatch {
    #[default]
    KeySubstring,
    ExactAppId,
}

impl RoomMatch {
    /// Whether a user registered under `key` with `member_app` belongs to
    /// room `room`.
    pub fn is_member(self, room: AppId, key: &UserKey, member_app: AppId) -> bool {
        match self {
            Self::KeySubstring => key.as_str().contains(&room.to_string()),
            Self::ExactAppId => member_app == room,
        }
    }
}
