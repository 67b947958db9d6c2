//! Admin introspection snapshot.

use serde::Serialize;

/// Counts, mailbox depths, and (in debug mode) the full client and user
/// lists. Best-effort: each field is read independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerInfo {
    pub clients_len: usize,
    pub users_len: usize,
    pub chan_register_len: usize,
    pub chan_login_len: usize,
    pub chan_unregister_len: usize,
    pub chan_broadcast_len: usize,
    /// Remote addresses of every registered connection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clients: Option<Vec<String>>,
    /// Composite keys of every authenticated connection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<String>>,
}
