//! Presence: the per-user online/offline record kept outside the hub.
//!
//! The in-memory registry is authoritative for routing. Presence is a
//! best-effort mirror for other services (e.g. "is this user online on
//! any node?"), typically backed by Redis. The hub only ever reads a
//! record, flips it, and writes it back.

use std::collections::HashMap;
use std::future::Future;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use wirehub_protocol::{AppId, UserKey};

use crate::{SessionError, HEARTBEAT_EXPIRY_SECS};

/// A user's presence record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineInfo {
    /// Remote address of the connection that logged in.
    pub addr: String,
    pub app_id: AppId,
    pub user_id: String,
    pub login_time: u64,
    pub heartbeat_time: u64,
    pub logout_time: u64,
    pub is_logoff: bool,
}

impl OnlineInfo {
    /// A fresh record for a user who just logged in.
    pub fn online(
        addr: impl Into<String>,
        app_id: AppId,
        user_id: impl Into<String>,
        now: u64,
    ) -> Self {
        Self {
            addr: addr.into(),
            app_id,
            user_id: user_id.into(),
            login_time: now,
            heartbeat_time: now,
            logout_time: 0,
            is_logoff: false,
        }
    }

    pub fn heartbeat(&mut self, now: u64) {
        self.heartbeat_time = now;
        self.is_logoff = false;
    }

    pub fn log_out(&mut self, now: u64) {
        self.logout_time = now;
        self.is_logoff = true;
    }

    /// Online means not logged off and heartbeat still within the window.
    pub fn is_online(&self, now: u64) -> bool {
        !self.is_logoff
            && self.heartbeat_time.saturating_add(HEARTBEAT_EXPIRY_SECS) > now
    }
}

/// Storage for [`OnlineInfo`] records, keyed by [`UserKey`].
///
/// The futures must be `Send` because the manager actor awaits them on
/// the multi-threaded runtime.
pub trait PresenceStore: Send + Sync + 'static {
    /// Reads the record for `key`.
    ///
    /// # Errors
    /// [`SessionError::PresenceNotFound`] when no record exists, or
    /// [`SessionError::Presence`] when the backend fails.
    fn get_online_info(
        &self,
        key: &UserKey,
    ) -> impl Future<Output = Result<OnlineInfo, SessionError>> + Send;

    /// Writes (replaces) the record for `key`.
    fn set_online_info(
        &self,
        key: &UserKey,
        info: OnlineInfo,
    ) -> impl Future<Output = Result<(), SessionError>> + Send;
}

/// A process-local [`PresenceStore`].
#[derive(Debug, Default)]
pub struct MemoryPresenceStore {
    records: Mutex<HashMap<UserKey, OnlineInfo>>,
}

impl MemoryPresenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records stored, online or not.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl PresenceStore for MemoryPresenceStore {
    async fn get_online_info(
        &self,
        key: &UserKey,
    ) -> Result<OnlineInfo, SessionError> {
        self.records
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| SessionError::PresenceNotFound(key.to_string()))
    }

    async fn set_online_info(
        &self,
        key: &UserKey,
        info: OnlineInfo,
    ) -> Result<(), SessionError> {
        self.records.lock().insert(key.clone(), info);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> UserKey {
        UserKey::new(AppId(101), "alice")
    }

    #[test]
    fn test_online_info_log_out_marks_logoff() {
        let mut info = OnlineInfo::online("1.2.3.4:5", AppId(101), "alice", 100);
        assert!(info.is_online(100));

        info.log_out(200);

        assert!(info.is_logoff);
        assert_eq!(info.logout_time, 200);
        assert!(!info.is_online(200));
    }

    #[test]
    fn test_online_info_goes_stale_without_heartbeat() {
        let mut info = OnlineInfo::online("1.2.3.4:5", AppId(101), "alice", 100);
        assert!(!info.is_online(100 + HEARTBEAT_EXPIRY_SECS));

        info.heartbeat(300);
        assert!(info.is_online(100 + HEARTBEAT_EXPIRY_SECS));
    }

    #[tokio::test]
    async fn test_memory_store_get_missing_returns_not_found() {
        let store = MemoryPresenceStore::new();
        let result = store.get_online_info(&key()).await;
        assert!(matches!(result, Err(SessionError::PresenceNotFound(k)) if k == "101_alice"));
    }

    #[tokio::test]
    async fn test_memory_store_set_then_get() {
        let store = MemoryPresenceStore::new();
        let info = OnlineInfo::online("1.2.3.4:5", AppId(101), "alice", 100);

        store.set_online_info(&key(), info.clone()).await.unwrap();

        assert_eq!(store.get_online_info(&key()).await.unwrap(), info);
        assert_eq!(store.len(), 1);
    }
}
