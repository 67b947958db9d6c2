//! Order ids stamped on hub-originated notifications.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

/// Produces identifiers for outgoing system notifications.
///
/// Clients use them to de-duplicate and roughly order pushes.
pub trait OrderIdSource: Send + Sync + 'static {
    fn next_order_id(&self) -> String;
}

/// Time-ordered ids: `{unix_millis}{counter:04}{random:04}`.
///
/// The counter separates ids minted within one millisecond. The random
/// tail separates hubs minting at the same instant.
#[derive(Debug, Default)]
pub struct TimeOrderIds {
    counter: AtomicU64,
}

impl TimeOrderIds {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OrderIdSource for TimeOrderIds {
    fn next_order_id(&self) -> String {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let seq = self.counter.fetch_add(1, Ordering::Relaxed) % 10_000;
        let tail: u32 = rand::rng().random_range(0..10_000);
        format!("{millis}{seq:04}{tail:04}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_order_ids_are_numeric_and_sized() {
        let ids = TimeOrderIds::new();
        let id = ids.next_order_id();
        assert!(id.chars().all(|c| c.is_ascii_digit()), "got {id}");
        // 13-digit millis (until 2286) + 4 + 4.
        assert_eq!(id.len(), 21);
    }

    #[test]
    fn test_time_order_ids_are_distinct() {
        let ids = TimeOrderIds::new();
        let a = ids.next_order_id();
        let b = ids.next_order_id();
        assert_ne!(a, b);
    }
}
