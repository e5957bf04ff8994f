//! In-memory projection of open batch groups
//!
//! Purely observational: the durable `batch_group_items` table is the source
//! of truth and every flush decision re-reads it. The projection tracks how
//! many orders each warehouse has waiting so the service can report activity
//! without a query. The mutex is never held across await points.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone)]
struct GroupEntry {
    orders: u64,
    updated_at: DateTime<Utc>,
}

/// Thread-safe projection of open groups keyed by warehouse
#[derive(Default)]
pub struct GroupsCache {
    inner: Mutex<HashMap<String, GroupEntry>>,
}

impl GroupsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one order added to a warehouse's group
    pub fn touch(&self, warehouse_id: &str) {
        let mut groups = self.inner.lock().unwrap();
        let entry = groups.entry(warehouse_id.to_string()).or_insert(GroupEntry {
            orders: 0,
            updated_at: Utc::now(),
        });
        entry.orders += 1;
        entry.updated_at = Utc::now();
    }

    /// Drop a group after its flush commits
    pub fn clear(&self, warehouse_id: &str) {
        let mut groups = self.inner.lock().unwrap();
        groups.remove(warehouse_id);
    }

    /// Number of currently open groups
    pub fn active_groups(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    /// Orders tracked for one warehouse; zero when untracked (e.g. after
    /// restart)
    pub fn order_count(&self, warehouse_id: &str) -> u64 {
        let groups = self.inner.lock().unwrap();
        groups.get(warehouse_id).map(|e| e.orders).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touch_and_clear() {
        let cache = GroupsCache::new();
        assert_eq!(cache.active_groups(), 0);

        cache.touch("wh-1");
        cache.touch("wh-1");
        cache.touch("wh-2");

        assert_eq!(cache.active_groups(), 2);
        assert_eq!(cache.order_count("wh-1"), 2);
        assert_eq!(cache.order_count("wh-2"), 1);

        cache.clear("wh-1");
        assert_eq!(cache.active_groups(), 1);
        assert_eq!(cache.order_count("wh-1"), 0);
    }
}
