//! Concurrent routing table.
//!
//! # Responsibilities
//! - Map RouteKey → RouteTarget for the dispatcher
//! - Accept single-key writes from any reconciler worker
//!
//! # Design Decisions
//! - DashMap shards keys across independent locks; no table-wide lock on the hot path
//! - Cloning the table clones a handle, not the entries

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;

use crate::observability::metrics;
use crate::routing::{RouteKey, RouteTarget};

/// Shared, internally synchronized routing table.
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    inner: Arc<DashMap<RouteKey, RouteTarget>>,
}

impl RoutingTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the target for `key`. Returns the previous target.
    pub fn upsert(&self, key: RouteKey, target: RouteTarget) -> Option<RouteTarget> {
        let previous = self.inner.insert(key, target);
        if previous.is_none() {
            metrics::record_route_count_delta(1.0);
        }
        previous
    }

    /// Remove `key`. Returns the target it mapped to.
    pub fn remove(&self, key: &RouteKey) -> Option<RouteTarget> {
        let removed = self.inner.remove(key).map(|(_, target)| target);
        if removed.is_some() {
            metrics::record_route_count_delta(-1.0);
        }
        removed
    }

    /// Remove `key` only while it still maps to `target`.
    pub fn remove_if_target(&self, key: &RouteKey, target: &RouteTarget) -> bool {
        let removed = self.inner.remove_if(key, |_, current| current == target).is_some();
        if removed {
            metrics::record_route_count_delta(-1.0);
        }
        removed
    }

    /// Look up the target for `key`.
    pub fn lookup(&self, key: &RouteKey) -> Option<RouteTarget> {
        self.inner.get(key).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Point-in-time copy of all entries, ordered by key.
    ///
    /// Not atomic across shards; intended for diagnostics and tests.
    pub fn snapshot(&self) -> BTreeMap<RouteKey, RouteTarget> {
        self.inner
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_operations() {
        let table = RoutingTable::new();
        let key = RouteKey::from("example.com/app");

        assert!(table.lookup(&key).is_none());

        assert!(table.upsert(key.clone(), "backend1.default:8080".into()).is_none());
        assert_eq!(table.lookup(&key), Some("backend1.default:8080".into()));

        // Last write wins
        let previous = table.upsert(key.clone(), "backend2.default:9090".into());
        assert_eq!(previous, Some("backend1.default:8080".into()));
        assert_eq!(table.lookup(&key), Some("backend2.default:9090".into()));
        assert_eq!(table.len(), 1);

        assert!(table.remove(&key).is_some());
        assert!(table.remove(&key).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_remove_if_target() {
        let table = RoutingTable::new();
        let key = RouteKey::from("example.com/app");
        table.upsert(key.clone(), "new.default:80".into());

        assert!(!table.remove_if_target(&key, &"old.default:80".into()));
        assert_eq!(table.lookup(&key), Some("new.default:80".into()));
        assert!(table.remove_if_target(&key, &"new.default:80".into()));
        assert!(table.is_empty());
    }

    #[test]
    fn test_concurrent_writers_and_readers() {
        let table = RoutingTable::new();
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let table = table.clone();
                std::thread::spawn(move || {
                    for i in 0..200 {
                        let key = RouteKey::from(format!("host{}/path{}", t, i).as_str());
                        table.upsert(key.clone(), RouteTarget::new(format!("svc{}.ns:80", t)));
                        assert!(table.lookup(&key).is_some());
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(table.len(), 8 * 200);
    }
}
