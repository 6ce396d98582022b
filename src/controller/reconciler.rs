//! Reconciliation: one event in, routing table mutations out.
//!
//! # Responsibilities
//! - Resolve the object an event refers to (cache lookup or delete snapshot)
//! - Filter by ingress class
//! - Compute the entries the object contributes and apply them
//!
//! # Design Decisions
//! - Only cache lookups can fail; every other outcome is success
//! - Upserts overwrite; a key contributed by two objects belongs to the last one applied
//! - Update does not remove entries an earlier revision contributed unless
//!   pruning is enabled, in which case the last applied entry set is remembered

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use dashmap::DashMap;

use crate::controller::event::Event;
use crate::resource::{ResourceKey, RuleObject};
use crate::routing::{RouteKey, RouteTarget, RoutingTable};
use crate::watch::{WatchError, WatchSource};

/// Reconciliation failure. Always retryable.
#[derive(Debug, thiserror::Error)]
#[error("reconciling {key}: {source}")]
pub struct ReconcileError {
    pub key: ResourceKey,
    #[source]
    pub source: WatchError,
}

/// What a successful reconciliation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Entries were upserted (and, with pruning, stale ones removed).
    Applied { upserted: usize, pruned: usize },
    /// Entries were removed for a deleted object.
    Removed { removed: usize },
    /// Object belongs to another class (or has none).
    Ignored,
    /// Object left the cache before it could be processed.
    Vanished,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Applied { .. } => "applied",
            Outcome::Removed { .. } => "removed",
            Outcome::Ignored => "ignored",
            Outcome::Vanished => "vanished",
        }
    }
}

/// Entry set contributed by one object, ordered by key.
pub type Contribution = BTreeMap<RouteKey, RouteTarget>;

/// Entries `obj` contributes: `host + path → service.namespace:port` for
/// every path under a non-empty host. Later paths win on duplicate keys.
pub fn contributed_entries(obj: &RuleObject) -> Contribution {
    let mut entries = Contribution::new();
    for rule in &obj.rules {
        if rule.host.is_empty() {
            tracing::debug!(resource = %obj.key(), paths = rule.paths.len(), "Skipping rule without host");
            continue;
        }
        for path in &rule.paths {
            entries.insert(
                RouteKey::from_rule(&rule.host, &path.path),
                RouteTarget::for_service(&path.service_name, &obj.namespace, path.service_port),
            );
        }
    }
    entries
}

/// Applies events to the routing table.
pub struct Reconciler<S: WatchSource> {
    source: Arc<S>,
    table: RoutingTable,
    ingress_class: String,
    /// Last applied contribution per object; only tracked when pruning.
    applied: Option<DashMap<ResourceKey, Contribution>>,
}

impl<S: WatchSource> Reconciler<S> {
    pub fn new(source: Arc<S>, table: RoutingTable, ingress_class: impl Into<String>) -> Self {
        Self {
            source,
            table,
            ingress_class: ingress_class.into(),
            applied: None,
        }
    }

    /// Remove entries that an object's previous revision contributed and its current one does not.
    pub fn with_pruning(mut self, enabled: bool) -> Self {
        self.applied = enabled.then(DashMap::new);
        self
    }

    pub fn table(&self) -> &RoutingTable {
        &self.table
    }

    pub fn ingress_class(&self) -> &str {
        &self.ingress_class
    }

    /// Reconcile one event against the routing table.
    pub fn reconcile(&self, event: &Event) -> Result<Outcome, ReconcileError> {
        let key = event.key();

        let current;
        let obj = match event {
            Event::Delete(_, snapshot) => snapshot,
            Event::Add(_) | Event::Update(_) => {
                current = self
                    .source
                    .get_by_key(key)
                    .map_err(|source| ReconcileError { key: key.clone(), source })?;
                match &current {
                    Some(obj) => obj,
                    None => {
                        tracing::debug!(resource = %key, event = %event.kind(), "Object no longer cached");
                        return Ok(Outcome::Vanished);
                    }
                }
            }
        };

        if !obj.has_class(&self.ingress_class) {
            tracing::info!(
                resource = %key,
                class = ?obj.class_name,
                expected = %self.ingress_class,
                "Ignoring resource for another class"
            );
            return Ok(Outcome::Ignored);
        }

        let entries = contributed_entries(obj);

        let outcome = match event {
            Event::Delete(..) => {
                let removed = entries.keys().filter(|k| self.table.remove(k).is_some()).count();
                if let Some(applied) = &self.applied {
                    applied.remove(key);
                }
                Outcome::Removed { removed }
            }
            Event::Add(_) | Event::Update(_) => {
                let pruned = self.prune_stale(key, &entries);
                for (route, target) in &entries {
                    self.table.upsert(route.clone(), target.clone());
                }
                Outcome::Applied {
                    upserted: entries.len(),
                    pruned,
                }
            }
        };

        tracing::info!(
            resource = %key,
            event = %event.kind(),
            entries = ?entries,
            outcome = ?outcome,
            "Reconciled"
        );
        Ok(outcome)
    }

    /// Drop routes the previous revision of `key` installed that `current` no longer has.
    fn prune_stale(&self, key: &ResourceKey, current: &Contribution) -> usize {
        let Some(applied) = &self.applied else {
            return 0;
        };

        let previous = applied.insert(key.clone(), current.clone()).unwrap_or_default();
        let kept: HashSet<&RouteKey> = current.keys().collect();
        previous
            .iter()
            .filter(|(route, _)| !kept.contains(route))
            .filter(|(route, target)| self.table.remove_if_target(route, target))
            .count()
    }
}
