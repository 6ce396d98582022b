//! Watch sources: where resource changes come from.
//!
//! # Data Flow
//! ```text
//! cluster state (list + watch)
//!     → kubernetes.rs (KubeWatchSource: local cache + events)
//!     → subscribe() stream of Event
//!     → controller pump → work queue
//!
//! reconciler
//!     → get_by_key() against the same local cache
//! ```
//!
//! # Design Decisions
//! - The controller only sees the narrow `WatchSource` trait
//! - Delete events carry an owned snapshot; the cache entry is already gone
//! - `has_synced` flips once, after the initial listing has been cached

pub mod kubernetes;
pub mod memory;

use std::sync::Arc;

use futures_util::stream::BoxStream;

use crate::controller::event::Event;
use crate::resource::{ResourceKey, RuleObject};

pub use self::kubernetes::KubeWatchSource;
pub use self::memory::MemoryWatchSource;

/// Error raised by a watch source.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// Reading the local cache failed.
    #[error("cache lookup for {key} failed: {reason}")]
    Lookup { key: ResourceKey, reason: String },

    /// Connecting to the cluster failed.
    #[error("client setup failed: {0}")]
    Client(String),

    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),
}

/// Source of resource change notifications backed by a local cache.
pub trait WatchSource: Send + Sync + 'static {
    /// Start delivery. The stream yields events until the source stops;
    /// polling it is what keeps the cache up to date.
    fn subscribe(self: Arc<Self>) -> BoxStream<'static, Event>;

    /// Current cached state of `key`, `None` when it is not in the cache.
    fn get_by_key(&self, key: &ResourceKey) -> Result<Option<RuleObject>, WatchError>;

    /// Whether the initial state has been fully cached.
    fn has_synced(&self) -> bool;
}
