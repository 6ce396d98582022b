//! In-process watch source.
//!
//! Objects are pushed in directly with [`MemoryWatchSource::apply`] and
//! [`MemoryWatchSource::delete`]. Useful for embedding the gateway with a
//! different rule store, and for tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use futures_util::stream::{self, BoxStream};
use tokio::sync::mpsc;

use crate::controller::event::Event;
use crate::resource::{ResourceKey, RuleObject};
use crate::watch::{WatchError, WatchSource};

#[derive(Debug)]
pub struct MemoryWatchSource {
    cache: DashMap<ResourceKey, RuleObject>,
    synced: AtomicBool,
    tx: mpsc::UnboundedSender<Event>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<Event>>>,
}

impl MemoryWatchSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            cache: DashMap::new(),
            synced: AtomicBool::new(false),
            tx,
            rx: Mutex::new(Some(rx)),
        }
    }

    /// Store `obj` and emit `Add` (new key) or `Update` (known key).
    pub fn apply(&self, obj: RuleObject) -> Event {
        let key = obj.key();
        let event = match self.cache.insert(key.clone(), obj) {
            Some(_) => Event::Update(key),
            None => Event::Add(key),
        };
        self.emit(event.clone());
        event
    }

    /// Drop `key` from the cache and emit `Delete` with its last state.
    pub fn delete(&self, key: &ResourceKey) -> Option<Event> {
        let (_, snapshot) = self.cache.remove(key)?;
        let event = Event::Delete(key.clone(), snapshot);
        self.emit(event.clone());
        Some(event)
    }

    /// Mark the initial state as complete.
    pub fn mark_synced(&self) {
        self.synced.store(true, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    fn emit(&self, event: Event) {
        // No receiver left means nobody is subscribed any more.
        let _ = self.tx.send(event);
    }
}

impl Default for MemoryWatchSource {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchSource for MemoryWatchSource {
    /// Single subscriber; a second call yields an empty stream.
    fn subscribe(self: Arc<Self>) -> BoxStream<'static, Event> {
        let rx = self.rx.lock().unwrap_or_else(|e| e.into_inner()).take();
        match rx {
            Some(rx) => Box::pin(stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|event| (event, rx))
            })),
            None => {
                tracing::warn!("MemoryWatchSource already subscribed");
                Box::pin(stream::empty())
            }
        }
    }

    fn get_by_key(&self, key: &ResourceKey) -> Result<Option<RuleObject>, WatchError> {
        Ok(self.cache.get(key).map(|entry| entry.value().clone()))
    }

    fn has_synced(&self) -> bool {
        self.synced.load(Ordering::SeqCst)
    }
}
