//! Rate-limited work queue with per-key exclusivity.
//!
//! # Responsibilities
//! - Deduplicate pending work by resource key
//! - Hand each key to at most one worker at a time
//! - Track per-key failures and compute retry delays
//!
//! # Design Decisions
//! - A key is `pending` (in `queue` + `dirty`), `processing`, or both
//!   (`processing` + `dirty`: re-queued when `done` is called)
//! - Pending events for a key are handed out in arrival order, one per `get`
//! - Consecutive Add/Update events collapse into the newest; a Delete is
//!   never collapsed, so its snapshot always reaches the reconciler
//! - Mutex-guarded state plus `Notify`; the lock is never held across `.await`

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::Notify;

use crate::controller::event::Event;
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;
use crate::resilience::rate_limit::BucketLimiter;
use crate::resource::ResourceKey;

/// Retry delay policy: the slower of per-key exponential backoff and a
/// queue-wide token bucket.
#[derive(Debug)]
pub struct RateLimiter {
    failures: Mutex<HashMap<ResourceKey, u32>>,
    base_delay_ms: u64,
    max_delay_ms: u64,
    bucket: BucketLimiter,
}

impl RateLimiter {
    pub fn new(base_delay_ms: u64, max_delay_ms: u64, qps: u32, burst: u32) -> Self {
        Self {
            failures: Mutex::new(HashMap::new()),
            base_delay_ms,
            max_delay_ms,
            bucket: BucketLimiter::new(qps, burst),
        }
    }

    /// Record one more failure for `key` and return how long to wait.
    pub fn when(&self, key: &ResourceKey) -> Duration {
        let attempt = {
            let mut failures = lock(&self.failures);
            let count = failures.entry(key.clone()).or_insert(0);
            *count += 1;
            *count
        };
        let item_delay = calculate_backoff(attempt, self.base_delay_ms, self.max_delay_ms);
        item_delay.max(self.bucket.when())
    }

    pub fn num_requeues(&self, key: &ResourceKey) -> u32 {
        lock(&self.failures).get(key).copied().unwrap_or(0)
    }

    pub fn forget(&self, key: &ResourceKey) {
        lock(&self.failures).remove(key);
    }
}

impl Default for RateLimiter {
    /// 5ms doubling up to 1000s per key; 10 qps with a burst of 100 overall.
    fn default() -> Self {
        Self::new(5, 1_000_000, 10, 100)
    }
}

#[derive(Debug, Default)]
struct State {
    /// Keys ready to be handed out, in arrival order.
    queue: VecDeque<ResourceKey>,
    /// Events per key that still need processing, oldest first.
    dirty: HashMap<ResourceKey, VecDeque<Event>>,
    /// Keys currently held by a worker.
    processing: HashSet<ResourceKey>,
    shutting_down: bool,
}

#[derive(Debug)]
struct Inner {
    state: Mutex<State>,
    notify: Notify,
    limiter: RateLimiter,
}

/// Work queue shared by the watch pump and reconciler workers.
///
/// Cloning produces another handle to the same queue.
#[derive(Debug, Clone)]
pub struct WorkQueue {
    inner: Arc<Inner>,
}

impl WorkQueue {
    pub fn new(limiter: RateLimiter) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::default()),
                notify: Notify::new(),
                limiter,
            }),
        }
    }

    /// Enqueue `event`. A key that is already waiting keeps its queue slot.
    pub fn add(&self, event: Event) {
        let mut state = lock(&self.inner.state);
        if state.shutting_down {
            return;
        }

        let key = event.key().clone();
        let already_pending = state.dirty.contains_key(&key);
        push_pending(state.dirty.entry(key.clone()).or_default(), event);
        if already_pending || state.processing.contains(&key) {
            return;
        }

        state.queue.push_back(key);
        metrics::record_queue_depth(state.queue.len());
        drop(state);
        self.inner.notify.notify_one();
    }

    /// Enqueue `event` once `delay` has elapsed.
    pub fn add_after(&self, event: Event, delay: Duration) {
        if delay.is_zero() {
            self.add(event);
            return;
        }
        if self.is_shutting_down() {
            return;
        }

        let queue = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.add(event);
        });
    }

    /// Re-enqueue `event` after the rate limiter's delay for its key.
    pub fn add_rate_limited(&self, event: Event) {
        let delay = self.inner.limiter.when(event.key());
        tracing::debug!(key = %event.key(), delay = ?delay, "Requeue rate limited");
        self.add_after(event, delay);
    }

    /// Wait for the next event. Returns `None` once the queue is shut down and drained.
    ///
    /// The returned event's key stays exclusive to the caller until [`WorkQueue::done`].
    pub async fn get(&self) -> Option<Event> {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = lock(&self.inner.state);
                while let Some(key) = state.queue.pop_front() {
                    if let Some(event) = take_pending(&mut state.dirty, &key) {
                        state.processing.insert(key);
                        let remaining = state.queue.len();
                        metrics::record_queue_depth(remaining);
                        drop(state);
                        if remaining > 0 {
                            self.inner.notify.notify_one();
                        }
                        return Some(event);
                    }
                }
                if state.shutting_down {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Release `key` after processing. Re-queues it if it was re-added meanwhile.
    pub fn done(&self, key: &ResourceKey) {
        let mut state = lock(&self.inner.state);
        state.processing.remove(key);
        if state.dirty.contains_key(key) {
            state.queue.push_back(key.clone());
            metrics::record_queue_depth(state.queue.len());
            drop(state);
            self.inner.notify.notify_one();
        }
    }

    /// Clear the retry history of `key`.
    pub fn forget(&self, key: &ResourceKey) {
        self.inner.limiter.forget(key);
    }

    /// Number of rate-limited requeues recorded for `key`.
    pub fn num_requeues(&self, key: &ResourceKey) -> u32 {
        self.inner.limiter.num_requeues(key)
    }

    /// Number of keys waiting to be handed out.
    pub fn len(&self) -> usize {
        lock(&self.inner.state).queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop accepting work and wake every waiting worker.
    pub fn shutdown(&self) {
        lock(&self.inner.state).shutting_down = true;
        self.inner.notify.notify_waiters();
    }

    pub fn is_shutting_down(&self) -> bool {
        lock(&self.inner.state).shutting_down
    }
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new(RateLimiter::default())
    }
}

/// Append `event`, replacing a trailing Add/Update when `event` is one too.
fn push_pending(pending: &mut VecDeque<Event>, event: Event) {
    let collapses = !matches!(event, Event::Delete(..))
        && matches!(pending.back(), Some(Event::Add(_) | Event::Update(_)));
    if collapses {
        pending.pop_back();
    }
    pending.push_back(event);
}

/// Oldest pending event for `key`. The key stays dirty while more remain.
fn take_pending(dirty: &mut HashMap<ResourceKey, VecDeque<Event>>, key: &ResourceKey) -> Option<Event> {
    let pending = dirty.get_mut(key)?;
    let event = pending.pop_front();
    if pending.is_empty() {
        dirty.remove(key);
    }
    event
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
