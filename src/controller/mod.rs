//! Controller subsystem: watch events in, routing table out.
//!
//! # Data Flow
//! ```text
//! WatchSource::subscribe() ──pump──▶ queue.rs (dedup, per-key exclusivity)
//!                                        │
//!                          N workers: get → reconcile → forget | requeue → done
//!                                        │
//!                                        ▼
//!                              reconciler.rs ──▶ RoutingTable
//! ```
//!
//! # Design Decisions
//! - Workers start only after the watch source reports its cache synced
//! - Retry policy lives here, not in the queue: `max_retries` rate-limited
//!   requeues, then the key is forgotten and the error logged
//! - Shutdown closes the queue; workers drain what is queued and exit

pub mod event;
pub mod queue;
pub mod reconciler;

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinSet;

use crate::config::ControllerConfig;
use crate::observability::metrics;
use crate::routing::RoutingTable;
use crate::watch::WatchSource;

pub use event::{Event, EventKind};
pub use queue::{RateLimiter, WorkQueue};
pub use reconciler::{Outcome, ReconcileError, Reconciler};

/// Fatal controller errors. Per-event failures never surface here.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("timed out after {0:?} waiting for caches to sync")]
    CacheSyncTimeout(Duration),

    #[error("stopped before caches synced")]
    Stopped,
}

const SYNC_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Runs reconciler workers over the work queue.
pub struct Controller<S: WatchSource> {
    source: Arc<S>,
    queue: WorkQueue,
    reconciler: Arc<Reconciler<S>>,
    workers: usize,
    max_retries: u32,
    cache_sync_timeout: Duration,
    ready: watch::Sender<bool>,
}

impl<S: WatchSource> Controller<S> {
    pub fn new(source: Arc<S>, table: RoutingTable, config: &ControllerConfig) -> Self {
        let reconciler = Reconciler::new(source.clone(), table, config.ingress_class.clone())
            .with_pruning(config.prune_on_update);
        let queue = WorkQueue::new(RateLimiter::new(
            config.base_delay_ms,
            config.max_delay_ms,
            config.queue_qps,
            config.queue_burst,
        ));
        let (ready, _) = watch::channel(false);

        Self {
            source,
            queue,
            reconciler: Arc::new(reconciler),
            workers: config.workers.max(1),
            max_retries: config.max_retries,
            cache_sync_timeout: Duration::from_secs(config.cache_sync_timeout_secs),
            ready,
        }
    }

    pub fn queue(&self) -> &WorkQueue {
        &self.queue
    }

    pub fn table(&self) -> &RoutingTable {
        self.reconciler.table()
    }

    /// Flips to `true` once caches are synced and workers are running.
    pub fn subscribe_ready(&self) -> watch::Receiver<bool> {
        self.ready.subscribe()
    }

    /// Start the watch pump, wait for cache sync, run workers until `shutdown` fires.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) -> Result<(), ControllerError> {
        tracing::info!(
            workers = self.workers,
            ingress_class = %self.reconciler.ingress_class(),
            "Starting controller"
        );

        let pump = tokio::spawn(pump_events(self.source.clone(), self.queue.clone()));

        let synced = tokio::select! {
            result = self.wait_for_cache_sync() => result,
            _ = shutdown.recv() => Err(ControllerError::Stopped),
        };
        if let Err(e) = synced {
            tracing::error!(error = %e, "Controller not started");
            pump.abort();
            self.queue.shutdown();
            return Err(e);
        }

        let mut workers = JoinSet::new();
        for id in 0..self.workers {
            let worker = Worker {
                id,
                queue: self.queue.clone(),
                reconciler: self.reconciler.clone(),
                max_retries: self.max_retries,
            };
            workers.spawn(worker.run());
        }
        self.ready.send_replace(true);
        tracing::info!(workers = self.workers, "Controller workers started");

        // A closed channel counts as a stop signal too.
        let _ = shutdown.recv().await;
        tracing::info!("Stopping controller");

        self.queue.shutdown();
        pump.abort();
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Controller worker panicked");
            }
        }

        self.ready.send_replace(false);
        tracing::info!("Controller stopped");
        Ok(())
    }

    async fn wait_for_cache_sync(&self) -> Result<(), ControllerError> {
        let poll = async {
            let mut ticker = tokio::time::interval(SYNC_POLL_INTERVAL);
            loop {
                ticker.tick().await;
                if self.source.has_synced() {
                    return;
                }
            }
        };

        tokio::time::timeout(self.cache_sync_timeout, poll)
            .await
            .map_err(|_| ControllerError::CacheSyncTimeout(self.cache_sync_timeout))?;
        tracing::info!("Caches synced");
        Ok(())
    }
}

/// Forward every event from the watch source into the queue.
async fn pump_events<S: WatchSource>(source: Arc<S>, queue: WorkQueue) {
    let mut events = source.subscribe();
    while let Some(event) = events.next().await {
        tracing::debug!(resource = %event.key(), event = %event.kind(), "Queueing event");
        queue.add(event);
    }
    tracing::warn!("Watch stream ended");
}

struct Worker<S: WatchSource> {
    id: usize,
    queue: WorkQueue,
    reconciler: Arc<Reconciler<S>>,
    max_retries: u32,
}

impl<S: WatchSource> Worker<S> {
    async fn run(self) {
        tracing::debug!(worker = self.id, "Worker started");
        while self.process_next_item().await {}
        tracing::debug!(worker = self.id, "Worker exiting");
    }

    /// Returns false once the queue is shut down and drained.
    async fn process_next_item(&self) -> bool {
        let Some(event) = self.queue.get().await else {
            return false;
        };

        let key = event.key().clone();
        match self.reconciler.reconcile(&event) {
            Ok(outcome) => {
                metrics::record_reconcile(event.kind().as_str(), outcome.as_str());
                self.queue.forget(&key);
            }
            Err(e) => {
                metrics::record_reconcile(event.kind().as_str(), "error");
                let requeues = self.queue.num_requeues(&key);
                if requeues < self.max_retries {
                    tracing::warn!(worker = self.id, resource = %key, attempt = requeues + 1, error = %e, "Error syncing resource, retrying");
                    self.queue.add_rate_limited(event);
                } else {
                    self.queue.forget(&key);
                    metrics::record_reconcile_dropped();
                    tracing::error!(worker = self.id, resource = %key, retries = requeues, error = %e, "Dropping resource out of the queue");
                }
            }
        }

        self.queue.done(&key);
        true
    }
}
