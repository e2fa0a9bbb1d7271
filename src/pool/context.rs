//! Shared pool state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, watch};

use crate::worker::{Registry, WorkerId};

const EVENT_CAPACITY: usize = 1024;

/// Lifecycle notifications published by workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkerEvent {
    /// The worker is registered and about to start ticking.
    Started { id: WorkerId, value: i64 },
    /// The worker left its loop; `value` is the last counter it saw.
    Finished { id: WorkerId, value: i64 },
}

impl std::fmt::Display for WorkerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Started { id, value } => {
                write!(f, "Worker (id={id}) was started, init value = {value}")
            }
            Self::Finished { id, value } => {
                write!(f, "Worker (id={id}) was finished, value = {value}")
            }
        }
    }
}

/// State shared by the pool manager, the launcher, and every worker.
///
/// Lives as long as the program; constructed once at startup and torn down
/// by [`WorkerPool::shutdown_all`](crate::pool::WorkerPool::shutdown_all).
pub struct PoolContext {
    registry: Registry,
    /// Pool-wide shutdown flag. Only ever goes false → true.
    shutdown: watch::Sender<bool>,
    next_id: AtomicU64,
    tick_interval: Duration,
    events: broadcast::Sender<WorkerEvent>,
}

impl PoolContext {
    pub fn new(tick_interval: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (shutdown, _) = watch::channel(false);
        Self {
            registry: Registry::new(),
            shutdown,
            next_id: AtomicU64::new(1),
            tick_interval,
            events,
        }
    }

    /// The worker state registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Sleep between two worker ticks; one time unit.
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Allocate a fresh worker id. Ids start at 1 and are never reused.
    pub fn next_worker_id(&self) -> WorkerId {
        WorkerId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Whether the pool-wide shutdown flag is raised.
    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Raise the pool-wide shutdown flag and wake every
    /// [`shutdown_requested`](Self::shutdown_requested) waiter. Returns `true`
    /// if it was already set.
    pub fn begin_shutdown(&self) -> bool {
        self.shutdown.send_replace(true)
    }

    /// Resolves once the shutdown flag is raised, immediately if it already is.
    pub async fn shutdown_requested(&self) {
        let mut rx = self.shutdown.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = rx.wait_for(|closed| *closed).await;
    }

    /// New receiver for worker lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<WorkerEvent> {
        self.events.subscribe()
    }

    /// Publish an event. Having no subscribers is fine.
    pub fn emit(&self, event: WorkerEvent) {
        let _ = self.events.send(event);
    }
}
