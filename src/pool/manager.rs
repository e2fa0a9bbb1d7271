//! Pool manager: owns the running worker handles.
//!
//! This module defines [`WorkerPool`], which creates workers, reports on
//! them, and terminates them individually or all at once.
//!
//! ## Lock order
//!
//! Two locks exist: the slot map below and the registry lock inside
//! [`PoolContext`]. They are always taken slot map first, registry second,
//! and neither is held while awaiting a worker's [`JoinHandle`].
//!
//! ## Removal
//!
//! Exactly one caller joins each worker: whoever takes the handle out of its
//! slot. That caller removes the registry record, then the slot, then raises
//! the slot's `removed` flag. Any other caller that finds the handle already
//! taken waits on that flag, so every `kill` and `shutdown_all` returns only
//! after the worker is gone from both the slot map and the registry.

use std::collections::BTreeMap;
use std::sync::Arc;

use rand::Rng;
use tokio::sync::{Mutex, watch};
use tokio::task::{JoinError, JoinHandle};

use crate::error::PoolError;
use crate::pool::context::PoolContext;
use crate::worker::{WorkerId, WorkerInfo, WorkerLifecycle, worker_loop};

/// A running worker as seen by the pool.
struct WorkerSlot {
    /// Taken by the one caller that joins the worker.
    handle: Option<JoinHandle<WorkerLifecycle>>,
    /// Raised after the worker is joined and removed everywhere.
    removed: watch::Sender<bool>,
}

/// What a stopping caller must do for a given slot.
enum StopTicket {
    /// This caller owns the join and the removal.
    Join(JoinHandle<WorkerLifecycle>),
    /// Someone else does; wait for their removal to finish.
    Wait(watch::Receiver<bool>),
}

impl WorkerSlot {
    fn new(handle: JoinHandle<WorkerLifecycle>) -> Self {
        let (removed, _) = watch::channel(false);
        Self {
            handle: Some(handle),
            removed,
        }
    }

    fn begin_stop(&mut self) -> StopTicket {
        match self.handle.take() {
            Some(handle) => StopTicket::Join(handle),
            None => StopTicket::Wait(self.removed.subscribe()),
        }
    }
}

/// Supervises an unbounded set of counter workers.
pub struct WorkerPool {
    ctx: Arc<PoolContext>,
    slots: Mutex<BTreeMap<WorkerId, WorkerSlot>>,
}

impl WorkerPool {
    /// Create an empty pool over a shared context.
    pub fn new(ctx: Arc<PoolContext>) -> Self {
        Self {
            ctx,
            slots: Mutex::new(BTreeMap::new()),
        }
    }

    /// The shared pool context.
    pub fn context(&self) -> &Arc<PoolContext> {
        &self.ctx
    }

    /// Start a new worker and return its id without waiting for it to run.
    ///
    /// The worker's record is registered before its task starts. Without an
    /// `initial_value` the counter starts at a random non-negative value.
    ///
    /// # Errors
    ///
    /// - [`PoolError::PoolClosed`] once [`shutdown_all`](Self::shutdown_all) has begun.
    /// - [`PoolError::Registry`] if the fresh id is somehow already registered.
    pub async fn spawn(&self, initial_value: Option<i64>) -> Result<WorkerId, PoolError> {
        let mut slots = self.slots.lock().await;
        // Checked under the slot lock so shutdown_all cannot miss this worker.
        if self.ctx.is_shutting_down() {
            return Err(PoolError::PoolClosed);
        }

        let value = initial_value.unwrap_or_else(random_initial_value);
        let id = self.ctx.next_worker_id();
        self.ctx.registry().insert(id, value).await?;

        let handle = tokio::spawn(worker_loop(Arc::clone(&self.ctx), id, value));
        slots.insert(id, WorkerSlot::new(handle));

        tracing::info!(worker_id = %id, value, "Spawned worker");
        Ok(id)
    }

    /// Current `(id, value)` of every registered worker still in the pool,
    /// ordered by id. A worker being killed is listed until it is joined.
    pub async fn info(&self) -> Vec<WorkerInfo> {
        let slots = self.slots.lock().await;
        self.ctx
            .registry()
            .snapshot()
            .await
            .into_iter()
            .filter(|w| slots.contains_key(&w.id))
            .collect()
    }

    /// Stop a worker, wait for it to exit, and forget it.
    ///
    /// Returns `Ok(false)` for an unknown id, and also when another caller
    /// was already stopping the worker; in that case this call still waits
    /// until that caller has finished removing it. Once this returns the
    /// worker's task has finished and the id is gone from both the slot map
    /// and the registry.
    ///
    /// # Errors
    ///
    /// [`PoolError::WorkerPanicked`] if the task panicked. The worker is still
    /// removed.
    pub async fn kill(&self, id: WorkerId) -> Result<bool, PoolError> {
        let ticket = {
            let mut slots = self.slots.lock().await;
            let Some(slot) = slots.get_mut(&id) else {
                tracing::debug!(worker_id = %id, "Kill requested for unknown worker");
                return Ok(false);
            };
            self.ctx.registry().mark_killed(id).await;
            slot.begin_stop()
        };

        let handle = match ticket {
            StopTicket::Join(handle) => handle,
            StopTicket::Wait(removed) => {
                wait_removed(removed).await;
                return Ok(false);
            }
        };

        let joined = handle.await;
        self.finish_removal(id).await;

        match joined {
            Ok(lifecycle) => {
                tracing::info!(
                    worker_id = %id,
                    reason = ?lifecycle.stop_reason,
                    "Killed worker"
                );
                Ok(true)
            }
            Err(e) => Err(join_failure(id, e)),
        }
    }

    /// Overwrite a worker's counter. Returns `false` for an unknown id.
    pub async fn reset(&self, id: WorkerId, value: i64) -> bool {
        let found = self.ctx.registry().set_value(id, value).await;
        if found {
            tracing::info!(worker_id = %id, value, "Reset worker");
        }
        found
    }

    /// Stop every worker and close the pool.
    ///
    /// Raises the shutdown flag, joins every running worker (each exits
    /// within one tick interval), removes them, and waits for any worker a
    /// concurrent [`kill`](Self::kill) is already stopping. Further
    /// [`spawn`](Self::spawn) calls fail with [`PoolError::PoolClosed`].
    /// Calling this again is harmless.
    ///
    /// # Errors
    ///
    /// Returns the first [`PoolError::WorkerPanicked`] seen; all workers are
    /// joined and removed regardless.
    pub async fn shutdown_all(&self) -> Result<(), PoolError> {
        if self.ctx.begin_shutdown() {
            tracing::debug!("Pool already shutting down");
        }

        let mut joins = Vec::new();
        let mut pending = Vec::new();
        {
            let mut slots = self.slots.lock().await;
            for (id, slot) in slots.iter_mut() {
                match slot.begin_stop() {
                    StopTicket::Join(handle) => joins.push((*id, handle)),
                    StopTicket::Wait(removed) => pending.push(removed),
                }
            }
        }
        tracing::info!("Stopping {} workers", joins.len() + pending.len());

        let joins = joins.into_iter().map(|(id, handle)| async move {
            let joined = handle.await;
            self.finish_removal(id).await;
            (id, joined)
        });
        let results = futures::future::join_all(joins).await;
        futures::future::join_all(pending.into_iter().map(wait_removed)).await;

        let mut first_error = None;
        for (id, result) in results {
            if let Err(e) = result {
                let err = join_failure(id, e);
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }

        tracing::info!("Worker pool shutdown complete");
        first_error.map_or(Ok(()), Err)
    }

    /// Number of workers in the pool, including any being stopped.
    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    /// Whether the pool holds no workers.
    pub async fn is_empty(&self) -> bool {
        self.slots.lock().await.is_empty()
    }

    /// Whether shutdown has begun; no further spawns are accepted.
    pub fn is_closed(&self) -> bool {
        self.ctx.is_shutting_down()
    }

    /// Drop a joined worker's record and slot, then wake anyone waiting on it.
    async fn finish_removal(&self, id: WorkerId) {
        self.ctx.registry().remove(id).await;
        if let Some(slot) = self.slots.lock().await.remove(&id) {
            slot.removed.send_replace(true);
        }
    }
}

async fn wait_removed(mut removed: watch::Receiver<bool>) {
    // A closed channel means the slot is already gone.
    let _ = removed.wait_for(|done| *done).await;
}

fn join_failure(id: WorkerId, e: JoinError) -> PoolError {
    tracing::error!(worker_id = %id, "Worker task failed: {e}");
    PoolError::WorkerPanicked { id }
}

/// Random seed for workers started without an explicit value.
pub fn random_initial_value() -> i64 {
    rand::thread_rng().gen_range(0..=i64::from(i32::MAX))
}
