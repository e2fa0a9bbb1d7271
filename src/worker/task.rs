//! Worker task loop.

use std::sync::Arc;

use crate::pool::context::{PoolContext, WorkerEvent};
use crate::worker::WorkerId;
use crate::worker::registry::TickOutcome;
use crate::worker::state::{StopReason, WorkerLifecycle, WorkerState};

/// Body of a worker task.
///
/// The worker's record must already be registered under `id`. Each iteration
/// first checks the pool-wide shutdown flag, then sleeps one tick interval and
/// advances its counter through [`Registry::tick`]. A kill request, a shutdown,
/// or a missing record moves the worker to `Stopping`; it then emits a
/// finish event and returns its lifecycle. Removing the record is left to
/// whoever joins the task.
///
/// [`Registry::tick`]: crate::worker::Registry::tick
pub async fn worker_loop(
    ctx: Arc<PoolContext>,
    id: WorkerId,
    initial_value: i64,
) -> WorkerLifecycle {
    let mut lifecycle = WorkerLifecycle::new(id);
    let mut value = initial_value;

    tracing::debug!(worker_id = %id, value, "Worker started");
    ctx.emit(WorkerEvent::Started { id, value });

    let reason = if ctx.is_shutting_down() {
        StopReason::Shutdown
    } else {
        advance(&mut lifecycle, WorkerState::Running);
        loop {
            if ctx.is_shutting_down() {
                break StopReason::Shutdown;
            }
            tokio::time::sleep(ctx.tick_interval()).await;
            match ctx.registry().tick(id).await {
                TickOutcome::Advanced(v) => value = v,
                TickOutcome::Killed(v) => {
                    value = v;
                    break StopReason::Killed;
                }
                TickOutcome::Missing => break StopReason::RecordMissing,
            }
        }
    };

    if let Err(e) = lifecycle.stop(reason) {
        tracing::warn!(worker_id = %id, "{e}");
    }
    tracing::debug!(worker_id = %id, value, ?reason, "Worker finished");
    ctx.emit(WorkerEvent::Finished { id, value });

    advance(&mut lifecycle, WorkerState::Terminated);
    lifecycle
}

fn advance(lifecycle: &mut WorkerLifecycle, state: WorkerState) {
    if let Err(e) = lifecycle.transition_to(state) {
        tracing::warn!(worker_id = %lifecycle.id, "{e}");
    }
}
