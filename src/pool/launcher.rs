//! Startup launcher: populates the pool at a throttled rate.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::error::PoolError;
use crate::pool::manager::WorkerPool;

/// Spawn the one-shot launcher task.
///
/// Starts `count` workers with `delay` between consecutive spawns and no
/// delay after the last one. Stops early once the pool begins shutting down,
/// including in the middle of a delay. Resolves to the number of workers actually started.
pub fn spawn_launcher(pool: Arc<WorkerPool>, count: usize, delay: Duration) -> JoinHandle<usize> {
    tokio::spawn(async move {
        tracing::info!(count, delay_ms = delay.as_millis() as u64, "Launcher started");

        let mut started = 0;
        for i in 0..count {
            if pool.is_closed() {
                break;
            }
            match pool.spawn(None).await {
                Ok(_) => started += 1,
                Err(PoolError::PoolClosed) => break,
                Err(e) => tracing::error!("Launcher failed to spawn worker: {e}"),
            }
            if i + 1 < count {
                tokio::select! {
                    () = tokio::time::sleep(delay) => {}
                    () = pool.context().shutdown_requested() => break,
                }
            }
        }

        tracing::info!(started, "Launcher finished");
        started
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::context::PoolContext;

    fn pool() -> Arc<WorkerPool> {
        let ctx = Arc::new(PoolContext::new(Duration::from_secs(1)));
        Arc::new(WorkerPool::new(ctx))
    }

    #[tokio::test(start_paused = true)]
    async fn launches_all_workers() {
        let pool = pool();
        let started = spawn_launcher(Arc::clone(&pool), 3, Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(started, 3);
        assert_eq!(pool.len().await, 3);
        pool.shutdown_all().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn no_delay_after_last_spawn() {
        let pool = pool();
        let begin = tokio::time::Instant::now();
        spawn_launcher(Arc::clone(&pool), 3, Duration::from_secs(5))
            .await
            .unwrap();

        let elapsed = begin.elapsed();
        assert!(elapsed >= Duration::from_secs(10));
        assert!(elapsed < Duration::from_secs(15));
        pool.shutdown_all().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn zero_workers() {
        let pool = pool();
        let started = spawn_launcher(Arc::clone(&pool), 0, Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(started, 0);
        assert!(pool.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn aborts_when_pool_shuts_down() {
        let pool = pool();
        let launcher = spawn_launcher(Arc::clone(&pool), 10, Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(15)).await;
        pool.shutdown_all().await.unwrap();

        let started = launcher.await.unwrap();
        assert_eq!(started, 2);
        assert!(pool.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_interrupts_a_long_delay() {
        let pool = pool();
        let launcher = spawn_launcher(Arc::clone(&pool), 5, Duration::from_secs(3600));

        tokio::time::sleep(Duration::from_secs(1)).await;
        pool.shutdown_all().await.unwrap();
        let stopped_at = tokio::time::Instant::now();

        let started = launcher.await.unwrap();
        assert!(stopped_at.elapsed() < Duration::from_secs(1));
        assert_eq!(started, 1);
    }
}
