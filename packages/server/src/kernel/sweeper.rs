//! Recovery sweeper.
//!
//! A worker can crash after committing status transitions but before the
//! consequent queue enqueues. The sweeper closes that gap: every interval it
//! scans for live deployments (PENDING or PREEMPTED) that have no queued or
//! leased scheduling job and re-enqueues them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tracing::{error, info, warn};

use crate::common::SchedulerError;
use crate::kernel::queue::SchedulingQueue;

pub struct RecoverySweeper {
    pool: PgPool,
    queue: SchedulingQueue,
    interval: Duration,
    shutdown: Arc<AtomicBool>,
}

impl RecoverySweeper {
    pub fn new(pool: PgPool, queue: SchedulingQueue, interval: Duration) -> Self {
        Self {
            pool,
            queue,
            interval,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Run the sweep loop until shutdown is requested. The first sweep runs
    /// immediately so worker restarts recover promptly.
    pub async fn run(self) -> Result<(), SchedulerError> {
        info!(interval_ms = self.interval.as_millis() as u64, "recovery sweeper starting");

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }

            match self.sweep_once().await {
                Ok(0) => {}
                Ok(recovered) => {
                    warn!(recovered, "sweeper re-enqueued orphaned deployments");
                }
                Err(e) => {
                    error!(error = %e, "sweep failed");
                }
            }

            tokio::time::sleep(self.interval).await;
        }

        info!("recovery sweeper stopped");
        Ok(())
    }

    /// One reconciliation pass. Returns how many deployments were enqueued.
    pub async fn sweep_once(&self) -> Result<u64, SchedulerError> {
        let orphaned = sqlx::query_as::<_, (i64, i32)>(
            r#"
            SELECT d.id, d.attempt_count
            FROM deployments d
            WHERE d.status IN ('pending', 'preempted')
              AND NOT EXISTS (
                  SELECT 1 FROM scheduling_jobs j
                  WHERE j.deployment_id = d.id
                    AND j.status IN ('queued', 'leased')
              )
            ORDER BY d.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut recovered = 0;
        for (deployment_id, attempt_count) in orphaned {
            self.queue.enqueue(deployment_id, attempt_count).await?;
            recovered += 1;
        }

        Ok(recovered)
    }
}
