//! Postgres-backed scheduling queue.
//!
//! One row per queued scheduling job. The main FIFO queue is the set of
//! `queued` rows whose `run_at` is NULL or due; the delayed queue is the
//! same set with a future `run_at` (due-time promotion happens in the
//! reserve query's predicate, so no separate mover process exists).
//! Reserved jobs become `leased` with a visibility timeout; a lease that
//! expires un-acked is reclaimed by the next reserve, which is what makes
//! delivery at-least-once. `finished` and `failed` rows are the terminal
//! registries; the currently-leased rows are the started registry.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tracing::debug;

use crate::common::SchedulerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::Type)]
#[sqlx(type_name = "sched_job_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SchedJobStatus {
    Queued,
    Leased,
    Finished,
    Failed,
}

/// A scheduling job. The deployment id is the sole source of truth; the
/// worker re-reads everything else from the store. `attempt` is carried as
/// an observability hint.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct SchedulingJob {
    pub id: i64,
    pub deployment_id: i64,
    pub status: SchedJobStatus,
    pub attempt: i32,
    pub run_at: Option<DateTime<Utc>>,
    pub lease_expires_at: Option<DateTime<Utc>>,
    pub worker_id: Option<String>,
    pub enqueued_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of an enqueue that handles the one-live-job-per-deployment rule.
#[derive(Debug, Clone)]
pub enum EnqueueOutcome {
    /// A new job row was created.
    Created(i64),
    /// A live (queued or leased) job already exists for this deployment.
    Duplicate(i64),
}

impl EnqueueOutcome {
    pub fn job_id(&self) -> i64 {
        match self {
            EnqueueOutcome::Created(id) | EnqueueOutcome::Duplicate(id) => *id,
        }
    }
}

/// Queue depth counts for the operational surface.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct QueueDepths {
    pub queued: i64,
    pub leased: i64,
    pub finished: i64,
    pub failed: i64,
}

/// Handle to the scheduling queue.
#[derive(Clone)]
pub struct SchedulingQueue {
    pool: PgPool,
    visibility: Duration,
}

impl SchedulingQueue {
    pub fn new(pool: PgPool, visibility: Duration) -> Self {
        Self { pool, visibility }
    }

    /// Enqueue a deployment for immediate scheduling.
    pub async fn enqueue(
        &self,
        deployment_id: i64,
        attempt: i32,
    ) -> Result<EnqueueOutcome, SchedulerError> {
        self.enqueue_inner(deployment_id, attempt, None).await
    }

    /// Enqueue a deployment onto the delayed queue.
    pub async fn enqueue_after(
        &self,
        deployment_id: i64,
        attempt: i32,
        delay: Duration,
    ) -> Result<EnqueueOutcome, SchedulerError> {
        let run_at = Utc::now() + chrono::Duration::from_std(delay).unwrap_or_default();
        self.enqueue_inner(deployment_id, attempt, Some(run_at)).await
    }

    async fn enqueue_inner(
        &self,
        deployment_id: i64,
        attempt: i32,
        run_at: Option<DateTime<Utc>>,
    ) -> Result<EnqueueOutcome, SchedulerError> {
        if let Some(existing) = self.find_live_job(deployment_id).await? {
            return Ok(EnqueueOutcome::Duplicate(existing));
        }

        let inserted = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO scheduling_jobs (deployment_id, attempt, run_at)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(deployment_id)
        .bind(attempt)
        .bind(run_at)
        .fetch_one(&self.pool)
        .await;

        match inserted {
            Ok(id) => {
                debug!(deployment_id, job_id = id, ?run_at, "enqueued scheduling job");
                Ok(EnqueueOutcome::Created(id))
            }
            // A concurrent enqueue won the partial-unique race; defer to it.
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                let existing = self
                    .find_live_job(deployment_id)
                    .await?
                    .ok_or_else(|| SchedulerError::Fatal("live job vanished mid-enqueue".into()))?;
                Ok(EnqueueOutcome::Duplicate(existing))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_live_job(&self, deployment_id: i64) -> Result<Option<i64>, SchedulerError> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT id FROM scheduling_jobs
            WHERE deployment_id = $1 AND status IN ('queued', 'leased')
            LIMIT 1
            "#,
        )
        .bind(deployment_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(id)
    }

    /// Reserve the oldest due job, hiding it for the visibility timeout.
    ///
    /// Uses `FOR UPDATE SKIP LOCKED` so concurrent workers never block each
    /// other, and reclaims leased jobs whose visibility timeout expired.
    pub async fn reserve(
        &self,
        worker_id: &str,
    ) -> Result<Option<SchedulingJob>, SchedulerError> {
        let job = sqlx::query_as::<_, SchedulingJob>(
            r#"
            WITH next_job AS (
                SELECT id
                FROM scheduling_jobs
                WHERE
                    (status = 'queued' AND (run_at IS NULL OR run_at <= NOW()))
                    OR (status = 'leased' AND lease_expires_at < NOW())
                ORDER BY COALESCE(run_at, enqueued_at), id
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE scheduling_jobs
            SET
                status = 'leased',
                lease_expires_at = NOW() + ($2 || ' milliseconds')::INTERVAL,
                worker_id = $1,
                updated_at = NOW()
            WHERE id IN (SELECT id FROM next_job)
            RETURNING *
            "#,
        )
        .bind(worker_id)
        .bind((self.visibility.as_millis() as i64).to_string())
        .fetch_optional(&self.pool)
        .await?;

        Ok(job)
    }

    /// Acknowledge a job into the finished registry.
    pub async fn ack(&self, job_id: i64) -> Result<(), SchedulerError> {
        sqlx::query(
            r#"
            UPDATE scheduling_jobs
            SET status = 'finished', lease_expires_at = NULL, updated_at = NOW()
            WHERE id = $1 AND status = 'leased'
            "#,
        )
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Move a job to the failed registry (poison pills, dead deployments).
    pub async fn ack_failed(&self, job_id: i64) -> Result<(), SchedulerError> {
        sqlx::query(
            r#"
            UPDATE scheduling_jobs
            SET status = 'failed', lease_expires_at = NULL, updated_at = NOW()
            WHERE id = $1 AND status = 'leased'
            "#,
        )
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Return a reserved job to the queue for immediate redelivery.
    pub async fn nack(&self, job_id: i64) -> Result<(), SchedulerError> {
        sqlx::query(
            r#"
            UPDATE scheduling_jobs
            SET status = 'queued', lease_expires_at = NULL, worker_id = NULL,
                updated_at = NOW()
            WHERE id = $1 AND status = 'leased'
            "#,
        )
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Depth of each queue section, for the operational surface.
    pub async fn depths(&self) -> Result<QueueDepths, SchedulerError> {
        let rows = sqlx::query_as::<_, (SchedJobStatus, i64)>(
            "SELECT status, COUNT(*) FROM scheduling_jobs GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut depths = QueueDepths::default();
        for (status, count) in rows {
            match status {
                SchedJobStatus::Queued => depths.queued = count,
                SchedJobStatus::Leased => depths.leased = count,
                SchedJobStatus::Finished => depths.finished = count,
                SchedJobStatus::Failed => depths.failed = count,
            }
        }
        Ok(depths)
    }
}
