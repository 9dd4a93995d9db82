//! Per-cluster mutually exclusive lock lease.
//!
//! Scheduling decisions for one cluster are serialized by a token-owned
//! lease row. Acquire is a single atomic upsert that only succeeds when no
//! live lease exists; release only deletes when the caller still owns the
//! stored token, so a slow worker whose lease expired cannot release a lock
//! held by its successor.

use std::time::{Duration, Instant};

use sqlx::PgPool;
use uuid::Uuid;

use crate::common::SchedulerError;

/// A held cluster lock lease.
///
/// The holder must treat the lease as lost once the wall-clock elapsed since
/// acquisition exceeds the TTL, and skip its commit/release path.
#[derive(Debug, Clone)]
pub struct ClusterLease {
    pub cluster_id: i64,
    pub token: Uuid,
    ttl: Duration,
    acquired_at: Instant,
}

impl ClusterLease {
    pub fn is_expired(&self) -> bool {
        self.acquired_at.elapsed() >= self.ttl
    }

    #[cfg(test)]
    fn with_age(cluster_id: i64, ttl: Duration, age: Duration) -> Self {
        Self {
            cluster_id,
            token: Uuid::new_v4(),
            ttl,
            acquired_at: Instant::now() - age,
        }
    }
}

/// Lock service over the `cluster_locks` table.
#[derive(Clone)]
pub struct ClusterLockService {
    pool: PgPool,
    ttl: Duration,
}

impl ClusterLockService {
    pub fn new(pool: PgPool, ttl: Duration) -> Self {
        Self { pool, ttl }
    }

    /// Try to acquire the cluster's lock.
    ///
    /// Returns `SchedulerError::Busy` when another worker holds a live
    /// lease. An expired lease row is overwritten in the same statement, so
    /// no reaper is needed.
    pub async fn acquire(&self, cluster_id: i64) -> Result<ClusterLease, SchedulerError> {
        let token = Uuid::new_v4();
        let acquired_at = Instant::now();

        let stored = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO cluster_locks (cluster_id, token, expires_at)
            VALUES ($1, $2, NOW() + ($3 || ' milliseconds')::INTERVAL)
            ON CONFLICT (cluster_id) DO UPDATE
            SET token = EXCLUDED.token, expires_at = EXCLUDED.expires_at
            WHERE cluster_locks.expires_at <= NOW()
            RETURNING token
            "#,
        )
        .bind(cluster_id)
        .bind(token)
        .bind((self.ttl.as_millis() as i64).to_string())
        .fetch_optional(&self.pool)
        .await?;

        match stored {
            Some(_) => Ok(ClusterLease {
                cluster_id,
                token,
                ttl: self.ttl,
                acquired_at,
            }),
            None => Err(SchedulerError::Busy),
        }
    }

    /// Release a held lease. A token mismatch (the lease expired and was
    /// taken over) is a silent no-op.
    pub async fn release(&self, lease: &ClusterLease) -> Result<(), SchedulerError> {
        sqlx::query("DELETE FROM cluster_locks WHERE cluster_id = $1 AND token = $2")
            .bind(lease.cluster_id)
            .bind(lease.token)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
