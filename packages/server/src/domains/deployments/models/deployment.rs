use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgConnection, PgPool};

use crate::common::{ResourceVector, SchedulerError};
use crate::domains::deployments::lifecycle::{self, DeploymentStatus};
use crate::domains::scheduling::Workload;

/// Deployment row - SQL persistence layer.
///
/// Immutable after creation except `status`, `updated_at`, `attempt_count`
/// and `failure_reason`.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Deployment {
    pub id: i64,
    pub cluster_id: i64,
    pub owner_id: i64,
    pub name: String,
    pub cpu: i64,
    pub ram: i64,
    pub gpu: i64,
    pub priority: i32,
    pub status: DeploymentStatus,
    pub attempt_count: i32,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Deployment {
    pub fn request(&self) -> ResourceVector {
        ResourceVector::new(self.cpu, self.ram, self.gpu)
    }

    /// The planner's view of this deployment.
    pub fn to_workload(&self) -> Workload {
        Workload {
            id: self.id,
            priority: self.priority,
            request: self.request(),
            created_at: self.created_at,
        }
    }

    /// Insert a new deployment in PENDING status.
    pub async fn insert(
        pool: &PgPool,
        cluster_id: i64,
        owner_id: i64,
        name: &str,
        request: ResourceVector,
        priority: i32,
    ) -> Result<Self, SchedulerError> {
        let deployment = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO deployments (cluster_id, owner_id, name, cpu, ram, gpu, priority)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(cluster_id)
        .bind(owner_id)
        .bind(name)
        .bind(request.cpu)
        .bind(request.ram)
        .bind(request.gpu)
        .bind(priority)
        .fetch_one(pool)
        .await?;

        Ok(deployment)
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>, SchedulerError> {
        let deployment = sqlx::query_as::<_, Self>("SELECT * FROM deployments WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(deployment)
    }

    /// Re-read a deployment inside a decision transaction, locking the row.
    pub async fn lock_by_id(
        conn: &mut PgConnection,
        id: i64,
    ) -> Result<Option<Self>, SchedulerError> {
        let deployment =
            sqlx::query_as::<_, Self>("SELECT * FROM deployments WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(conn)
                .await?;

        Ok(deployment)
    }

    /// The RUNNING set of a cluster, locked for the duration of a decision
    /// transaction so no concurrent transition can slip in.
    pub async fn running_on_cluster(
        conn: &mut PgConnection,
        cluster_id: i64,
    ) -> Result<Vec<Self>, SchedulerError> {
        let running = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM deployments
            WHERE cluster_id = $1 AND status = 'running'
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(cluster_id)
        .fetch_all(conn)
        .await?;

        Ok(running)
    }

    /// Deployments on a cluster in a given status, committed read.
    pub async fn on_cluster_with_status(
        pool: &PgPool,
        cluster_id: i64,
        status: DeploymentStatus,
    ) -> Result<Vec<Self>, SchedulerError> {
        let deployments = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM deployments
            WHERE cluster_id = $1 AND status = $2
            ORDER BY created_at, id
            "#,
        )
        .bind(cluster_id)
        .bind(status)
        .fetch_all(pool)
        .await?;

        Ok(deployments)
    }

    /// Organisation-scoped listing for the read API.
    pub async fn list_for_org(
        pool: &PgPool,
        org_id: i64,
        cluster_id: Option<i64>,
        include_deleted: bool,
    ) -> Result<Vec<Self>, SchedulerError> {
        let deployments = sqlx::query_as::<_, Self>(
            r#"
            SELECT d.* FROM deployments d
            JOIN clusters c ON c.id = d.cluster_id
            WHERE c.org_id = $1
              AND ($2::BIGINT IS NULL OR d.cluster_id = $2)
              AND ($3 OR d.status <> 'deleted')
            ORDER BY d.created_at, d.id
            "#,
        )
        .bind(org_id)
        .bind(cluster_id)
        .bind(include_deleted)
        .fetch_all(pool)
        .await?;

        Ok(deployments)
    }

    /// Apply a status transition with compare-and-set semantics.
    ///
    /// Legality is checked against the lifecycle table first; the UPDATE
    /// then only matches while the row still holds `from`, so a racing
    /// transition surfaces as CONFLICT_TRANSITION rather than a lost write.
    pub async fn transition(
        conn: &mut PgConnection,
        id: i64,
        from: DeploymentStatus,
        to: DeploymentStatus,
        failure_reason: Option<&str>,
    ) -> Result<Self, SchedulerError> {
        if !lifecycle::is_legal(from, to) {
            return Err(SchedulerError::ConflictTransition(format!(
                "{:?} -> {:?}",
                from, to
            )));
        }

        let updated = sqlx::query_as::<_, Self>(
            r#"
            UPDATE deployments
            SET status = $3, failure_reason = $4, updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .bind(failure_reason)
        .fetch_optional(conn)
        .await?;

        updated.ok_or_else(|| {
            SchedulerError::ConflictTransition(format!("deployment {} is no longer {:?}", id, from))
        })
    }

    /// Increment `attempt_count`, once per worker processing pass.
    pub async fn bump_attempt(conn: &mut PgConnection, id: i64) -> Result<i32, SchedulerError> {
        let attempts: i32 = sqlx::query_scalar(
            r#"
            UPDATE deployments
            SET attempt_count = attempt_count + 1, updated_at = NOW()
            WHERE id = $1
            RETURNING attempt_count
            "#,
        )
        .bind(id)
        .fetch_one(conn)
        .await?;

        Ok(attempts)
    }
}
