use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgConnection, PgPool};

use crate::common::{ResourceVector, SchedulerError};

/// Cluster row - a named bucket of CPU/RAM/GPU capacity owned by one
/// organisation. Deletion is soft; deleted clusters reject new deployments
/// but stay queryable for history.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Cluster {
    pub id: i64,
    pub org_id: i64,
    pub name: String,
    pub cpu_total: i64,
    pub ram_total: i64,
    pub gpu_total: i64,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cluster {
    pub fn capacity(&self) -> ResourceVector {
        ResourceVector::new(self.cpu_total, self.ram_total, self.gpu_total)
    }

    pub async fn insert(
        pool: &PgPool,
        org_id: i64,
        name: &str,
        capacity: ResourceVector,
    ) -> Result<Self, SchedulerError> {
        let cluster = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO clusters (org_id, name, cpu_total, ram_total, gpu_total)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(org_id)
        .bind(name)
        .bind(capacity.cpu)
        .bind(capacity.ram)
        .bind(capacity.gpu)
        .fetch_one(pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                SchedulerError::Validation(format!("cluster name {:?} already in use", name))
            }
            _ => SchedulerError::from(e),
        })?;

        Ok(cluster)
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>, SchedulerError> {
        let cluster = sqlx::query_as::<_, Self>("SELECT * FROM clusters WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(cluster)
    }

    /// Re-read a cluster inside a decision transaction, locking the row.
    pub async fn lock_by_id(
        conn: &mut PgConnection,
        id: i64,
    ) -> Result<Option<Self>, SchedulerError> {
        let cluster =
            sqlx::query_as::<_, Self>("SELECT * FROM clusters WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(conn)
                .await?;

        Ok(cluster)
    }

    pub async fn list_for_org(
        pool: &PgPool,
        org_id: i64,
        include_deleted: bool,
    ) -> Result<Vec<Self>, SchedulerError> {
        let clusters = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM clusters
            WHERE org_id = $1 AND ($2 OR NOT deleted)
            ORDER BY id
            "#,
        )
        .bind(org_id)
        .bind(include_deleted)
        .fetch_all(pool)
        .await?;

        Ok(clusters)
    }

    /// Soft-delete. Returns false if the cluster was already deleted.
    pub async fn soft_delete(pool: &PgPool, id: i64) -> Result<bool, SchedulerError> {
        let result = sqlx::query(
            "UPDATE clusters SET deleted = TRUE, updated_at = NOW() WHERE id = $1 AND NOT deleted",
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
