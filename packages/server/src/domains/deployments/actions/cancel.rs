use sqlx::PgPool;
use tracing::info;

use crate::common::{Actor, SchedulerError};
use crate::domains::clusters::models::Cluster;
use crate::domains::deployments::lifecycle::DeploymentStatus;
use crate::domains::deployments::models::Deployment;

/// Cancel a deployment: any non-terminal status transitions to DELETED.
///
/// The queue is not touched here; the worker's status precheck discards any
/// outstanding job for this deployment on its next delivery.
pub async fn cancel_deployment(
    pool: &PgPool,
    actor: &Actor,
    deployment_id: i64,
) -> Result<Deployment, SchedulerError> {
    let deployment = Deployment::find_by_id(pool, deployment_id)
        .await?
        .ok_or(SchedulerError::NotFound("deployment"))?;
    let cluster = Cluster::find_by_id(pool, deployment.cluster_id)
        .await?
        .ok_or(SchedulerError::NotFound("cluster"))?;

    actor.require_deployment_access(cluster.org_id, deployment.owner_id)?;

    let mut tx = pool.begin().await?;
    let current = Deployment::lock_by_id(&mut *tx, deployment_id)
        .await?
        .ok_or(SchedulerError::NotFound("deployment"))?;

    if current.status.is_terminal() {
        return Err(SchedulerError::ConflictTransition(format!(
            "deployment {} is already {:?}",
            deployment_id, current.status
        )));
    }

    let deleted = Deployment::transition(
        &mut *tx,
        deployment_id,
        current.status,
        DeploymentStatus::Deleted,
        None,
    )
    .await?;
    tx.commit().await?;

    info!(deployment_id, from = ?current.status, "deployment cancelled");
    Ok(deleted)
}
