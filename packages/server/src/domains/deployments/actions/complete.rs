use sqlx::PgPool;
use tracing::info;

use crate::common::{Actor, SchedulerError};
use crate::domains::clusters::models::Cluster;
use crate::domains::deployments::lifecycle::DeploymentStatus;
use crate::domains::deployments::models::Deployment;

/// Record the finish of a RUNNING deployment, releasing its resources.
pub async fn complete_deployment(
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

    let completed = Deployment::transition(
        &mut *tx,
        deployment_id,
        current.status,
        DeploymentStatus::Completed,
        None,
    )
    .await?;
    tx.commit().await?;

    info!(deployment_id, "deployment completed");
    Ok(completed)
}
