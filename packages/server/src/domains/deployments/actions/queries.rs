use sqlx::PgPool;

use crate::common::{Actor, SchedulerError};
use crate::domains::clusters::models::Cluster;
use crate::domains::deployments::models::Deployment;

/// Fetch one deployment. Reads are organisation-scoped.
pub async fn get_deployment(
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

    actor.require_same_org(cluster.org_id)?;
    Ok(deployment)
}

/// List deployments visible to the actor, optionally filtered by cluster.
/// Soft-deleted deployments appear only when `include_deleted` is set.
pub async fn list_deployments(
    pool: &PgPool,
    actor: &Actor,
    cluster_id: Option<i64>,
    include_deleted: bool,
) -> Result<Vec<Deployment>, SchedulerError> {
    Deployment::list_for_org(pool, actor.org_id, cluster_id, include_deleted).await
}
