//! Cluster actions: admin management plus the cluster-state read used by
//! the listing API.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::common::{Actor, ResourceVector, SchedulerError};
use crate::domains::clusters::models::Cluster;
use crate::domains::deployments::lifecycle::DeploymentStatus;
use crate::domains::deployments::models::Deployment;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateClusterInput {
    pub name: String,
    pub cpu: i64,
    pub ram: i64,
    pub gpu: i64,
}

/// Capacity, free vector and the live deployments of one cluster.
#[derive(Debug, Serialize)]
pub struct ClusterState {
    pub cluster: Cluster,
    pub capacity: ResourceVector,
    pub free: ResourceVector,
    pub running: Vec<Deployment>,
    pub pending: Vec<Deployment>,
}

/// Create a cluster in the actor's organisation. Admin only.
pub async fn create_cluster(
    pool: &PgPool,
    actor: &Actor,
    input: CreateClusterInput,
) -> Result<Cluster, SchedulerError> {
    actor.require_cluster_admin(actor.org_id)?;

    if input.name.trim().is_empty() {
        return Err(SchedulerError::Validation("cluster name is required".into()));
    }
    let capacity = ResourceVector::new(input.cpu, input.ram, input.gpu);
    if !capacity.is_non_negative() {
        return Err(SchedulerError::Validation(
            "cluster capacity must be non-negative".into(),
        ));
    }

    Cluster::insert(pool, actor.org_id, input.name.trim(), capacity).await
}

/// Soft-delete a cluster. Admin only; idempotent.
///
/// Pending deployments targeting the cluster are failed by the worker at
/// their next scheduling pass.
pub async fn delete_cluster(
    pool: &PgPool,
    actor: &Actor,
    cluster_id: i64,
) -> Result<(), SchedulerError> {
    let cluster = Cluster::find_by_id(pool, cluster_id)
        .await?
        .ok_or(SchedulerError::NotFound("cluster"))?;
    actor.require_cluster_admin(cluster.org_id)?;

    Cluster::soft_delete(pool, cluster_id).await?;
    Ok(())
}

/// List the actor's organisation's clusters.
pub async fn list_clusters(
    pool: &PgPool,
    actor: &Actor,
    include_deleted: bool,
) -> Result<Vec<Cluster>, SchedulerError> {
    Cluster::list_for_org(pool, actor.org_id, include_deleted).await
}

/// Capacity, free vector, and RUNNING + PENDING deployments of a cluster.
///
/// Reads committed state without taking the cluster lock; a decision in
/// flight shows up on the next read.
pub async fn list_cluster_state(
    pool: &PgPool,
    actor: &Actor,
    cluster_id: i64,
) -> Result<ClusterState, SchedulerError> {
    let cluster = Cluster::find_by_id(pool, cluster_id)
        .await?
        .ok_or(SchedulerError::NotFound("cluster"))?;
    actor.require_same_org(cluster.org_id)?;

    let running =
        Deployment::on_cluster_with_status(pool, cluster_id, DeploymentStatus::Running).await?;
    let pending =
        Deployment::on_cluster_with_status(pool, cluster_id, DeploymentStatus::Pending).await?;

    let capacity = cluster.capacity();
    let in_use = ResourceVector::total(running.iter().map(|d| d.request()));
    let free = capacity.minus(in_use);

    Ok(ClusterState {
        cluster,
        capacity,
        free,
        running,
        pending,
    })
}
