use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;

use crate::common::{Actor, ResourceVector, SchedulerError};
use crate::domains::clusters::models::Cluster;
use crate::domains::deployments::models::Deployment;
use crate::kernel::queue::SchedulingQueue;

pub const MIN_PRIORITY: i32 = 1;
pub const MAX_PRIORITY: i32 = 5;

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitDeploymentInput {
    pub name: String,
    pub cluster_id: i64,
    pub cpu: i64,
    pub ram: i64,
    pub gpu: i64,
    pub priority: i32,
}

/// Admit a deployment request: validate statically, create it in PENDING
/// and hand it to the scheduling queue.
///
/// Validation failures are surfaced synchronously and nothing is persisted
/// or enqueued. The asynchronous pipeline takes over once the PENDING row
/// exists.
pub async fn submit_deployment(
    pool: &PgPool,
    queue: &SchedulingQueue,
    actor: &Actor,
    input: SubmitDeploymentInput,
) -> Result<Deployment, SchedulerError> {
    let request = ResourceVector::new(input.cpu, input.ram, input.gpu);
    validate_shape(&input, request)?;

    let cluster = Cluster::find_by_id(pool, input.cluster_id)
        .await?
        .ok_or_else(|| SchedulerError::Validation("unknown cluster".into()))?;

    actor.require_same_org(cluster.org_id)?;

    if cluster.deleted {
        return Err(SchedulerError::Validation(
            "cluster is deleted and rejects new deployments".into(),
        ));
    }
    if !request.fits_within(cluster.capacity()) {
        return Err(SchedulerError::Validation(
            "requested resources exceed cluster capacity".into(),
        ));
    }

    let deployment = Deployment::insert(
        pool,
        cluster.id,
        actor.user_id,
        input.name.trim(),
        request,
        input.priority,
    )
    .await?;

    queue.enqueue(deployment.id, 0).await?;

    info!(
        deployment_id = deployment.id,
        cluster_id = cluster.id,
        priority = deployment.priority,
        "deployment submitted"
    );

    Ok(deployment)
}

/// Static shape checks that need no database state.
fn validate_shape(
    input: &SubmitDeploymentInput,
    request: ResourceVector,
) -> Result<(), SchedulerError> {
    if input.name.trim().is_empty() {
        return Err(SchedulerError::Validation("deployment name is required".into()));
    }
    if !request.is_non_negative() {
        return Err(SchedulerError::Validation(
            "resource counts must be non-negative".into(),
        ));
    }
    if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&input.priority) {
        return Err(SchedulerError::Validation(format!(
            "priority must be between {} and {}",
            MIN_PRIORITY, MAX_PRIORITY
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(cpu: i64, ram: i64, gpu: i64, priority: i32) -> SubmitDeploymentInput {
        SubmitDeploymentInput {
            name: "api".into(),
            cluster_id: 1,
            cpu,
            ram,
            gpu,
            priority,
        }
    }

    #[test]
    fn rejects_negative_resources() {
        let i = input(-1, 8, 0, 3);
        let request = ResourceVector::new(i.cpu, i.ram, i.gpu);
        assert!(matches!(
            validate_shape(&i, request),
            Err(SchedulerError::Validation(_))
        ));
    }

    #[test]
    fn rejects_priority_out_of_range() {
        for priority in [0, 6, -2] {
            let i = input(1, 1, 0, priority);
            let request = ResourceVector::new(i.cpu, i.ram, i.gpu);
            assert!(matches!(
                validate_shape(&i, request),
                Err(SchedulerError::Validation(_))
            ));
        }
    }

    #[test]
    fn rejects_blank_name() {
        let mut i = input(1, 1, 0, 3);
        i.name = "   ".into();
        let request = ResourceVector::new(i.cpu, i.ram, i.gpu);
        assert!(matches!(
            validate_shape(&i, request),
            Err(SchedulerError::Validation(_))
        ));
    }

    #[test]
    fn accepts_priority_bounds() {
        for priority in [MIN_PRIORITY, MAX_PRIORITY] {
            let i = input(1, 1, 0, priority);
            let request = ResourceVector::new(i.cpu, i.ram, i.gpu);
            assert!(validate_shape(&i, request).is_ok());
        }
    }
}
