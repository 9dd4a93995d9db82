use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::common::{Actor, SchedulerError};
use crate::domains::deployments::actions;
use crate::domains::deployments::actions::SubmitDeploymentInput;
use crate::domains::deployments::lifecycle::DeploymentStatus;
use crate::domains::deployments::models::Deployment;
use crate::server::app::AppState;

#[derive(Serialize)]
pub struct DeploymentStatusResponse {
    pub id: i64,
    pub status: DeploymentStatus,
}

#[derive(Deserialize, Default)]
pub struct ListDeploymentsParams {
    pub cluster_id: Option<i64>,
    #[serde(default)]
    pub include_deleted: bool,
}

pub async fn submit_handler(
    State(state): State<AppState>,
    actor: Actor,
    Json(input): Json<SubmitDeploymentInput>,
) -> Result<(StatusCode, Json<DeploymentStatusResponse>), SchedulerError> {
    let deployment =
        actions::submit_deployment(&state.db_pool, &state.queue, &actor, input).await?;
    Ok((
        StatusCode::CREATED,
        Json(DeploymentStatusResponse {
            id: deployment.id,
            status: deployment.status,
        }),
    ))
}

pub async fn list_handler(
    State(state): State<AppState>,
    actor: Actor,
    Query(params): Query<ListDeploymentsParams>,
) -> Result<Json<Vec<Deployment>>, SchedulerError> {
    let deployments = actions::list_deployments(
        &state.db_pool,
        &actor,
        params.cluster_id,
        params.include_deleted,
    )
    .await?;
    Ok(Json(deployments))
}

pub async fn detail_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
) -> Result<Json<Deployment>, SchedulerError> {
    let deployment = actions::get_deployment(&state.db_pool, &actor, id).await?;
    Ok(Json(deployment))
}

pub async fn cancel_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
) -> Result<StatusCode, SchedulerError> {
    actions::cancel_deployment(&state.db_pool, &actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn complete_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
) -> Result<Json<DeploymentStatusResponse>, SchedulerError> {
    let deployment = actions::complete_deployment(&state.db_pool, &actor, id).await?;
    Ok(Json(DeploymentStatusResponse {
        id: deployment.id,
        status: deployment.status,
    }))
}
