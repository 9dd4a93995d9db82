use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::common::{Actor, SchedulerError};
use crate::domains::clusters::actions;
use crate::domains::clusters::actions::{ClusterState, CreateClusterInput};
use crate::domains::clusters::models::Cluster;
use crate::server::app::AppState;

#[derive(Deserialize, Default)]
pub struct ListClustersParams {
    #[serde(default)]
    pub include_deleted: bool,
}

pub async fn create_handler(
    State(state): State<AppState>,
    actor: Actor,
    Json(input): Json<CreateClusterInput>,
) -> Result<(StatusCode, Json<Cluster>), SchedulerError> {
    let cluster = actions::create_cluster(&state.db_pool, &actor, input).await?;
    Ok((StatusCode::CREATED, Json(cluster)))
}

pub async fn list_handler(
    State(state): State<AppState>,
    actor: Actor,
    Query(params): Query<ListClustersParams>,
) -> Result<Json<Vec<Cluster>>, SchedulerError> {
    let clusters =
        actions::list_clusters(&state.db_pool, &actor, params.include_deleted).await?;
    Ok(Json(clusters))
}

pub async fn resources_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
) -> Result<Json<ClusterState>, SchedulerError> {
    let cluster_state = actions::list_cluster_state(&state.db_pool, &actor, id).await?;
    Ok(Json(cluster_state))
}

pub async fn delete_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
) -> Result<StatusCode, SchedulerError> {
    actions::delete_cluster(&state.db_pool, &actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
