//! Application setup and server configuration.

use axum::routing::{delete, get, post};
use axum::Router;
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::kernel::queue::SchedulingQueue;
use crate::server::routes::{clusters, deployments, health_handler};

/// Shared state for all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub queue: SchedulingQueue,
}

/// Build the admission API router.
pub fn build_app(pool: PgPool, config: &Config) -> Router {
    let state = AppState {
        queue: SchedulingQueue::new(pool.clone(), config.queue_visibility),
        db_pool: pool,
    };

    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/deployments/",
            post(deployments::submit_handler).get(deployments::list_handler),
        )
        .route(
            "/deployments/:id",
            get(deployments::detail_handler).delete(deployments::cancel_handler),
        )
        .route(
            "/deployments/:id/complete",
            post(deployments::complete_handler),
        )
        .route(
            "/clusters/",
            post(clusters::create_handler).get(clusters::list_handler),
        )
        .route("/clusters/:id", delete(clusters::delete_handler))
        .route("/clusters/:id/resources", get(clusters::resources_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
