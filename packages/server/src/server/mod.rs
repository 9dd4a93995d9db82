//! HTTP shell: a thin axum adapter over the admission actions.

pub mod app;
pub mod middleware;
pub mod routes;

pub use app::{build_app, AppState};
