use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Error taxonomy for the deployment manager.
///
/// `Validation` and `Authz` surface to callers synchronously; the remaining
/// kinds are internal to the scheduling pipeline and drive worker behavior
/// (silent ack, nack, abandon-and-redeliver, process exit).
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("permission denied: {0}")]
    Authz(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("illegal status transition: {0}")]
    ConflictTransition(String),

    #[error("cluster lock is held by another worker")]
    Busy,

    #[error("backend error: {0}")]
    TransientBackend(#[source] sqlx::Error),

    #[error("deployment is unschedulable after {attempts} attempts")]
    Unschedulable { attempts: i32 },

    #[error("invariant violation: {0}")]
    Fatal(String),
}

impl SchedulerError {
    fn status_code(&self) -> StatusCode {
        match self {
            SchedulerError::Validation(_) => StatusCode::BAD_REQUEST,
            SchedulerError::Authz(_) => StatusCode::FORBIDDEN,
            SchedulerError::NotFound(_) => StatusCode::NOT_FOUND,
            SchedulerError::ConflictTransition(_) => StatusCode::CONFLICT,
            SchedulerError::Busy | SchedulerError::TransientBackend(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            SchedulerError::Unschedulable { .. } | SchedulerError::Fatal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<sqlx::Error> for SchedulerError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => SchedulerError::NotFound("row"),
            other => SchedulerError::TransientBackend(other),
        }
    }
}

impl IntoResponse for SchedulerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_400() {
        let err = SchedulerError::Validation("cpu exceeds capacity".into());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn authz_maps_to_403() {
        let err = SchedulerError::Authz("cross-organisation access".into());
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn conflict_maps_to_409() {
        let err = SchedulerError::ConflictTransition("completed -> running".into());
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        let err = SchedulerError::from(sqlx::Error::RowNotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }
}
