//! Actor extraction.
//!
//! Authentication lives outside this service; a trusted front proxy
//! forwards the validated identity in headers. Requests without a complete
//! identity are rejected before any handler runs.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::common::{Actor, Role, SchedulerError};

const USER_ID_HEADER: &str = "x-user-id";
const ORG_ID_HEADER: &str = "x-org-id";
const ROLE_HEADER: &str = "x-user-role";

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = SchedulerError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header_i64(parts, USER_ID_HEADER)?;
        let org_id = header_i64(parts, ORG_ID_HEADER)?;
        let role = parts
            .headers
            .get(ROLE_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(Role::parse)
            .ok_or_else(|| {
                SchedulerError::Authz(format!("missing or invalid {} header", ROLE_HEADER))
            })?;

        Ok(Actor {
            user_id,
            org_id,
            role,
        })
    }
}

fn header_i64(parts: &Parts, name: &str) -> Result<i64, SchedulerError> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| SchedulerError::Authz(format!("missing or invalid {} header", name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with_headers(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder();
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let (parts, ()) = builder.body(()).unwrap().into_parts();
        parts
    }

    #[tokio::test]
    async fn extracts_complete_identity() {
        let mut parts = parts_with_headers(&[
            ("x-user-id", "7"),
            ("x-org-id", "3"),
            ("x-user-role", "admin"),
        ]);
        let actor = Actor::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(actor.user_id, 7);
        assert_eq!(actor.org_id, 3);
        assert_eq!(actor.role, Role::Admin);
    }

    #[tokio::test]
    async fn rejects_missing_role() {
        let mut parts = parts_with_headers(&[("x-user-id", "7"), ("x-org-id", "3")]);
        let err = Actor::from_request_parts(&mut parts, &()).await.unwrap_err();
        assert!(matches!(err, SchedulerError::Authz(_)));
    }

    #[tokio::test]
    async fn rejects_non_numeric_user_id() {
        let mut parts = parts_with_headers(&[
            ("x-user-id", "alice"),
            ("x-org-id", "3"),
            ("x-user-role", "developer"),
        ]);
        let err = Actor::from_request_parts(&mut parts, &()).await.unwrap_err();
        assert!(matches!(err, SchedulerError::Authz(_)));
    }
}
