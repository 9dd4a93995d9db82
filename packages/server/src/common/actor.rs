use serde::{Deserialize, Serialize};

use super::error::SchedulerError;

/// Role of an authenticated user within their organisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Developer,
}

impl Role {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Role::Admin),
            "developer" => Some(Role::Developer),
            _ => None,
        }
    }
}

/// A validated caller identity.
///
/// Authentication happens upstream; the scheduler trusts that an `Actor`
/// carries a verified user id, organisation id and role.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub user_id: i64,
    pub org_id: i64,
    pub role: Role,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Cross-organisation access is always denied, for every role.
    pub fn require_same_org(&self, org_id: i64) -> Result<(), SchedulerError> {
        if self.org_id != org_id {
            return Err(SchedulerError::Authz(
                "resource belongs to another organisation".into(),
            ));
        }
        Ok(())
    }

    /// Admins may operate on any deployment in their organisation;
    /// developers only on deployments they own.
    pub fn require_deployment_access(
        &self,
        org_id: i64,
        owner_id: i64,
    ) -> Result<(), SchedulerError> {
        self.require_same_org(org_id)?;
        if !self.is_admin() && self.user_id != owner_id {
            return Err(SchedulerError::Authz(
                "developers may only manage their own deployments".into(),
            ));
        }
        Ok(())
    }

    /// Cluster management is reserved to admins of the owning organisation.
    pub fn require_cluster_admin(&self, org_id: i64) -> Result<(), SchedulerError> {
        self.require_same_org(org_id)?;
        if !self.is_admin() {
            return Err(SchedulerError::Authz("admin access required".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> Actor {
        Actor {
            user_id: 1,
            org_id: 10,
            role: Role::Admin,
        }
    }

    fn developer() -> Actor {
        Actor {
            user_id: 2,
            org_id: 10,
            role: Role::Developer,
        }
    }

    #[test]
    fn cross_org_is_always_denied() {
        assert!(admin().require_same_org(99).is_err());
        assert!(developer().require_deployment_access(99, 2).is_err());
        assert!(admin().require_cluster_admin(99).is_err());
    }

    #[test]
    fn admin_may_manage_other_owners_deployments() {
        assert!(admin().require_deployment_access(10, 2).is_ok());
    }

    #[test]
    fn developer_limited_to_own_deployments() {
        assert!(developer().require_deployment_access(10, 2).is_ok());
        assert!(developer().require_deployment_access(10, 1).is_err());
    }

    #[test]
    fn cluster_management_is_admin_only() {
        assert!(admin().require_cluster_admin(10).is_ok());
        assert!(developer().require_cluster_admin(10).is_err());
    }

    #[test]
    fn role_parse() {
        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert_eq!(Role::parse("developer"), Some(Role::Developer));
        assert_eq!(Role::parse("root"), None);
    }
}
