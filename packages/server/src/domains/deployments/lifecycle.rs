//! Deployment lifecycle state machine.
//!
//! The transition table is authoritative: every status mutation in the store
//! re-checks legality inside its transaction and rejects anything else
//! (fail closed). FAILED, COMPLETED and DELETED are terminal; DELETED is a
//! soft delete and the row remains for history queries.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "deployment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    Pending,
    Running,
    Preempted,
    Failed,
    Completed,
    Deleted,
}

impl DeploymentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DeploymentStatus::Failed | DeploymentStatus::Completed | DeploymentStatus::Deleted
        )
    }

    /// Whether the scheduler should still act on a deployment in this status.
    pub fn is_schedulable(self) -> bool {
        matches!(self, DeploymentStatus::Pending | DeploymentStatus::Preempted)
    }
}

/// The legal transition table.
///
/// PENDING:   admit -> RUNNING, reject -> FAILED, cancel -> DELETED
/// RUNNING:   preempt -> PREEMPTED, crash -> FAILED, finish -> COMPLETED,
///            cancel -> DELETED
/// PREEMPTED: requeue -> PENDING, give-up -> FAILED, cancel -> DELETED
pub fn is_legal(from: DeploymentStatus, to: DeploymentStatus) -> bool {
    use DeploymentStatus::*;
    matches!(
        (from, to),
        (Pending, Running)
            | (Pending, Failed)
            | (Pending, Deleted)
            | (Running, Preempted)
            | (Running, Failed)
            | (Running, Completed)
            | (Running, Deleted)
            | (Preempted, Pending)
            | (Preempted, Failed)
            | (Preempted, Deleted)
    )
}

#[cfg(test)]
mod tests {
    use super::DeploymentStatus::*;
    use super::*;

    const ALL: [DeploymentStatus; 6] = [Pending, Running, Preempted, Failed, Completed, Deleted];

    #[test]
    fn terminal_states_allow_nothing() {
        for from in [Failed, Completed, Deleted] {
            for to in ALL {
                assert!(!is_legal(from, to), "{:?} -> {:?} must be illegal", from, to);
            }
        }
    }

    #[test]
    fn pending_transitions() {
        assert!(is_legal(Pending, Running));
        assert!(is_legal(Pending, Failed));
        assert!(is_legal(Pending, Deleted));
        assert!(!is_legal(Pending, Preempted));
        assert!(!is_legal(Pending, Completed));
        assert!(!is_legal(Pending, Pending));
    }

    #[test]
    fn running_transitions() {
        assert!(is_legal(Running, Preempted));
        assert!(is_legal(Running, Failed));
        assert!(is_legal(Running, Completed));
        assert!(is_legal(Running, Deleted));
        assert!(!is_legal(Running, Pending));
        assert!(!is_legal(Running, Running));
    }

    #[test]
    fn preempted_transitions() {
        assert!(is_legal(Preempted, Pending));
        assert!(is_legal(Preempted, Failed));
        assert!(is_legal(Preempted, Deleted));
        assert!(!is_legal(Preempted, Running));
        assert!(!is_legal(Preempted, Completed));
    }

    #[test]
    fn no_self_transitions_anywhere() {
        for status in ALL {
            assert!(!is_legal(status, status));
        }
    }

    #[test]
    fn schedulable_statuses() {
        assert!(Pending.is_schedulable());
        assert!(Preempted.is_schedulable());
        assert!(!Running.is_schedulable());
        assert!(!Deleted.is_schedulable());
    }
}
