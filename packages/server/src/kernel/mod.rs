//! Scheduling infrastructure.
//!
//! This module provides the kernel-level pipeline around the pure planner:
//! - [`SchedulingQueue`] - Postgres-backed queue with delayed delivery and
//!   visibility timeouts
//! - [`ClusterLockService`] - per-cluster token-owned lock leases
//! - [`SchedulerWorker`] - the decision loop
//! - [`RecoverySweeper`] - reconciliation for commit-then-crash gaps
//!
//! Business rules (planning, lifecycle, authorization) stay in domains/;
//! this module only moves jobs, locks and transactions.

pub mod locks;
pub mod queue;
pub mod sweeper;
pub mod worker;

pub use locks::{ClusterLease, ClusterLockService};
pub use queue::{EnqueueOutcome, QueueDepths, SchedJobStatus, SchedulingJob, SchedulingQueue};
pub use sweeper::RecoverySweeper;
pub use worker::{defer_backoff, SchedulerWorker, SchedulerWorkerConfig};
