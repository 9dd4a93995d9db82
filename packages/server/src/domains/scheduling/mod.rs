//! Pure scheduling decisions: resource accounting and preemption planning.
//!
//! Nothing in this module touches the database. The worker feeds it plain
//! records read inside its decision transaction and persists the outcome.

pub mod planner;

pub use planner::{plan, Decision, Workload};
