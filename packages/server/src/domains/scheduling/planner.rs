//! Preemption planner.
//!
//! Given one pending deployment and the running set of its cluster, decide
//! whether to admit directly, admit after preempting a set of lower-priority
//! victims, or defer. The decision is a pure function of its inputs: victim
//! candidates are ordered by (priority asc, created_at asc, id asc) and
//! accumulated greedily, which makes the outcome fully deterministic. The
//! greedy order is the contract; no set-cover search is attempted.

use chrono::{DateTime, Utc};

use crate::common::ResourceVector;

/// The planner's view of a deployment: identity, priority, request, age.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workload {
    pub id: i64,
    pub priority: i32,
    pub request: ResourceVector,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a planning pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The request fits in the free capacity as-is.
    Admit,
    /// The request fits after evicting these running deployments,
    /// in victim order.
    Preempt(Vec<i64>),
    /// No admissible plan exists right now.
    Defer,
}

/// Plan the placement of `request` on a cluster with the given capacity and
/// running set.
///
/// Victims must all have strictly lower priority than the request; a
/// deployment never preempts work of equal or higher priority, and never
/// itself.
pub fn plan(request: &Workload, running: &[Workload], capacity: ResourceVector) -> Decision {
    let in_use = ResourceVector::total(running.iter().map(|r| r.request));
    let free = capacity.minus(in_use);

    if request.request.fits_within(free) {
        return Decision::Admit;
    }

    let mut candidates: Vec<&Workload> = running
        .iter()
        .filter(|r| r.priority < request.priority && r.id != request.id)
        .collect();
    candidates.sort_by_key(|r| (r.priority, r.created_at, r.id));

    let mut freed = free;
    let mut victims = Vec::new();
    for victim in candidates {
        freed = freed.plus(victim.request);
        victims.push(victim.id);
        if request.request.fits_within(freed) {
            return Decision::Preempt(victims);
        }
    }

    Decision::Defer
}
