//! Scenario tests over the pure scheduling surface: planner decisions,
//! lifecycle legality and the retry schedule, exercised the way the worker
//! drives them.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use server_core::common::{Actor, ResourceVector, Role};
use server_core::domains::deployments::lifecycle::{self, DeploymentStatus};
use server_core::domains::scheduling::{plan, Decision, Workload};
use server_core::kernel::defer_backoff;

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn workload(id: i64, priority: i32, cpu: i64, ram: i64, gpu: i64, secs: i64) -> Workload {
    Workload {
        id,
        priority,
        request: ResourceVector::new(cpu, ram, gpu),
        created_at: at(secs),
    }
}

#[test]
fn direct_admit_into_idle_cluster() {
    // Cluster A: (16,32,4), nothing running. D1 (4,8,1, prio 3) admits
    // directly and leaves (12,24,3) free.
    let capacity = ResourceVector::new(16, 32, 4);
    let d1 = workload(1, 3, 4, 8, 1, 0);

    assert_eq!(plan(&d1, &[], capacity), Decision::Admit);

    let free = capacity.minus(ResourceVector::total([d1.request]));
    assert_eq!(free, ResourceVector::new(12, 24, 3));
}

#[test]
fn equal_priority_contention_defers() {
    // After D1 runs, D2 (16,8,0, prio 3) lacks cpu and cannot preempt an
    // equal-priority deployment: it must wait.
    let capacity = ResourceVector::new(16, 32, 4);
    let running = vec![workload(1, 3, 4, 8, 1, 0)];
    let d2 = workload(2, 3, 16, 8, 0, 1);

    assert_eq!(plan(&d2, &running, capacity), Decision::Defer);
}

#[test]
fn higher_priority_evicts_single_running_victim() {
    // Cluster B: (8,16,0) fully committed to low-priority D3. High-priority
    // D4 evicts it.
    let capacity = ResourceVector::new(8, 16, 0);
    let running = vec![workload(3, 1, 6, 8, 0, 0)];
    let d4 = workload(4, 5, 4, 8, 0, 1);

    assert_eq!(plan(&d4, &running, capacity), Decision::Preempt(vec![3]));
}

#[test]
fn victims_accumulate_in_documented_order() {
    // Cluster C: (10,10,0) split across three prio-2 deployments. The
    // greedy order walks (priority asc, created_at asc, id asc), so the two
    // oldest are evicted for a (6,6,0) request.
    let capacity = ResourceVector::new(10, 10, 0);
    let running = vec![
        workload(5, 2, 5, 5, 0, 0),
        workload(6, 2, 4, 4, 0, 1),
        workload(7, 2, 1, 1, 0, 2),
    ];
    let d8 = workload(8, 4, 6, 6, 0, 3);

    assert_eq!(plan(&d8, &running, capacity), Decision::Preempt(vec![5, 6]));

    // A (5,5,0) request needs only the oldest victim.
    let d9 = workload(9, 4, 5, 5, 0, 3);
    assert_eq!(plan(&d9, &running, capacity), Decision::Preempt(vec![5]));
}

#[test]
fn cross_organisation_submission_is_denied() {
    // A developer of org 1 may not target a cluster owned by org 2; the
    // guard fires before any row is created or enqueued.
    let intruder = Actor {
        user_id: 1,
        org_id: 1,
        role: Role::Developer,
    };
    assert!(intruder.require_same_org(2).is_err());

    // Even admins stop at the organisation boundary.
    let admin = Actor {
        user_id: 2,
        org_id: 1,
        role: Role::Admin,
    };
    assert!(admin.require_same_org(2).is_err());
}

#[test]
fn redelivered_job_for_admitted_deployment_is_a_no_op() {
    // Crash recovery: a worker dies after committing RUNNING but before
    // acking. The redelivered job finds a non-schedulable status and acks
    // without touching the store, so no double admission can occur.
    assert!(!DeploymentStatus::Running.is_schedulable());
    for status in [
        DeploymentStatus::Failed,
        DeploymentStatus::Completed,
        DeploymentStatus::Deleted,
    ] {
        assert!(status.is_terminal());
        assert!(!status.is_schedulable());
    }
}

#[test]
fn capacity_invariant_survives_any_planned_preemption() {
    // For a saturated cluster, applying whatever plan the planner returns
    // must keep the running sum within capacity.
    let capacity = ResourceVector::new(12, 12, 2);
    let running = vec![
        workload(1, 1, 4, 4, 1, 0),
        workload(2, 2, 4, 4, 0, 1),
        workload(3, 3, 4, 4, 1, 2),
    ];
    let d = workload(4, 5, 9, 9, 1, 3);

    match plan(&d, &running, capacity) {
        Decision::Preempt(victims) => {
            let survivors: Vec<_> = running
                .iter()
                .filter(|r| !victims.contains(&r.id))
                .map(|r| r.request)
                .collect();
            let after = ResourceVector::total(survivors).plus(d.request);
            assert!(after.fits_within(capacity));
        }
        Decision::Admit => panic!("cluster is saturated; direct admit is impossible"),
        Decision::Defer => panic!("evicting all three victims frees the cluster; a plan exists"),
    }
}

#[test]
fn requeue_path_passes_through_pending() {
    // A preempted deployment re-enters scheduling via PENDING; admitting it
    // straight from PREEMPTED is illegal.
    assert!(lifecycle::is_legal(
        DeploymentStatus::Preempted,
        DeploymentStatus::Pending
    ));
    assert!(!lifecycle::is_legal(
        DeploymentStatus::Preempted,
        DeploymentStatus::Running
    ));
    assert!(lifecycle::is_legal(
        DeploymentStatus::Pending,
        DeploymentStatus::Running
    ));
}

#[test]
fn defer_schedule_grows_to_cap() {
    let base = Duration::from_millis(5_000);
    let cap = Duration::from_millis(60_000);

    let first = defer_backoff(1, base, cap);
    assert!(first <= Duration::from_millis(6_000));

    // By attempt 5 the raw schedule (80s) is past the cap.
    let late = defer_backoff(5, base, cap);
    assert!(late >= cap.mul_f64(0.8));
    assert!(late <= cap.mul_f64(1.2));
}
