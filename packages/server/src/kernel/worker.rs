//! Scheduler worker.
//!
//! Each worker is a single-threaded loop: reserve one scheduling job,
//! precheck the deployment's status, take the cluster lock, and make one
//! placement decision inside one store transaction. Consequent re-enqueues
//! (deferred retries, evicted victims) happen only after a successful
//! commit; a crash in between is recovered by the sweeper.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use sqlx::PgPool;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::common::SchedulerError;
use crate::config::Config;
use crate::domains::clusters::models::Cluster;
use crate::domains::deployments::lifecycle::DeploymentStatus;
use crate::domains::deployments::models::Deployment;
use crate::domains::scheduling::{plan, Decision};
use crate::kernel::locks::{ClusterLease, ClusterLockService};
use crate::kernel::queue::{SchedulingJob, SchedulingQueue};

/// Configuration for one scheduler worker task.
#[derive(Debug, Clone)]
pub struct SchedulerWorkerConfig {
    /// Worker ID for this instance
    pub worker_id: String,
    /// How long to wait when no jobs are available
    pub poll_interval: Duration,
    /// Base delay of the defer backoff schedule
    pub retry_base: Duration,
    /// Cap of the defer backoff schedule
    pub retry_cap: Duration,
    /// Re-enqueue delay for freshly preempted deployments
    pub preempt_requeue_delay: Duration,
    /// Defer attempts before a deployment is failed as unschedulable
    pub max_attempts: i32,
}

impl SchedulerWorkerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            worker_id: format!("scheduler-{}", Uuid::new_v4()),
            poll_interval: Duration::from_secs(1),
            retry_base: config.retry_base,
            retry_cap: config.retry_cap,
            preempt_requeue_delay: config.preempt_requeue_delay,
            max_attempts: config.max_attempts,
        }
    }

    pub fn with_worker_id(mut self, worker_id: impl Into<String>) -> Self {
        self.worker_id = worker_id.into();
        self
    }
}

/// What a committed decision requires of the worker afterwards.
#[derive(Debug)]
enum Outcome {
    /// Deployment is now RUNNING.
    Admitted,
    /// Deployment is RUNNING; victims were preempted and need re-enqueueing.
    /// Carries (deployment_id, attempt_count) per victim.
    Preempted(Vec<(i64, i32)>),
    /// No plan; deployment stays PENDING and retries after backoff.
    Deferred { attempts: i32 },
    /// Deployment reached FAILED (cluster deleted, or unschedulable).
    FailedTerminal,
    /// The deployment was already handled elsewhere; nothing committed.
    AlreadyHandled,
    /// The lock lease ran out before commit; nothing committed, no ack.
    Abandoned,
}

/// Background service making scheduling decisions.
pub struct SchedulerWorker {
    pool: PgPool,
    queue: SchedulingQueue,
    locks: ClusterLockService,
    config: SchedulerWorkerConfig,
    shutdown: Arc<AtomicBool>,
}

impl SchedulerWorker {
    pub fn new(
        pool: PgPool,
        queue: SchedulingQueue,
        locks: ClusterLockService,
        config: SchedulerWorkerConfig,
    ) -> Self {
        Self {
            pool,
            queue,
            locks,
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get a shutdown handle for graceful shutdown.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Run the worker until shutdown is requested.
    ///
    /// Returns an error only on unrecoverable failures; the caller exits
    /// non-zero so a supervisor can restart the process.
    pub async fn run(self) -> Result<(), SchedulerError> {
        info!(worker_id = %self.config.worker_id, "scheduler worker starting");

        loop {
            if self.is_shutdown_requested() {
                break;
            }

            let job = match self.queue.reserve(&self.config.worker_id).await {
                Ok(job) => job,
                Err(e) => {
                    error!(error = %e, "failed to reserve scheduling job");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };

            let Some(job) = job else {
                tokio::time::sleep(self.config.poll_interval).await;
                continue;
            };

            debug!(
                job_id = job.id,
                deployment_id = job.deployment_id,
                attempt = job.attempt,
                "reserved scheduling job"
            );

            match self.process(&job).await {
                Ok(()) => {}
                Err(SchedulerError::Fatal(msg)) => {
                    error!(job_id = job.id, error = %msg, "fatal scheduler failure");
                    return Err(SchedulerError::Fatal(msg));
                }
                Err(e) => {
                    // Leave the job leased; the visibility timeout redelivers.
                    warn!(job_id = job.id, error = %e, "abandoning scheduling decision");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }

        info!(worker_id = %self.config.worker_id, "scheduler worker stopped");
        Ok(())
    }

    /// Handle one reserved job end to end.
    async fn process(&self, job: &SchedulingJob) -> Result<(), SchedulerError> {
        let Some(deployment) = Deployment::find_by_id(&self.pool, job.deployment_id).await? else {
            warn!(deployment_id = job.deployment_id, "job references missing deployment");
            self.queue.ack_failed(job.id).await?;
            return Ok(());
        };

        // Idempotency on redelivery: terminal or already-running deployments
        // were handled by a previous pass.
        if !deployment.status.is_schedulable() {
            debug!(
                deployment_id = deployment.id,
                status = ?deployment.status,
                "deployment no longer schedulable, acking"
            );
            self.queue.ack(job.id).await?;
            return Ok(());
        }

        let lease = match self.locks.acquire(deployment.cluster_id).await {
            Ok(lease) => lease,
            Err(SchedulerError::Busy) => {
                debug!(cluster_id = deployment.cluster_id, "cluster lock busy, nacking");
                self.queue.nack(job.id).await?;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let outcome = match self.decide(&deployment, &lease).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let _ = self.locks.release(&lease).await;
                return Err(e);
            }
        };

        match outcome {
            Outcome::Admitted => {
                info!(deployment_id = deployment.id, "deployment admitted");
                self.queue.ack(job.id).await?;
                self.locks.release(&lease).await?;
            }
            Outcome::Preempted(victims) => {
                info!(
                    deployment_id = deployment.id,
                    victims = victims.len(),
                    "deployment admitted after preemption"
                );
                self.queue.ack(job.id).await?;
                self.locks.release(&lease).await?;
                for (victim_id, attempt) in victims {
                    self.queue
                        .enqueue_after(victim_id, attempt, self.config.preempt_requeue_delay)
                        .await?;
                }
            }
            Outcome::Deferred { attempts } => {
                let delay =
                    defer_backoff(attempts, self.config.retry_base, self.config.retry_cap);
                info!(
                    deployment_id = deployment.id,
                    attempts,
                    delay_ms = delay.as_millis() as u64,
                    "deployment deferred"
                );
                self.queue.ack(job.id).await?;
                self.locks.release(&lease).await?;
                self.queue.enqueue_after(deployment.id, attempts, delay).await?;
            }
            Outcome::FailedTerminal => {
                self.queue.ack_failed(job.id).await?;
                self.locks.release(&lease).await?;
            }
            Outcome::AlreadyHandled => {
                self.queue.ack(job.id).await?;
                self.locks.release(&lease).await?;
            }
            Outcome::Abandoned => {
                // Lease lost: no commit happened and the lock may already
                // belong to a successor. Leave both alone; the visibility
                // timeout will redeliver the job.
                warn!(
                    deployment_id = deployment.id,
                    cluster_id = lease.cluster_id,
                    "lock lease expired before commit, abandoning decision"
                );
            }
        }

        Ok(())
    }

    /// Make one placement decision inside one store transaction.
    async fn decide(
        &self,
        deployment: &Deployment,
        lease: &ClusterLease,
    ) -> Result<Outcome, SchedulerError> {
        let mut tx = self.pool.begin().await?;

        let Some(current) = Deployment::lock_by_id(&mut *tx, deployment.id).await? else {
            return Ok(Outcome::AlreadyHandled);
        };
        if !current.status.is_schedulable() {
            return Ok(Outcome::AlreadyHandled);
        }

        // A preempted deployment re-enters scheduling through PENDING.
        let current = if current.status == DeploymentStatus::Preempted {
            Deployment::transition(
                &mut *tx,
                current.id,
                DeploymentStatus::Preempted,
                DeploymentStatus::Pending,
                None,
            )
            .await?
        } else {
            current
        };

        let cluster = Cluster::lock_by_id(&mut *tx, current.cluster_id).await?;
        let cluster = match cluster {
            Some(cluster) if !cluster.deleted => cluster,
            _ => {
                Deployment::transition(
                    &mut *tx,
                    current.id,
                    DeploymentStatus::Pending,
                    DeploymentStatus::Failed,
                    Some("cluster-deleted"),
                )
                .await?;
                if lease.is_expired() {
                    return Ok(Outcome::Abandoned);
                }
                tx.commit().await?;
                warn!(deployment_id = current.id, "failed deployment: cluster deleted");
                return Ok(Outcome::FailedTerminal);
            }
        };

        let running = Deployment::running_on_cluster(&mut *tx, cluster.id).await?;
        let workloads: Vec<_> = running.iter().map(Deployment::to_workload).collect();
        let decision = plan(&current.to_workload(), &workloads, cluster.capacity());

        let outcome = match decision {
            Decision::Admit => {
                Deployment::bump_attempt(&mut *tx, current.id).await?;
                Deployment::transition(
                    &mut *tx,
                    current.id,
                    DeploymentStatus::Pending,
                    DeploymentStatus::Running,
                    None,
                )
                .await?;
                Outcome::Admitted
            }
            Decision::Preempt(victim_ids) => {
                let mut victims = Vec::with_capacity(victim_ids.len());
                for victim_id in victim_ids {
                    Deployment::transition(
                        &mut *tx,
                        victim_id,
                        DeploymentStatus::Running,
                        DeploymentStatus::Preempted,
                        None,
                    )
                    .await?;
                    let attempt = running
                        .iter()
                        .find(|r| r.id == victim_id)
                        .map(|r| r.attempt_count)
                        .unwrap_or(0);
                    victims.push((victim_id, attempt));
                }
                Deployment::bump_attempt(&mut *tx, current.id).await?;
                Deployment::transition(
                    &mut *tx,
                    current.id,
                    DeploymentStatus::Pending,
                    DeploymentStatus::Running,
                    None,
                )
                .await?;
                Outcome::Preempted(victims)
            }
            Decision::Defer => {
                let attempts = Deployment::bump_attempt(&mut *tx, current.id).await?;
                if attempts >= self.config.max_attempts {
                    let reason = SchedulerError::Unschedulable { attempts };
                    warn!(deployment_id = current.id, error = %reason, "failing deployment");
                    Deployment::transition(
                        &mut *tx,
                        current.id,
                        DeploymentStatus::Pending,
                        DeploymentStatus::Failed,
                        Some("unschedulable"),
                    )
                    .await?;
                    Outcome::FailedTerminal
                } else {
                    Outcome::Deferred { attempts }
                }
            }
        };

        // A lease that ran out no longer guarantees exclusivity over the
        // cluster's running set; committing now could break the capacity
        // invariant against a successor's decision.
        if lease.is_expired() {
            return Ok(Outcome::Abandoned);
        }
        tx.commit().await?;

        Ok(outcome)
    }
}

/// Capped exponential backoff for deferred retries:
/// `min(base * 2^(n-1), cap)`, spread by up to 20% of jitter.
pub fn defer_backoff(attempt: i32, base: Duration, cap: Duration) -> Duration {
    let n = attempt.max(1) as u32;
    let exp = base.saturating_mul(2u32.saturating_pow(n.saturating_sub(1)));
    let capped = exp.min(cap);
    let jitter = rand::thread_rng().gen_range(0.8..=1.2);
    capped.mul_f64(jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: Duration = Duration::from_millis(5_000);
    const CAP: Duration = Duration::from_millis(60_000);

    #[test]
    fn backoff_first_attempt_starts_at_base() {
        for _ in 0..32 {
            let d = defer_backoff(1, BASE, CAP);
            assert!(d >= BASE.mul_f64(0.8), "{:?} below jitter floor", d);
            assert!(d <= BASE.mul_f64(1.2), "{:?} above jitter ceiling", d);
        }
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        for _ in 0..32 {
            let d = defer_backoff(3, BASE, CAP);
            let expected = Duration::from_millis(20_000);
            assert!(d >= expected.mul_f64(0.8));
            assert!(d <= expected.mul_f64(1.2));
        }
    }

    #[test]
    fn backoff_is_capped() {
        for attempt in [5, 10, 19] {
            let d = defer_backoff(attempt, BASE, CAP);
            assert!(d <= CAP.mul_f64(1.2), "attempt {} gave {:?}", attempt, d);
        }
    }

    #[test]
    fn backoff_tolerates_degenerate_attempts() {
        let d = defer_backoff(0, BASE, CAP);
        assert!(d >= BASE.mul_f64(0.8));
        let d = defer_backoff(10_000, BASE, CAP);
        assert!(d <= CAP.mul_f64(1.2));
    }

    #[test]
    fn worker_config_carries_tuning_from_config() {
        let config = Config {
            database_url: "postgres://localhost/test".into(),
            port: 8080,
            queue_visibility: Duration::from_millis(30_000),
            lock_ttl: Duration::from_millis(10_000),
            retry_base: Duration::from_millis(5_000),
            retry_cap: Duration::from_millis(60_000),
            preempt_requeue_delay: Duration::from_millis(2_000),
            max_attempts: 20,
            worker_concurrency: 4,
            sweep_interval: Duration::from_millis(15_000),
        };
        let wc = SchedulerWorkerConfig::from_config(&config);
        assert!(wc.worker_id.starts_with("scheduler-"));
        assert_eq!(wc.max_attempts, 20);
        assert_eq!(wc.preempt_requeue_delay, Duration::from_millis(2_000));
    }
}
