use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// How long a reserved queue job stays invisible before redelivery.
    pub queue_visibility: Duration,
    /// Per-cluster lock lease TTL. Must be shorter than queue_visibility.
    pub lock_ttl: Duration,
    /// Base delay of the deferred-retry backoff schedule.
    pub retry_base: Duration,
    /// Cap of the deferred-retry backoff schedule.
    pub retry_cap: Duration,
    /// Fixed re-enqueue delay for deployments that were just preempted.
    pub preempt_requeue_delay: Duration,
    /// Defer attempts after which a deployment is failed as unschedulable.
    pub max_attempts: i32,
    /// Number of scheduler worker tasks in the worker process.
    pub worker_concurrency: usize,
    /// Interval of the recovery sweeper scan.
    pub sweep_interval: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            queue_visibility: env_ms("QUEUE_VISIBILITY_MS", 30_000)?,
            lock_ttl: env_ms("LOCK_TTL_MS", 10_000)?,
            retry_base: env_ms("RETRY_BASE_MS", 5_000)?,
            retry_cap: env_ms("RETRY_CAP_MS", 60_000)?,
            preempt_requeue_delay: env_ms("PREEMPT_REQUEUE_DELAY_MS", 2_000)?,
            max_attempts: env::var("MAX_ATTEMPTS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .context("MAX_ATTEMPTS must be a valid number")?,
            worker_concurrency: env::var("WORKER_CONCURRENCY")
                .unwrap_or_else(|_| "4".to_string())
                .parse()
                .context("WORKER_CONCURRENCY must be a valid number")?,
            sweep_interval: env_ms("SWEEP_INTERVAL_MS", 15_000)?,
        })
    }
}

/// Read a millisecond duration from the environment with a default.
fn env_ms(key: &str, default_ms: u64) -> Result<Duration> {
    let ms: u64 = env::var(key)
        .unwrap_or_else(|_| default_ms.to_string())
        .parse()
        .with_context(|| format!("{} must be a millisecond count", key))?;
    Ok(Duration::from_millis(ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_ms_falls_back_to_default() {
        let d = env_ms("THIS_VAR_IS_NOT_SET_ANYWHERE", 1_500).unwrap();
        assert_eq!(d, Duration::from_millis(1_500));
    }
}
