// Scheduler worker process: a pool of scheduling workers plus the recovery
// sweeper. Exits 0 on signal-driven shutdown, non-zero when a worker dies
// on an unrecoverable store or queue failure.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use server_core::kernel::{
    ClusterLockService, RecoverySweeper, SchedulerWorker, SchedulerWorkerConfig, SchedulingQueue,
};
use server_core::Config;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,server_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting scheduler worker process");

    let config = Config::from_env().context("Failed to load configuration")?;

    let pool = PgPoolOptions::new()
        .max_connections((config.worker_concurrency as u32 * 2).max(5))
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    let queue = SchedulingQueue::new(pool.clone(), config.queue_visibility);
    let locks = ClusterLockService::new(pool.clone(), config.lock_ttl);

    let mut shutdown_handles: Vec<Arc<AtomicBool>> = Vec::new();
    let mut worker_handles = Vec::new();

    for n in 0..config.worker_concurrency {
        let worker_config = SchedulerWorkerConfig::from_config(&config)
            .with_worker_id(format!("scheduler-{}", n));
        let worker = SchedulerWorker::new(
            pool.clone(),
            queue.clone(),
            locks.clone(),
            worker_config,
        );
        shutdown_handles.push(worker.shutdown_handle());
        worker_handles.push(tokio::spawn(worker.run()));
    }

    let sweeper = RecoverySweeper::new(pool.clone(), queue.clone(), config.sweep_interval);
    shutdown_handles.push(sweeper.shutdown_handle());
    worker_handles.push(tokio::spawn(sweeper.run()));

    // Signal-driven shutdown: flip every shutdown flag, then let the loops
    // finish their current cycle.
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        tracing::info!("received shutdown signal");
        for handle in &shutdown_handles {
            handle.store(true, Ordering::SeqCst);
        }
    });

    let results = futures::future::join_all(worker_handles).await;
    for result in results {
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => bail!("worker terminated with error: {}", e),
            Err(e) => bail!("worker task panicked: {}", e),
        }
    }

    tracing::info!("scheduler worker process stopped");
    Ok(())
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
