use anyhow::Context;
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};
use uptime_core::{
    MonitorEngine,
    alert::notifier,
    checker::HealthChecker,
    config::Config,
    db::{create_pool, run_migrations},
    logging,
    store::PgMonitorStore,
};

mod pool;
mod scheduler;

use scheduler::IntervalScheduler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_logging("uptime-scheduler");

    let config = Config::from_env().context("failed to load configuration")?;
    info!("Starting uptime scheduler with config: {:?}", config);

    let db_pool = create_pool(&config.database)
        .await
        .context("failed to connect to database")?;
    info!("Database connection established");

    run_migrations(&db_pool).await.context("failed to run migrations")?;
    info!("Database migrations completed");

    let store = Arc::new(PgMonitorStore::new(db_pool));
    let checker = Arc::new(HealthChecker::new(config.checker.clone())?);
    let notifier = notifier::from_config(&config.smtp)?;
    info!(notifier = notifier.name(), "Alert notifier ready");

    let engine = Arc::new(MonitorEngine::new(checker, store, notifier));
    let mut scheduler = IntervalScheduler::new(engine, &config.scheduler).await?;
    scheduler.start().await?;

    info!("Uptime scheduler is running. Press Ctrl+C to stop.");

    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received");
    scheduler.stop().await?;

    let grace = config.checker.request_timeout() + Duration::from_secs(5);
    if !scheduler.pool().wait_idle(grace).await {
        warn!(
            in_flight = scheduler.pool().pending(),
            "Exiting with checks still in flight"
        );
    }

    Ok(())
}
