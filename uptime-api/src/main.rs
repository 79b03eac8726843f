use anyhow::Context;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use uptime_core::{
    MonitorEngine,
    alert::notifier,
    checker::HealthChecker,
    config::Config,
    db::{create_pool, run_migrations},
    logging,
    store::PgMonitorStore,
};

mod server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_logging("uptime-api");

    let config = Config::from_env().context("failed to load configuration")?;
    info!("Starting uptime API server with config: {:?}", config);

    let db_pool = create_pool(&config.database)
        .await
        .context("failed to connect to database")?;
    info!("Database connection established");

    run_migrations(&db_pool).await.context("failed to run migrations")?;
    info!("Database migrations completed");

    let store = Arc::new(PgMonitorStore::new(db_pool));
    let checker = Arc::new(HealthChecker::new(config.checker.clone())?);
    let notifier = notifier::from_config(&config.smtp)?;
    let engine = Arc::new(MonitorEngine::new(checker, store, notifier));

    let app = server::create_app(Arc::new(server::AppState { engine }));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
