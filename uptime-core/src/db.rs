use sqlx::{Pool, Postgres, postgres::PgPoolOptions};
use crate::{config::DatabaseConfig, error::Result};

pub type DatabasePool = Pool<Postgres>;

pub async fn create_pool(config: &DatabaseConfig) -> Result<DatabasePool> {
    let connection_string = match &config.url {
        Some(url) => url.clone(),
        None => format!(
            "postgres://{}:{}@{}:{}/{}",
            config.username,
            config.password,
            config.host,
            config.port,
            config.database
        ),
    };

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&connection_string)
        .await?;

    Ok(pool)
}

pub async fn run_migrations(pool: &DatabasePool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
