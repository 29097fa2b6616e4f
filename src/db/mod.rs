pub mod models;
pub mod read;
pub mod repository;

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::Config;

/// Connect a pool sized for the scan fan-out plus the probe worker pool.
/// Tasks never share a checked-out connection; each acquires from the pool
/// on entry.
pub async fn connect(cfg: &Config) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(32)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&cfg.database_url())
        .await?;
    Ok(pool)
}

/// Apply the idempotent schema at startup.
pub async fn init_schema(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::raw_sql(include_str!("../../migrations/schema.sql"))
        .execute(pool)
        .await?;
    Ok(())
}
