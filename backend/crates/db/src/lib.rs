pub mod activity;
pub mod progress;

use pulse_common::error::{PulseError, PulseResult};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Create a Postgres connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> PulseResult<PgPool> {
    tracing::info!("connecting to database");
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .map_err(|e| PulseError::Database(e.to_string()))
}

/// Apply the bundled schema migrations.
pub async fn run_migrations(pool: &PgPool) -> PulseResult<()> {
    sqlx::migrate!("../../migrations")
        .run(pool)
        .await
        .map_err(|e| PulseError::Database(e.to_string()))
}
