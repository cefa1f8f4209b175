use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::info;

use crate::app_config::DatabaseConfig;

/// Shared Postgres pool. Every `Store*Repository` clones the pool out of it.
#[derive(Clone)]
pub struct DbClient {
    pub pool: PgPool,
}

impl DbClient {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.url)
            .await?;

        info!(max_connections = config.max_connections, "Connected to Postgres");
        Ok(Self { pool })
    }

    /// Applies the embedded schema migrations in `migrations/`.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        let migrator = sqlx::migrate!("../migrations");
        info!(available = migrator.iter().count(), "Running marketplace schema migrations");
        migrator.run(&self.pool).await
    }
}
