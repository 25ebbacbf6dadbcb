// kickbot-core/src/db/mod.rs

use kickbot_common::Error;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use tracing::info;

/// Thin wrapper over the connection pool. All repositories borrow a clone of
/// the pool rather than the `Database` itself.
#[derive(Clone)]
pub struct Database {
    pool: Pool<Postgres>,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self, Error> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        info!("connected to postgres at {}", database_url);
        Ok(Self { pool })
    }

    /// Runs migrations in the workspace `migrations/` folder.
    pub async fn migrate(&self) -> Result<(), Error> {
        info!("applying migrations...");
        sqlx::migrate!("../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;
        info!("migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }

    pub fn from_pool(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}
