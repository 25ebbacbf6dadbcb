// File: kickbot-core/src/repositories/postgres/settings.rs

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use kickbot_common::error::Error;
use kickbot_common::traits::SettingsRepository;

pub struct PostgresSettingsRepository {
    pub pool: Pool<Postgres>,
}

impl PostgresSettingsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsRepository for PostgresSettingsRepository {
    async fn list_settings(&self, channel_id: Uuid) -> Result<Vec<(String, String)>, Error> {
        let rows = sqlx::query("SELECT key, value FROM settings WHERE channel_id = $1")
            .bind(channel_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|r| Ok((r.try_get("key")?, r.try_get("value")?)))
            .collect()
    }

    async fn set_setting(&self, channel_id: Uuid, key: &str, value: &str) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO settings (channel_id, key, value)
            VALUES ($1,$2,$3)
            ON CONFLICT (channel_id, key) DO UPDATE SET value = EXCLUDED.value
            "#,
        )
        .bind(channel_id)
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
