// File: kickbot-core/src/repositories/postgres/tokens.rs

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use kickbot_common::error::Error;
use kickbot_common::models::ChannelToken;
use kickbot_common::traits::TokenRepository;

pub struct PostgresTokenRepository {
    pub pool: Pool<Postgres>,
}

impl PostgresTokenRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenRepository for PostgresTokenRepository {
    async fn get_token(&self, channel_id: Uuid) -> Result<Option<ChannelToken>, Error> {
        let row = sqlx::query(
            "SELECT channel_id, encrypted_access, encrypted_refresh, expires_at \
             FROM channel_tokens WHERE channel_id = $1",
        )
        .bind(channel_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some(r) => Some(ChannelToken {
                channel_id: r.try_get("channel_id")?,
                encrypted_access: r.try_get("encrypted_access")?,
                encrypted_refresh: r.try_get("encrypted_refresh")?,
                expires_at: r.try_get("expires_at")?,
            }),
            None => None,
        })
    }

    async fn upsert_token(&self, token: &ChannelToken) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO channel_tokens (channel_id, encrypted_access, encrypted_refresh, expires_at)
            VALUES ($1,$2,$3,$4)
            ON CONFLICT (channel_id) DO UPDATE SET
                encrypted_access = EXCLUDED.encrypted_access,
                encrypted_refresh = EXCLUDED.encrypted_refresh,
                expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(token.channel_id)
        .bind(&token.encrypted_access)
        .bind(&token.encrypted_refresh)
        .bind(token.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
