// File: kickbot-core/src/repositories/postgres/channels.rs

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use kickbot_common::error::Error;
use kickbot_common::models::{Channel, Platform};
use kickbot_common::traits::ChannelRepository;

pub struct PostgresChannelRepository {
    pub pool: Pool<Postgres>,
}

impl PostgresChannelRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn row_to_channel(r: &sqlx::postgres::PgRow) -> Result<Channel, Error> {
    let platform: String = r.try_get("platform")?;
    Ok(Channel {
        id: r.try_get("id")?,
        platform: match platform.as_str() {
            "kick" => Platform::Kick,
            "youtube" => Platform::Youtube,
            other => return Err(Error::Internal(format!("unknown platform '{other}'"))),
        },
        external_id: r.try_get("external_id")?,
        display_name: r.try_get("display_name")?,
        owner_user_id: r.try_get("owner_user_id")?,
        active: r.try_get("active")?,
        created_at: r.try_get("created_at")?,
    })
}

#[async_trait]
impl ChannelRepository for PostgresChannelRepository {
    async fn create_channel(&self, channel: &Channel) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO channels (id, platform, external_id, display_name, owner_user_id, active, created_at)
            VALUES ($1,$2,$3,$4,$5,$6,$7)
            "#,
        )
        .bind(channel.id)
        .bind(channel.platform.as_str())
        .bind(&channel.external_id)
        .bind(&channel.display_name)
        .bind(channel.owner_user_id)
        .bind(channel.active)
        .bind(channel.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_channel(&self, id: Uuid) -> Result<Option<Channel>, Error> {
        let row = sqlx::query(
            "SELECT id, platform, external_id, display_name, owner_user_id, active, created_at \
             FROM channels WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_channel).transpose()
    }

    async fn get_channel_by_external_id(
        &self,
        platform: Platform,
        external_id: &str,
    ) -> Result<Option<Channel>, Error> {
        let row = sqlx::query(
            "SELECT id, platform, external_id, display_name, owner_user_id, active, created_at \
             FROM channels WHERE platform = $1 AND external_id = $2",
        )
        .bind(platform.as_str())
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_channel).transpose()
    }

    async fn list_active_channels(&self) -> Result<Vec<Channel>, Error> {
        let rows = sqlx::query(
            "SELECT id, platform, external_id, display_name, owner_user_id, active, created_at \
             FROM channels WHERE active = true",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_channel).collect()
    }

    async fn list_channels_for_owner(&self, owner_user_id: Uuid) -> Result<Vec<Channel>, Error> {
        let rows = sqlx::query(
            "SELECT id, platform, external_id, display_name, owner_user_id, active, created_at \
             FROM channels WHERE owner_user_id = $1",
        )
        .bind(owner_user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_channel).collect()
    }

    async fn set_channel_active(&self, id: Uuid, active: bool) -> Result<(), Error> {
        sqlx::query("UPDATE channels SET active = $1 WHERE id = $2")
            .bind(active)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
