// File: kickbot-core/src/repositories/postgres/commands.rs

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use kickbot_common::error::Error;
use kickbot_common::models::{Command, CommandUsage, UserLevel};
use kickbot_common::traits::{CommandRepository, CommandUsageRepository};

pub struct PostgresCommandRepository {
    pub pool: Pool<Postgres>,
}

impl PostgresCommandRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn row_to_command(r: &sqlx::postgres::PgRow) -> Result<Command, Error> {
    let level: String = r.try_get("user_level")?;
    Ok(Command {
        id: r.try_get("id")?,
        channel_id: r.try_get("channel_id")?,
        name: r.try_get("name")?,
        response_template: r.try_get("response_template")?,
        cooldown_seconds: r.try_get("cooldown_seconds")?,
        user_level: UserLevel::parse(&level)
            .ok_or_else(|| Error::Internal(format!("unknown user_level '{level}'")))?,
        enabled: r.try_get("enabled")?,
        usage_count: r.try_get("usage_count")?,
    })
}

#[async_trait]
impl CommandRepository for PostgresCommandRepository {
    async fn create_command(&self, cmd: &Command) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO commands (id, channel_id, name, response_template, cooldown_seconds, user_level, enabled, usage_count)
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
            "#,
        )
        .bind(cmd.id)
        .bind(cmd.channel_id)
        .bind(&cmd.name)
        .bind(&cmd.response_template)
        .bind(cmd.cooldown_seconds)
        .bind(cmd.user_level.as_str())
        .bind(cmd.enabled)
        .bind(cmd.usage_count)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_command_by_id(&self, id: Uuid) -> Result<Option<Command>, Error> {
        let row = sqlx::query(
            "SELECT id, channel_id, name, response_template, cooldown_seconds, user_level, enabled, usage_count \
             FROM commands WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_command).transpose()
    }

    async fn get_command_by_name(&self, channel_id: Uuid, name: &str) -> Result<Option<Command>, Error> {
        let row = sqlx::query(
            "SELECT id, channel_id, name, response_template, cooldown_seconds, user_level, enabled, usage_count \
             FROM commands WHERE channel_id = $1 AND LOWER(name) = LOWER($2)",
        )
        .bind(channel_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_command).transpose()
    }

    async fn list_commands(&self, channel_id: Uuid) -> Result<Vec<Command>, Error> {
        let rows = sqlx::query(
            "SELECT id, channel_id, name, response_template, cooldown_seconds, user_level, enabled, usage_count \
             FROM commands WHERE channel_id = $1 ORDER BY name ASC",
        )
        .bind(channel_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_command).collect()
    }

    async fn update_command(&self, cmd: &Command) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE commands SET
                name = $1,
                response_template = $2,
                cooldown_seconds = $3,
                user_level = $4,
                enabled = $5,
                usage_count = $6
            WHERE id = $7
            "#,
        )
        .bind(&cmd.name)
        .bind(&cmd.response_template)
        .bind(cmd.cooldown_seconds)
        .bind(cmd.user_level.as_str())
        .bind(cmd.enabled)
        .bind(cmd.usage_count)
        .bind(cmd.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_command(&self, id: Uuid) -> Result<(), Error> {
        sqlx::query("DELETE FROM commands WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn increment_usage_count(&self, id: Uuid) -> Result<(), Error> {
        sqlx::query("UPDATE commands SET usage_count = usage_count + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

pub struct PostgresCommandUsageRepository {
    pub pool: Pool<Postgres>,
}

impl PostgresCommandUsageRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CommandUsageRepository for PostgresCommandUsageRepository {
    async fn insert_usage(&self, usage: &CommandUsage) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO command_usage (id, command_id, channel_id, user_id, used_at, args)
            VALUES ($1,$2,$3,$4,$5,$6)
            "#,
        )
        .bind(usage.id)
        .bind(usage.command_id)
        .bind(usage.channel_id)
        .bind(usage.user_id)
        .bind(usage.used_at)
        .bind(&usage.args)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
