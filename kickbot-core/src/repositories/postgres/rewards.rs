// File: kickbot-core/src/repositories/postgres/rewards.rs

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use kickbot_common::error::Error;
use kickbot_common::models::{Redemption, Reward};
use kickbot_common::traits::RewardRepository;

pub struct PostgresRewardRepository {
    pub pool: Pool<Postgres>,
}

impl PostgresRewardRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn row_to_reward(r: &sqlx::postgres::PgRow) -> Result<Reward, Error> {
    Ok(Reward {
        id: r.try_get("id")?,
        channel_id: r.try_get("channel_id")?,
        name: r.try_get("name")?,
        description: r.try_get("description")?,
        cost: r.try_get("cost")?,
        cooldown_seconds: r.try_get("cooldown_seconds")?,
        enabled: r.try_get("enabled")?,
        subscriber_only: r.try_get("subscriber_only")?,
        moderator_only: r.try_get("moderator_only")?,
        max_per_stream: r.try_get("max_per_stream")?,
        max_per_user_per_stream: r.try_get("max_per_user_per_stream")?,
    })
}

#[async_trait]
impl RewardRepository for PostgresRewardRepository {
    async fn create_reward(&self, reward: &Reward) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO rewards (
                id, channel_id, name, description, cost, cooldown_seconds, enabled,
                subscriber_only, moderator_only, max_per_stream, max_per_user_per_stream
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)
            "#,
        )
        .bind(reward.id)
        .bind(reward.channel_id)
        .bind(&reward.name)
        .bind(&reward.description)
        .bind(reward.cost)
        .bind(reward.cooldown_seconds)
        .bind(reward.enabled)
        .bind(reward.subscriber_only)
        .bind(reward.moderator_only)
        .bind(reward.max_per_stream)
        .bind(reward.max_per_user_per_stream)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_reward(&self, id: Uuid) -> Result<Option<Reward>, Error> {
        let row = sqlx::query(
            "SELECT id, channel_id, name, description, cost, cooldown_seconds, enabled, \
             subscriber_only, moderator_only, max_per_stream, max_per_user_per_stream \
             FROM rewards WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_reward).transpose()
    }

    async fn list_rewards(&self, channel_id: Uuid) -> Result<Vec<Reward>, Error> {
        let rows = sqlx::query(
            "SELECT id, channel_id, name, description, cost, cooldown_seconds, enabled, \
             subscriber_only, moderator_only, max_per_stream, max_per_user_per_stream \
             FROM rewards WHERE channel_id = $1 ORDER BY name ASC",
        )
        .bind(channel_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_reward).collect()
    }

    async fn update_reward(&self, reward: &Reward) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE rewards SET
                name = $1, description = $2, cost = $3, cooldown_seconds = $4, enabled = $5,
                subscriber_only = $6, moderator_only = $7, max_per_stream = $8,
                max_per_user_per_stream = $9
            WHERE id = $10
            "#,
        )
        .bind(&reward.name)
        .bind(&reward.description)
        .bind(reward.cost)
        .bind(reward.cooldown_seconds)
        .bind(reward.enabled)
        .bind(reward.subscriber_only)
        .bind(reward.moderator_only)
        .bind(reward.max_per_stream)
        .bind(reward.max_per_user_per_stream)
        .bind(reward.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_reward(&self, id: Uuid) -> Result<(), Error> {
        sqlx::query("DELETE FROM rewards WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Debits the balance and inserts the `Redemption` row in a single
    /// transaction; rolls back and surfaces `InsufficientPoints` if the
    /// balance would go negative (spec §4.A `recordRedemption`).
    async fn record_redemption(
        &self,
        channel_id: Uuid,
        user_id: Uuid,
        reward_id: Uuid,
        cost: i64,
    ) -> Result<Uuid, Error> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO points_balances (channel_id, user_id, points, watch_seconds, last_updated)
            VALUES ($1, $2, 0, 0, $3)
            ON CONFLICT (channel_id, user_id) DO NOTHING
            "#,
        )
        .bind(channel_id)
        .bind(user_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let current: i64 = sqlx::query(
            "SELECT points FROM points_balances WHERE channel_id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(channel_id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?
        .try_get("points")?;

        if current < cost {
            tx.rollback().await?;
            return Err(Error::InsufficientPoints { have: current, need: cost });
        }

        sqlx::query(
            "UPDATE points_balances SET points = points - $1, last_updated = $2 \
             WHERE channel_id = $3 AND user_id = $4",
        )
        .bind(cost)
        .bind(now)
        .bind(channel_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        let redemption_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO redemptions (id, channel_id, user_id, reward_id, cost, created_at)
            VALUES ($1,$2,$3,$4,$5,$6)
            "#,
        )
        .bind(redemption_id)
        .bind(channel_id)
        .bind(user_id)
        .bind(reward_id)
        .bind(cost)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(redemption_id)
    }

    async fn list_redemptions(&self, channel_id: Uuid, limit: i64) -> Result<Vec<Redemption>, Error> {
        let rows = sqlx::query(
            "SELECT id, channel_id, user_id, reward_id, cost, created_at \
             FROM redemptions WHERE channel_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(channel_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                Ok(Redemption {
                    id: r.try_get("id")?,
                    channel_id: r.try_get("channel_id")?,
                    user_id: r.try_get("user_id")?,
                    reward_id: r.try_get("reward_id")?,
                    cost: r.try_get("cost")?,
                    created_at: r.try_get("created_at")?,
                })
            })
            .collect()
    }
}
