// File: kickbot-core/src/repositories/postgres/points.rs

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use kickbot_common::error::Error;
use kickbot_common::models::PointsBalance;
use kickbot_common::traits::PointsRepository;

pub struct PostgresPointsRepository {
    pub pool: Pool<Postgres>,
}

impl PostgresPointsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PointsRepository for PostgresPointsRepository {
    async fn get_balance(&self, channel_id: Uuid, user_id: Uuid) -> Result<Option<PointsBalance>, Error> {
        let row = sqlx::query(
            "SELECT channel_id, user_id, points, watch_seconds, last_updated \
             FROM points_balances WHERE channel_id = $1 AND user_id = $2",
        )
        .bind(channel_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some(r) => Some(PointsBalance {
                channel_id: r.try_get("channel_id")?,
                user_id: r.try_get("user_id")?,
                points: r.try_get("points")?,
                watch_seconds: r.try_get("watch_seconds")?,
                last_updated: r.try_get("last_updated")?,
            }),
            None => None,
        })
    }

    /// Upserts the row, applies `delta` within one transaction, and rejects
    /// (rolling back) if the resulting balance would be negative — the
    /// invariant from spec §3/§4.A. Uses `SELECT ... FOR UPDATE` to
    /// linearize concurrent updates for the same `(channel, user)` pair
    /// (spec §4.F "Atomicity").
    async fn adjust_points(&self, channel_id: Uuid, user_id: Uuid, delta: i64) -> Result<i64, Error> {
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

        let new_balance = current + delta;
        if new_balance < 0 {
            tx.rollback().await?;
            return Err(Error::InsufficientPoints {
                have: current,
                need: -delta,
            });
        }

        sqlx::query(
            "UPDATE points_balances SET points = $1, last_updated = $2 \
             WHERE channel_id = $3 AND user_id = $4",
        )
        .bind(new_balance)
        .bind(now)
        .bind(channel_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(new_balance)
    }

    async fn add_watch_seconds(&self, channel_id: Uuid, user_id: Uuid, seconds: i64) -> Result<(), Error> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO points_balances (channel_id, user_id, points, watch_seconds, last_updated)
            VALUES ($1, $2, 0, $3, $4)
            ON CONFLICT (channel_id, user_id) DO UPDATE SET
                watch_seconds = points_balances.watch_seconds + EXCLUDED.watch_seconds,
                last_updated = EXCLUDED.last_updated
            "#,
        )
        .bind(channel_id)
        .bind(user_id)
        .bind(seconds)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn top_points(&self, channel_id: Uuid, limit: i64) -> Result<Vec<PointsBalance>, Error> {
        let rows = sqlx::query(
            "SELECT channel_id, user_id, points, watch_seconds, last_updated \
             FROM points_balances WHERE channel_id = $1 ORDER BY points DESC LIMIT $2",
        )
        .bind(channel_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                Ok(PointsBalance {
                    channel_id: r.try_get("channel_id")?,
                    user_id: r.try_get("user_id")?,
                    points: r.try_get("points")?,
                    watch_seconds: r.try_get("watch_seconds")?,
                    last_updated: r.try_get("last_updated")?,
                })
            })
            .collect()
    }
}
