// File: kickbot-core/src/repositories/postgres/giveaways.rs

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use kickbot_common::error::Error;
use kickbot_common::models::{Entry, Giveaway, GiveawayStatus, Winner};
use kickbot_common::traits::{ClaimEntryOutcome, GiveawayRepository};

pub struct PostgresGiveawayRepository {
    pub pool: Pool<Postgres>,
}

impl PostgresGiveawayRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn parse_status(s: &str) -> Result<GiveawayStatus, Error> {
    Ok(match s {
        "pending" => GiveawayStatus::Pending,
        "active" => GiveawayStatus::Active,
        "completed" => GiveawayStatus::Completed,
        "cancelled" => GiveawayStatus::Cancelled,
        other => return Err(Error::Internal(format!("unknown giveaway status '{other}'"))),
    })
}

fn status_str(s: GiveawayStatus) -> &'static str {
    match s {
        GiveawayStatus::Pending => "pending",
        GiveawayStatus::Active => "active",
        GiveawayStatus::Completed => "completed",
        GiveawayStatus::Cancelled => "cancelled",
    }
}

fn row_to_giveaway(r: &sqlx::postgres::PgRow) -> Result<Giveaway, Error> {
    let status: String = r.try_get("status")?;
    Ok(Giveaway {
        id: r.try_get("id")?,
        channel_id: r.try_get("channel_id")?,
        title: r.try_get("title")?,
        prize_id: r.try_get("prize_id")?,
        status: parse_status(&status)?,
        start_at: r.try_get("start_at")?,
        end_at: r.try_get("end_at")?,
        max_winners: r.try_get("max_winners")?,
        requirements: r.try_get("requirements")?,
    })
}

const GIVEAWAY_COLUMNS: &str =
    "id, channel_id, title, prize_id, status, start_at, end_at, max_winners, requirements";

#[async_trait]
impl GiveawayRepository for PostgresGiveawayRepository {
    async fn create_giveaway(&self, giveaway: &Giveaway) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO giveaways (id, channel_id, title, prize_id, status, start_at, end_at, max_winners, requirements)
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)
            "#,
        )
        .bind(giveaway.id)
        .bind(giveaway.channel_id)
        .bind(&giveaway.title)
        .bind(giveaway.prize_id)
        .bind(status_str(giveaway.status))
        .bind(giveaway.start_at)
        .bind(giveaway.end_at)
        .bind(giveaway.max_winners)
        .bind(&giveaway.requirements)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_giveaway(&self, id: Uuid) -> Result<Option<Giveaway>, Error> {
        let row = sqlx::query(&format!("SELECT {GIVEAWAY_COLUMNS} FROM giveaways WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_giveaway).transpose()
    }

    async fn update_giveaway(&self, giveaway: &Giveaway) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE giveaways SET
                title = $1, prize_id = $2, status = $3, start_at = $4, end_at = $5,
                max_winners = $6, requirements = $7
            WHERE id = $8
            "#,
        )
        .bind(&giveaway.title)
        .bind(giveaway.prize_id)
        .bind(status_str(giveaway.status))
        .bind(giveaway.start_at)
        .bind(giveaway.end_at)
        .bind(giveaway.max_winners)
        .bind(&giveaway.requirements)
        .bind(giveaway.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_pending_giveaways(&self, channel_id: Option<Uuid>) -> Result<Vec<Giveaway>, Error> {
        let rows = match channel_id {
            Some(cid) => {
                sqlx::query(&format!(
                    "SELECT {GIVEAWAY_COLUMNS} FROM giveaways WHERE status = 'pending' AND channel_id = $1"
                ))
                .bind(cid)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {GIVEAWAY_COLUMNS} FROM giveaways WHERE status = 'pending'"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.iter().map(row_to_giveaway).collect()
    }

    async fn list_active_giveaways(&self, channel_id: Option<Uuid>) -> Result<Vec<Giveaway>, Error> {
        let rows = match channel_id {
            Some(cid) => {
                sqlx::query(&format!(
                    "SELECT {GIVEAWAY_COLUMNS} FROM giveaways WHERE status = 'active' AND channel_id = $1"
                ))
                .bind(cid)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {GIVEAWAY_COLUMNS} FROM giveaways WHERE status = 'active'"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.iter().map(row_to_giveaway).collect()
    }

    /// Relies on a unique index on `(giveaway_id, user_id)` (spec §3 "Entry"
    /// uniqueness, §4.A `claimEntry`).
    async fn claim_entry(
        &self,
        giveaway_id: Uuid,
        user_id: Uuid,
        username: &str,
    ) -> Result<ClaimEntryOutcome, Error> {
        let entry_id = Uuid::new_v4();
        let result = sqlx::query(
            r#"
            INSERT INTO entries (id, giveaway_id, user_id, username, created_at)
            VALUES ($1,$2,$3,$4,$5)
            ON CONFLICT (giveaway_id, user_id) DO NOTHING
            "#,
        )
        .bind(entry_id)
        .bind(giveaway_id)
        .bind(user_id)
        .bind(username)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            Ok(ClaimEntryOutcome::Claimed(entry_id))
        } else {
            Ok(ClaimEntryOutcome::AlreadyEntered)
        }
    }

    async fn list_entries(&self, giveaway_id: Uuid) -> Result<Vec<Entry>, Error> {
        let rows = sqlx::query(
            "SELECT id, giveaway_id, user_id, username, created_at FROM entries WHERE giveaway_id = $1",
        )
        .bind(giveaway_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                Ok(Entry {
                    id: r.try_get("id")?,
                    giveaway_id: r.try_get("giveaway_id")?,
                    user_id: r.try_get("user_id")?,
                    username: r.try_get("username")?,
                    created_at: r.try_get("created_at")?,
                })
            })
            .collect()
    }

    /// Persists winner rows and the `completed` transition atomically (spec
    /// §4.I winner selection step 4).
    async fn complete_with_winners(
        &self,
        giveaway_id: Uuid,
        winners: &[(Uuid, Uuid)],
    ) -> Result<Vec<Winner>, Error> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();
        let mut recorded = Vec::with_capacity(winners.len());

        for (user_id, entry_id) in winners {
            sqlx::query(
                r#"
                INSERT INTO winners (giveaway_id, user_id, entry_id, selected_at)
                VALUES ($1,$2,$3,$4)
                "#,
            )
            .bind(giveaway_id)
            .bind(user_id)
            .bind(entry_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            recorded.push(Winner {
                giveaway_id,
                user_id: *user_id,
                entry_id: *entry_id,
                selected_at: now,
            });
        }

        sqlx::query("UPDATE giveaways SET status = 'completed' WHERE id = $1")
            .bind(giveaway_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(recorded)
    }

    async fn list_winners(&self, giveaway_id: Uuid) -> Result<Vec<Winner>, Error> {
        let rows = sqlx::query(
            "SELECT giveaway_id, user_id, entry_id, selected_at FROM winners WHERE giveaway_id = $1",
        )
        .bind(giveaway_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                Ok(Winner {
                    giveaway_id: r.try_get("giveaway_id")?,
                    user_id: r.try_get("user_id")?,
                    entry_id: r.try_get("entry_id")?,
                    selected_at: r.try_get("selected_at")?,
                })
            })
            .collect()
    }
}
