// File: kickbot-core/src/repositories/postgres/scheduled_events.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use kickbot_common::error::Error;
use kickbot_common::models::{EventStatus, EventType, Reminder, RecurrencePattern, ScheduledEvent};
use kickbot_common::traits::{ReminderRepository, ScheduledEventRepository};

pub struct PostgresScheduledEventRepository {
    pub pool: Pool<Postgres>,
}

impl PostgresScheduledEventRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn row_to_event(r: &sqlx::postgres::PgRow) -> Result<ScheduledEvent, Error> {
    let status: String = r.try_get("status")?;
    let event_type: String = r.try_get("event_type")?;
    Ok(ScheduledEvent {
        id: r.try_get("id")?,
        channel_id: r.try_get("channel_id")?,
        title: r.try_get("title")?,
        event_type: parse_event_type(&event_type)?,
        status: parse_status(&status)?,
        start_at: r.try_get("start_at")?,
        end_at: r.try_get("end_at")?,
        recurrence: r.try_get("recurrence")?,
        metadata: r.try_get("metadata")?,
        recurrence_parent_id: r.try_get("recurrence_parent_id")?,
    })
}

fn parse_status(s: &str) -> Result<EventStatus, Error> {
    Ok(match s {
        "pending" => EventStatus::Pending,
        "active" => EventStatus::Active,
        "completed" => EventStatus::Completed,
        "cancelled" => EventStatus::Cancelled,
        "failed" => EventStatus::Failed,
        other => return Err(Error::Internal(format!("unknown event status '{other}'"))),
    })
}

fn status_str(s: EventStatus) -> &'static str {
    match s {
        EventStatus::Pending => "pending",
        EventStatus::Active => "active",
        EventStatus::Completed => "completed",
        EventStatus::Cancelled => "cancelled",
        EventStatus::Failed => "failed",
    }
}

fn parse_event_type(s: &str) -> Result<EventType, Error> {
    Ok(match s {
        "stream" => EventType::Stream,
        "social_post" => EventType::SocialPost,
        "reminder" => EventType::Reminder,
        "giveaway" => EventType::Giveaway,
        "channel_update" => EventType::ChannelUpdate,
        "automation" => EventType::Automation,
        "other" => EventType::Other,
        other => return Err(Error::Internal(format!("unknown event type '{other}'"))),
    })
}

fn event_type_str(t: EventType) -> &'static str {
    match t {
        EventType::Stream => "stream",
        EventType::SocialPost => "social_post",
        EventType::Reminder => "reminder",
        EventType::Giveaway => "giveaway",
        EventType::ChannelUpdate => "channel_update",
        EventType::Automation => "automation",
        EventType::Other => "other",
    }
}

#[async_trait]
impl ScheduledEventRepository for PostgresScheduledEventRepository {
    async fn create_event(&self, event: &ScheduledEvent) -> Result<(), Error> {
        if matches!(
            event.recurrence_typed(),
            Some(r) if r.pattern == RecurrencePattern::Custom
        ) {
            return Err(Error::PreconditionFailed(
                "custom recurrence patterns are not supported".into(),
            ));
        }

        sqlx::query(
            r#"
            INSERT INTO scheduled_events (
                id, channel_id, title, event_type, status, start_at, end_at,
                recurrence, metadata, recurrence_parent_id
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)
            "#,
        )
        .bind(event.id)
        .bind(event.channel_id)
        .bind(&event.title)
        .bind(event_type_str(event.event_type))
        .bind(status_str(event.status))
        .bind(event.start_at)
        .bind(event.end_at)
        .bind(&event.recurrence)
        .bind(&event.metadata)
        .bind(event.recurrence_parent_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_event(&self, id: Uuid) -> Result<Option<ScheduledEvent>, Error> {
        let row = sqlx::query(
            "SELECT id, channel_id, title, event_type, status, start_at, end_at, \
             recurrence, metadata, recurrence_parent_id FROM scheduled_events WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_event).transpose()
    }

    async fn update_event(&self, event: &ScheduledEvent) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE scheduled_events SET
                title = $1, event_type = $2, status = $3, start_at = $4, end_at = $5,
                recurrence = $6, metadata = $7
            WHERE id = $8
            "#,
        )
        .bind(&event.title)
        .bind(event_type_str(event.event_type))
        .bind(status_str(event.status))
        .bind(event.start_at)
        .bind(event.end_at)
        .bind(&event.recurrence)
        .bind(&event.metadata)
        .bind(event.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_event(&self, id: Uuid) -> Result<(), Error> {
        sqlx::query("DELETE FROM scheduled_events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_pending_events(&self, channel_id: Option<Uuid>) -> Result<Vec<ScheduledEvent>, Error> {
        let rows = match channel_id {
            Some(cid) => {
                sqlx::query(
                    "SELECT id, channel_id, title, event_type, status, start_at, end_at, \
                     recurrence, metadata, recurrence_parent_id FROM scheduled_events \
                     WHERE status = 'pending' AND channel_id = $1",
                )
                .bind(cid)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT id, channel_id, title, event_type, status, start_at, end_at, \
                     recurrence, metadata, recurrence_parent_id FROM scheduled_events \
                     WHERE status = 'pending'",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.iter().map(row_to_event).collect()
    }

    async fn list_active_events(&self, channel_id: Option<Uuid>) -> Result<Vec<ScheduledEvent>, Error> {
        let rows = match channel_id {
            Some(cid) => {
                sqlx::query(
                    "SELECT id, channel_id, title, event_type, status, start_at, end_at, \
                     recurrence, metadata, recurrence_parent_id FROM scheduled_events \
                     WHERE status = 'active' AND channel_id = $1",
                )
                .bind(cid)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT id, channel_id, title, event_type, status, start_at, end_at, \
                     recurrence, metadata, recurrence_parent_id FROM scheduled_events \
                     WHERE status = 'active'",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.iter().map(row_to_event).collect()
    }

    async fn has_child_for_occurrence(
        &self,
        parent_id: Uuid,
        occurrence_start: DateTime<Utc>,
    ) -> Result<bool, Error> {
        let row = sqlx::query(
            "SELECT 1 FROM scheduled_events WHERE recurrence_parent_id = $1 AND start_at = $2",
        )
        .bind(parent_id)
        .bind(occurrence_start)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }
}

pub struct PostgresReminderRepository {
    pub pool: Pool<Postgres>,
}

impl PostgresReminderRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn row_to_reminder(r: &sqlx::postgres::PgRow) -> Result<Reminder, Error> {
    Ok(Reminder {
        id: r.try_get("id")?,
        event_id: r.try_get("event_id")?,
        lead_seconds: r.try_get("lead_seconds")?,
        channels: r.try_get("channels")?,
        message: r.try_get("message")?,
        sent: r.try_get("sent")?,
        sent_at: r.try_get("sent_at")?,
    })
}

#[async_trait]
impl ReminderRepository for PostgresReminderRepository {
    async fn create_reminder(&self, reminder: &Reminder) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO reminders (id, event_id, lead_seconds, channels, message, sent, sent_at)
            VALUES ($1,$2,$3,$4,$5,$6,$7)
            "#,
        )
        .bind(reminder.id)
        .bind(reminder.event_id)
        .bind(reminder.lead_seconds)
        .bind(&reminder.channels)
        .bind(&reminder.message)
        .bind(reminder.sent)
        .bind(reminder.sent_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_reminders_for_event(&self, event_id: Uuid) -> Result<Vec<Reminder>, Error> {
        let rows = sqlx::query(
            "SELECT id, event_id, lead_seconds, channels, message, sent, sent_at \
             FROM reminders WHERE event_id = $1",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_reminder).collect()
    }

    async fn list_pending_reminders(&self) -> Result<Vec<Reminder>, Error> {
        let rows = sqlx::query(
            "SELECT id, event_id, lead_seconds, channels, message, sent, sent_at \
             FROM reminders WHERE sent = false",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_reminder).collect()
    }

    async fn mark_sent(&self, event_id: Uuid, reminder_id: Uuid, sent_at: DateTime<Utc>) -> Result<(), Error> {
        sqlx::query(
            "UPDATE reminders SET sent = true, sent_at = $1 WHERE id = $2 AND event_id = $3",
        )
        .bind(sent_at)
        .bind(reminder_id)
        .bind(event_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
