use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle states for a `ScheduledEvent`. Transitions allowed by §4.H:
/// `pending -> active`, `active -> completed`, `pending|active -> cancelled`,
/// any -> `failed` (handler error during promotion).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Pending,
    Active,
    Completed,
    Cancelled,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Stream,
    SocialPost,
    Reminder,
    Giveaway,
    ChannelUpdate,
    Automation,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurrencePattern {
    Daily,
    Weekly,
    Monthly,
    /// Acknowledged but out of scope; rejected at creation (spec §4.H).
    Custom,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recurrence {
    pub pattern: RecurrencePattern,
    /// UTC instant of the last generated child instance, if any.
    pub last_generated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ScheduledEvent {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub title: String,
    pub event_type: EventType,
    pub status: EventStatus,
    pub start_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
    /// JSON-encoded `Recurrence`, or `NULL` for a one-shot event.
    pub recurrence: Option<serde_json::Value>,
    pub metadata: serde_json::Value,
    /// Set when this event was generated as a recurrence child; used to
    /// dedupe generation (spec §4.H step 4: "no child instance exists").
    pub recurrence_parent_id: Option<Uuid>,
}

impl ScheduledEvent {
    pub fn recurrence_typed(&self) -> Option<Recurrence> {
        self.recurrence
            .as_ref()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// A reminder fired at `event.start_at - lead_seconds`, child of a
/// `ScheduledEvent` (spec §3 "Reminder").
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Reminder {
    pub id: Uuid,
    pub event_id: Uuid,
    pub lead_seconds: i64,
    /// Channel ids to notify.
    pub channels: Vec<Uuid>,
    pub message: Option<String>,
    pub sent: bool,
    pub sent_at: Option<DateTime<Utc>>,
}
