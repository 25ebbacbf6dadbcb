use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum GiveawayStatus {
    Pending,
    Active,
    Completed,
    Cancelled,
}

/// A single entry-gating condition, evaluated by a `RequirementValidator`
/// (spec §3 "Requirement", §4.I).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Requirement {
    Follower,
    Subscriber { min_tier: Option<u32> },
    Points { min_points: i64 },
    WatchTime { min_seconds: i64 },
    /// A named predicate resolved by an external registry; the core does not
    /// interpret `name` itself (spec §3 "custom{predicate}").
    Custom { name: String },
}

impl Requirement {
    pub fn label(&self) -> &'static str {
        match self {
            Requirement::Follower => "follower",
            Requirement::Subscriber { .. } => "subscriber",
            Requirement::Points { .. } => "points",
            Requirement::WatchTime { .. } => "watch_time",
            Requirement::Custom { .. } => "custom",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Giveaway {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub title: String,
    pub prize_id: Option<Uuid>,
    pub status: GiveawayStatus,
    pub start_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
    pub max_winners: i32,
    /// JSON-encoded `Vec<Requirement>`, evaluated in declaration order.
    pub requirements: serde_json::Value,
}

impl Giveaway {
    pub fn requirements_typed(&self) -> Vec<Requirement> {
        serde_json::from_value(self.requirements.clone()).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Entry {
    pub id: Uuid,
    pub giveaway_id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Winner {
    pub giveaway_id: Uuid,
    pub user_id: Uuid,
    pub entry_id: Uuid,
    pub selected_at: DateTime<Utc>,
}

/// Reason an `enter()` call was rejected (spec §4.I step 1-3).
#[derive(Debug, Clone, PartialEq)]
pub enum EntryRejection {
    GiveawayNotActive,
    AlreadyEntered,
    RequirementUnmet { requirement: Requirement, reason: String },
}
