use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A points-redeemable reward in a channel's catalogue. Per-stream counters
/// (`redemption_count_this_stream`, `user_redemption_counts_this_stream`,
/// `last_redemption_at`) are kept in memory by `RewardArbiter`, not persisted —
/// see spec §3 "Reward".
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Reward {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub name: String,
    pub description: String,
    pub cost: i64,
    pub cooldown_seconds: i32,
    pub enabled: bool,
    pub subscriber_only: bool,
    pub moderator_only: bool,
    pub max_per_stream: i32,
    pub max_per_user_per_stream: i32,
}

/// In-memory per-stream state for one reward, owned exclusively by
/// `RewardArbiter` and reset on `onStreamStart` (spec §4.G).
#[derive(Debug, Clone, Default)]
pub struct RewardStreamState {
    pub redemption_count_this_stream: u32,
    pub user_redemption_counts_this_stream: std::collections::HashMap<Uuid, u32>,
    pub last_redemption_at: Option<DateTime<Utc>>,
}

/// An append-only record of a successful points spend (spec §3 "Redemption").
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Redemption {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub user_id: Uuid,
    pub reward_id: Uuid,
    pub cost: i64,
    pub created_at: DateTime<Utc>,
}

/// Reasons a redemption attempt can be rejected, in the order `redeem()`
/// checks them (spec §4.G).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RewardRejection {
    RewardNotFound,
    RewardDisabled,
    OnCooldown { remaining_seconds: i64 },
    StreamCapReached,
    UserCapReached,
    RoleNotSatisfied,
    InsufficientPoints { have: i64, need: i64 },
}
