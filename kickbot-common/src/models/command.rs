use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::role::UserLevel;

/// A custom chat command. Uniqueness: `(channel_id, name)`. See spec §3
/// "Command" and §4.E.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Command {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub name: String,
    pub response_template: String,
    pub cooldown_seconds: i32,
    pub user_level: UserLevel,
    pub enabled: bool,
    pub usage_count: i64,
}

/// Row appended by `CommandDispatcher` on a successful (non-cooled-down)
/// dispatch, batched for eventual-consistency per spec §4.E step 9.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CommandUsage {
    pub id: Uuid,
    pub command_id: Uuid,
    pub channel_id: Uuid,
    pub user_id: Uuid,
    pub used_at: DateTime<Utc>,
    pub args: String,
}
