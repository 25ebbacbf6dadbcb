use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The streaming platform a channel lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Kick,
    Youtube,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Kick => "kick",
            Platform::Youtube => "youtube",
        }
    }
}

/// A registered streaming destination the runtime manages on behalf of an owner.
/// See spec §3 "Channel".
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Channel {
    pub id: Uuid,
    pub platform: Platform,
    pub external_id: String,
    pub display_name: String,
    pub owner_user_id: Uuid,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Encrypted at-rest OAuth credential pair, exclusively owned by a Channel.
/// See spec §3 "ChannelToken" and §4.B.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChannelToken {
    pub channel_id: Uuid,
    pub encrypted_access: String,
    pub encrypted_refresh: String,
    pub expires_at: DateTime<Utc>,
}
