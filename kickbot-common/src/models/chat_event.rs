use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::role::Role;

/// A normalized inbound event from a `ChatIngress` (spec §4.D).
#[derive(Debug, Clone)]
pub enum ChatEvent {
    Message {
        channel_id: Uuid,
        user_id: Uuid,
        username: String,
        text: String,
        roles: Vec<Role>,
        received_at: DateTime<Utc>,
        /// Platform-native message id, used by polling adapters for dedup.
        external_id: String,
    },
    Follow {
        channel_id: Uuid,
        user_id: Uuid,
        username: String,
    },
    Subscribe {
        channel_id: Uuid,
        user_id: Uuid,
        username: String,
        tier: u32,
    },
    Raid {
        channel_id: Uuid,
        raider_user_id: Uuid,
        raider_username: String,
        viewer_count: u32,
    },
    StreamStart {
        channel_id: Uuid,
    },
    StreamEnd {
        channel_id: Uuid,
    },
}

impl ChatEvent {
    pub fn channel_id(&self) -> Uuid {
        match self {
            ChatEvent::Message { channel_id, .. }
            | ChatEvent::Follow { channel_id, .. }
            | ChatEvent::Subscribe { channel_id, .. }
            | ChatEvent::Raid { channel_id, .. }
            | ChatEvent::StreamStart { channel_id }
            | ChatEvent::StreamEnd { channel_id } => *channel_id,
        }
    }
}
