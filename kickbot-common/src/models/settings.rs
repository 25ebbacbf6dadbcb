use serde::{Deserialize, Serialize};

use crate::models::points::RoleMultipliers;

/// Per-channel configuration knobs, backed by the `settings(channel_id, key,
/// value)` table (spec §6). Loaded once at channel activation; refreshed only
/// via an explicit reload (spec §9 design note on shared mutable caches).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSettings {
    pub prefix: String,
    pub welcome_message: Option<String>,
    pub points_per_minute: i64,
    pub points_per_chat_message: i64,
    pub points_per_follow: i64,
    pub points_per_subscription: i64,
    pub points_per_raid_viewer: i64,
    pub role_multipliers: RoleMultipliers,
    /// Overrides `DEFAULT_GLOBAL_COOLDOWN` for this channel, if set.
    pub global_cooldown_seconds: Option<i64>,
    /// Poll cadence for a polling `ChatIngress`, seconds.
    pub poll_interval_seconds: u64,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            prefix: "!".to_string(),
            welcome_message: None,
            points_per_minute: 1,
            points_per_chat_message: 1,
            points_per_follow: 10,
            points_per_subscription: 50,
            points_per_raid_viewer: 1,
            role_multipliers: RoleMultipliers::default(),
            global_cooldown_seconds: None,
            poll_interval_seconds: 10,
        }
    }
}

impl ChannelSettings {
    pub fn from_kv(pairs: &[(String, String)]) -> Self {
        let mut settings = ChannelSettings::default();
        for (key, value) in pairs {
            match key.as_str() {
                "prefix" => settings.prefix = value.clone(),
                "welcome_message" => settings.welcome_message = Some(value.clone()),
                "points_per_minute" => {
                    if let Ok(v) = value.parse() {
                        settings.points_per_minute = v;
                    }
                }
                "points_per_chat_message" => {
                    if let Ok(v) = value.parse() {
                        settings.points_per_chat_message = v;
                    }
                }
                "points_per_follow" => {
                    if let Ok(v) = value.parse() {
                        settings.points_per_follow = v;
                    }
                }
                "points_per_subscription" => {
                    if let Ok(v) = value.parse() {
                        settings.points_per_subscription = v;
                    }
                }
                "points_per_raid_viewer" => {
                    if let Ok(v) = value.parse() {
                        settings.points_per_raid_viewer = v;
                    }
                }
                "global_cooldown_seconds" => {
                    settings.global_cooldown_seconds = value.parse().ok();
                }
                "poll_interval_seconds" => {
                    if let Ok(v) = value.parse() {
                        settings.poll_interval_seconds = v;
                    }
                }
                "multiplier_subscriber" => {
                    if let Ok(v) = value.parse() {
                        settings.role_multipliers.subscriber = v;
                    }
                }
                "multiplier_vip" => {
                    if let Ok(v) = value.parse() {
                        settings.role_multipliers.vip = v;
                    }
                }
                "multiplier_moderator" => {
                    if let Ok(v) = value.parse() {
                        settings.role_multipliers.moderator = v;
                    }
                }
                _ => { /* unknown key, ignored */ }
            }
        }
        settings
    }
}

/// Default per-command-name global cooldown applied regardless of
/// `Command.cooldown_seconds` (spec §4.E step 5).
pub const DEFAULT_GLOBAL_COOLDOWN_SECONDS: i64 = 1;
