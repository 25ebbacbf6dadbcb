use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Error;
use crate::models::{
    Channel, ChannelToken, Command, CommandUsage, Entry, Giveaway, PointsBalance, Redemption,
    Reminder, Reward, ScheduledEvent, Winner,
};

/// Outcome of `Store::claim_entry` — either a new `Entry` id or a marker that
/// the `(giveaway_id, user_id)` uniqueness constraint already holds a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimEntryOutcome {
    Claimed(Uuid),
    AlreadyEntered,
}

#[async_trait]
pub trait ChannelRepository: Send + Sync {
    async fn create_channel(&self, channel: &Channel) -> Result<(), Error>;
    async fn get_channel(&self, id: Uuid) -> Result<Option<Channel>, Error>;
    async fn get_channel_by_external_id(
        &self,
        platform: crate::models::Platform,
        external_id: &str,
    ) -> Result<Option<Channel>, Error>;
    async fn list_active_channels(&self) -> Result<Vec<Channel>, Error>;
    async fn list_channels_for_owner(&self, owner_user_id: Uuid) -> Result<Vec<Channel>, Error>;
    async fn set_channel_active(&self, id: Uuid, active: bool) -> Result<(), Error>;
}

#[async_trait]
pub trait TokenRepository: Send + Sync {
    async fn get_token(&self, channel_id: Uuid) -> Result<Option<ChannelToken>, Error>;
    async fn upsert_token(&self, token: &ChannelToken) -> Result<(), Error>;
}

#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn list_settings(&self, channel_id: Uuid) -> Result<Vec<(String, String)>, Error>;
    async fn set_setting(&self, channel_id: Uuid, key: &str, value: &str) -> Result<(), Error>;
}

#[async_trait]
pub trait CommandRepository: Send + Sync {
    async fn create_command(&self, cmd: &Command) -> Result<(), Error>;
    async fn get_command_by_id(&self, id: Uuid) -> Result<Option<Command>, Error>;
    async fn get_command_by_name(
        &self,
        channel_id: Uuid,
        name: &str,
    ) -> Result<Option<Command>, Error>;
    async fn list_commands(&self, channel_id: Uuid) -> Result<Vec<Command>, Error>;
    async fn update_command(&self, cmd: &Command) -> Result<(), Error>;
    async fn delete_command(&self, id: Uuid) -> Result<(), Error>;
    /// Best-effort, eventually consistent increment (spec §4.E step 9).
    async fn increment_usage_count(&self, id: Uuid) -> Result<(), Error>;
}

#[async_trait]
pub trait CommandUsageRepository: Send + Sync {
    async fn insert_usage(&self, usage: &CommandUsage) -> Result<(), Error>;
}

/// The points/redemption Store (spec §4.A). `adjust_points` and
/// `record_redemption` MUST be atomic single transactions.
#[async_trait]
pub trait PointsRepository: Send + Sync {
    async fn get_balance(&self, channel_id: Uuid, user_id: Uuid) -> Result<Option<PointsBalance>, Error>;

    /// Upserts the row, applies `delta`, rejects if the resulting balance
    /// would be negative, and returns the post-delta value.
    async fn adjust_points(&self, channel_id: Uuid, user_id: Uuid, delta: i64) -> Result<i64, Error>;

    async fn add_watch_seconds(
        &self,
        channel_id: Uuid,
        user_id: Uuid,
        seconds: i64,
    ) -> Result<(), Error>;

    async fn top_points(&self, channel_id: Uuid, limit: i64) -> Result<Vec<PointsBalance>, Error>;
}

#[async_trait]
pub trait RewardRepository: Send + Sync {
    async fn create_reward(&self, reward: &Reward) -> Result<(), Error>;
    async fn get_reward(&self, id: Uuid) -> Result<Option<Reward>, Error>;
    async fn list_rewards(&self, channel_id: Uuid) -> Result<Vec<Reward>, Error>;
    async fn update_reward(&self, reward: &Reward) -> Result<(), Error>;
    async fn delete_reward(&self, id: Uuid) -> Result<(), Error>;

    /// Debits `cost` from the user's balance and inserts a `Redemption` row
    /// in one transaction; fails atomically if the balance is insufficient.
    async fn record_redemption(
        &self,
        channel_id: Uuid,
        user_id: Uuid,
        reward_id: Uuid,
        cost: i64,
    ) -> Result<Uuid, Error>;

    async fn list_redemptions(&self, channel_id: Uuid, limit: i64) -> Result<Vec<Redemption>, Error>;
}

#[async_trait]
pub trait ScheduledEventRepository: Send + Sync {
    async fn create_event(&self, event: &ScheduledEvent) -> Result<(), Error>;
    async fn get_event(&self, id: Uuid) -> Result<Option<ScheduledEvent>, Error>;
    async fn update_event(&self, event: &ScheduledEvent) -> Result<(), Error>;
    async fn delete_event(&self, id: Uuid) -> Result<(), Error>;
    async fn list_pending_events(&self, channel_id: Option<Uuid>) -> Result<Vec<ScheduledEvent>, Error>;
    async fn list_active_events(&self, channel_id: Option<Uuid>) -> Result<Vec<ScheduledEvent>, Error>;
    async fn has_child_for_occurrence(
        &self,
        parent_id: Uuid,
        occurrence_start: DateTime<Utc>,
    ) -> Result<bool, Error>;
}

#[async_trait]
pub trait ReminderRepository: Send + Sync {
    async fn create_reminder(&self, reminder: &Reminder) -> Result<(), Error>;
    async fn list_reminders_for_event(&self, event_id: Uuid) -> Result<Vec<Reminder>, Error>;
    async fn list_pending_reminders(&self) -> Result<Vec<Reminder>, Error>;
    async fn mark_sent(&self, event_id: Uuid, reminder_id: Uuid, sent_at: DateTime<Utc>) -> Result<(), Error>;
}

/// The giveaway Store surface (spec §4.A, §4.I).
#[async_trait]
pub trait GiveawayRepository: Send + Sync {
    async fn create_giveaway(&self, giveaway: &Giveaway) -> Result<(), Error>;
    async fn get_giveaway(&self, id: Uuid) -> Result<Option<Giveaway>, Error>;
    async fn update_giveaway(&self, giveaway: &Giveaway) -> Result<(), Error>;
    async fn list_pending_giveaways(&self, channel_id: Option<Uuid>) -> Result<Vec<Giveaway>, Error>;
    async fn list_active_giveaways(&self, channel_id: Option<Uuid>) -> Result<Vec<Giveaway>, Error>;

    /// Unique-constraint-backed insert on `(giveaway_id, user_id)`.
    async fn claim_entry(
        &self,
        giveaway_id: Uuid,
        user_id: Uuid,
        username: &str,
    ) -> Result<ClaimEntryOutcome, Error>;

    async fn list_entries(&self, giveaway_id: Uuid) -> Result<Vec<Entry>, Error>;

    /// Persists the winner rows and the giveaway's `completed` transition in
    /// one transaction (spec §4.I winner selection step 4).
    async fn complete_with_winners(
        &self,
        giveaway_id: Uuid,
        winners: &[(Uuid, Uuid)], // (user_id, entry_id)
    ) -> Result<Vec<Winner>, Error>;

    async fn list_winners(&self, giveaway_id: Uuid) -> Result<Vec<Winner>, Error>;
}
