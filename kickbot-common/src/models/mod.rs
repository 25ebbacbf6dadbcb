// File: kickbot-common/src/models/mod.rs
pub mod channel;
pub mod chat_event;
pub mod command;
pub mod giveaway;
pub mod points;
pub mod reward;
pub mod role;
pub mod scheduled_event;
pub mod settings;

pub use channel::{Channel, ChannelToken, Platform};
pub use chat_event::ChatEvent;
pub use command::{Command, CommandUsage};
pub use giveaway::{Entry, EntryRejection, Giveaway, GiveawayStatus, Requirement, Winner};
pub use points::{PointsBalance, RoleMultipliers};
pub use reward::{Redemption, Reward, RewardRejection, RewardStreamState};
pub use role::{Role, UserLevel};
pub use scheduled_event::{
    EventStatus, EventType, Recurrence, RecurrencePattern, Reminder, ScheduledEvent,
};
pub use settings::{ChannelSettings, DEFAULT_GLOBAL_COOLDOWN_SECONDS};
