// File: kickbot-common/src/traits/mod.rs
pub mod platform_traits;
pub mod repository_traits;

pub use platform_traits::{ChannelInfo, ChatIngress, Notifier, PlatformClient, UserInfo};
pub use repository_traits::{
    ChannelRepository, ClaimEntryOutcome, CommandRepository, CommandUsageRepository,
    GiveawayRepository, PointsRepository, ReminderRepository, RewardRepository,
    ScheduledEventRepository, SettingsRepository, TokenRepository,
};
