// File: kickbot-core/src/repositories/mod.rs

pub mod postgres;

pub use postgres::{
    PostgresChannelRepository, PostgresCommandRepository, PostgresCommandUsageRepository,
    PostgresGiveawayRepository, PostgresPointsRepository, PostgresReminderRepository,
    PostgresRewardRepository, PostgresScheduledEventRepository, PostgresSettingsRepository,
    PostgresTokenRepository,
};
