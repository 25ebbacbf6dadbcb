// File: kickbot-core/src/repositories/postgres/mod.rs

mod channels;
mod commands;
mod giveaways;
mod points;
mod rewards;
mod scheduled_events;
mod settings;
mod tokens;

pub use channels::PostgresChannelRepository;
pub use commands::{PostgresCommandRepository, PostgresCommandUsageRepository};
pub use giveaways::PostgresGiveawayRepository;
pub use points::PostgresPointsRepository;
pub use rewards::PostgresRewardRepository;
pub use scheduled_events::{PostgresReminderRepository, PostgresScheduledEventRepository};
pub use settings::PostgresSettingsRepository;
pub use tokens::PostgresTokenRepository;
