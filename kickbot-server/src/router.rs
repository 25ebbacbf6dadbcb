// kickbot-server/src/router.rs

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

use kickbot_common::error::Error;
use kickbot_common::models::{ChannelSettings, ChatEvent};
use kickbot_common::traits::{PlatformClient, RewardRepository, SettingsRepository};

use kickbot_core::eventbus::{BotEvent, EventBus};
use kickbot_core::repositories::postgres::{
    PostgresCommandRepository, PostgresCommandUsageRepository, PostgresGiveawayRepository,
    PostgresPointsRepository, PostgresRewardRepository, PostgresSettingsRepository,
};
use kickbot_core::services::{
    sweep_due_giveaways, CommandDispatcher, GiveawayManager, PointsEngine, RewardArbiter,
};
use kickbot_core::supervisor::ChannelRouter;
use kickbot_core::TracingNotifier;
use std::sync::Arc;

/// Applied when a channel has no `global_cooldown_seconds` override in its
/// settings table (spec §4.E step 5, `DEFAULT_GLOBAL_COOLDOWN`).
const DEFAULT_GLOBAL_COOLDOWN_SECONDS: i64 = 3;

pub type DynPlatformClient = dyn PlatformClient + Send + Sync;

type Dispatcher =
    CommandDispatcher<PostgresCommandRepository, PostgresCommandUsageRepository, DynPlatformClient>;
type Rewards = RewardArbiter<PostgresRewardRepository>;
type Giveaways = GiveawayManager<PostgresGiveawayRepository, PostgresPointsRepository, TracingNotifier>;

/// One channel's fully wired pipeline: command dispatch, points accrual,
/// reward redemption and giveaway entry, bound to this channel's settings
/// row. Implements `ChannelRouter` so `ChannelSupervisor` can drive it
/// without knowing any of these concrete types (spec §4.J).
pub struct LiveChannelRouter {
    channel_id: Uuid,
    settings_repo: PostgresSettingsRepository,
    reward_repo: PostgresRewardRepository,
    settings: RwLock<ChannelSettings>,
    dispatcher: Dispatcher,
    points: PointsEngine<PostgresPointsRepository>,
    rewards: Rewards,
    giveaways: Giveaways,
    event_bus: Arc<EventBus>,
    tick_period_seconds: i64,
}

impl LiveChannelRouter {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        channel_id: Uuid,
        settings_repo: PostgresSettingsRepository,
        reward_repo: PostgresRewardRepository,
        dispatcher: Dispatcher,
        points: PointsEngine<PostgresPointsRepository>,
        rewards: Rewards,
        giveaways: Giveaways,
        event_bus: Arc<EventBus>,
        tick_period_seconds: i64,
    ) -> Self {
        Self {
            channel_id,
            settings_repo,
            reward_repo,
            settings: RwLock::new(ChannelSettings::default()),
            dispatcher,
            points,
            rewards,
            giveaways,
            event_bus,
            tick_period_seconds,
        }
    }
}

#[async_trait]
impl ChannelRouter for LiveChannelRouter {
    async fn load(&self) -> Result<(), Error> {
        let pairs = self.settings_repo.list_settings(self.channel_id).await?;
        *self.settings.write().await = ChannelSettings::from_kv(&pairs);
        self.dispatcher.reload_channel(self.channel_id).await?;
        Ok(())
    }

    async fn route(&self, event: ChatEvent) -> Result<(), Error> {
        self.event_bus.publish(BotEvent::Chat(event.clone())).await;
        let settings = self.settings.read().await.clone();
        match event {
            ChatEvent::Message { channel_id, user_id, username, text, roles, .. } => {
                let cooldown = settings.global_cooldown_seconds.unwrap_or(DEFAULT_GLOBAL_COOLDOWN_SECONDS);
                self.dispatcher
                    .on_message(channel_id, user_id, &username, &text, &roles, &settings.prefix, cooldown)
                    .await?;
                self.points.on_chat(channel_id, user_id, &roles, &settings).await?;
            }
            ChatEvent::Follow { channel_id, user_id, .. } => {
                self.points.on_follow(channel_id, user_id, &settings).await?;
                self.giveaways.record_follow(channel_id, user_id).await;
            }
            ChatEvent::Subscribe { channel_id, user_id, .. } => {
                self.points.on_subscribe(channel_id, user_id, &settings).await?;
            }
            ChatEvent::Raid { channel_id, raider_user_id, viewer_count, .. } => {
                self.points.on_raid(channel_id, raider_user_id, viewer_count, &settings).await?;
            }
            ChatEvent::StreamStart { channel_id } => {
                self.points.on_stream_start(channel_id).await;
                // RewardArbiter keys its in-memory stream state by reward
                // id, not channel id, so every reward on this channel needs
                // its own reset call.
                for reward in self.reward_repo.list_rewards(channel_id).await? {
                    self.rewards.on_stream_start(reward.id).await;
                }
            }
            ChatEvent::StreamEnd { channel_id } => {
                self.points.on_stream_end(channel_id).await;
            }
        }
        Ok(())
    }

    async fn tick(&self) {
        let settings = self.settings.read().await.clone();
        self.points.tick(self.channel_id, self.tick_period_seconds, &settings).await;
        if let Err(e) = sweep_due_giveaways(&self.giveaways, self.channel_id).await {
            warn!(channel_id = %self.channel_id, error = %e, "giveaway sweep failed");
        }
    }

    async fn flush(&self) {
        self.dispatcher.unload_channel(self.channel_id).await;
    }
}
