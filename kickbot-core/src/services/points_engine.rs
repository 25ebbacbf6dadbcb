// File: kickbot-core/src/services/points_engine.rs

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

use kickbot_common::error::Error;
use kickbot_common::models::{ChannelSettings, Role};
use kickbot_common::traits::PointsRepository;

/// A viewer is considered active if they have chatted within this window
/// (spec §4.F "Active-viewer set").
const ACTIVE_VIEWER_WINDOW: Duration = Duration::seconds(600);

struct ActiveViewer {
    last_chat_activity: DateTime<Utc>,
    roles: Vec<Role>,
}

#[derive(Default)]
struct ChannelState {
    streaming: bool,
    active_viewers: HashMap<Uuid, ActiveViewer>,
}

/// Accrues the channel-local points currency: a periodic per-active-viewer
/// tick plus event-driven grants for chat, follow, subscribe, and raid (spec
/// §4.F). All balance mutation flows through `Store.adjustPoints`, which
/// linearizes concurrent writers for the same `(channel, user)` pair.
pub struct PointsEngine<P> {
    repo: P,
    channels: Mutex<HashMap<Uuid, ChannelState>>,
}

impl<P: PointsRepository> PointsEngine<P> {
    pub fn new(repo: P) -> Self {
        Self {
            repo,
            channels: Mutex::new(HashMap::new()),
        }
    }

    pub async fn on_stream_start(&self, channel_id: Uuid) {
        let mut channels = self.channels.lock().await;
        let state = channels.entry(channel_id).or_default();
        state.streaming = true;
        state.active_viewers.clear();
    }

    pub async fn on_stream_end(&self, channel_id: Uuid) {
        let mut channels = self.channels.lock().await;
        if let Some(state) = channels.get_mut(&channel_id) {
            state.streaming = false;
        }
    }

    pub async fn on_chat(
        &self,
        channel_id: Uuid,
        user_id: Uuid,
        roles: &[Role],
        settings: &ChannelSettings,
    ) -> Result<(), Error> {
        let multiplier = settings.role_multipliers.for_roles(roles);
        let grant = (settings.points_per_chat_message as f64 * multiplier).floor() as i64;

        {
            let mut channels = self.channels.lock().await;
            let state = channels.entry(channel_id).or_default();
            state.active_viewers.insert(
                user_id,
                ActiveViewer {
                    last_chat_activity: Utc::now(),
                    roles: roles.to_vec(),
                },
            );
        }

        if grant != 0 {
            self.repo.adjust_points(channel_id, user_id, grant).await?;
        }
        Ok(())
    }

    pub async fn on_follow(&self, channel_id: Uuid, user_id: Uuid, settings: &ChannelSettings) -> Result<(), Error> {
        if settings.points_per_follow != 0 {
            self.repo.adjust_points(channel_id, user_id, settings.points_per_follow).await?;
        }
        Ok(())
    }

    pub async fn on_subscribe(&self, channel_id: Uuid, user_id: Uuid, settings: &ChannelSettings) -> Result<(), Error> {
        if settings.points_per_subscription != 0 {
            self.repo.adjust_points(channel_id, user_id, settings.points_per_subscription).await?;
        }
        Ok(())
    }

    pub async fn on_raid(
        &self,
        channel_id: Uuid,
        raider_user_id: Uuid,
        viewer_count: u32,
        settings: &ChannelSettings,
    ) -> Result<(), Error> {
        let grant = settings.points_per_raid_viewer * viewer_count as i64;
        if grant != 0 {
            self.repo.adjust_points(channel_id, raider_user_id, grant).await?;
        }
        Ok(())
    }

    /// One periodic tick (spec §4.F, default period 60s). Only advances
    /// grants while the channel is between `StreamStart` and `StreamEnd`.
    /// `tick_period_seconds` is credited to every active viewer's watch time
    /// regardless of their points grant, so `watchTime` giveaway
    /// requirements accrue even when `pointsPerMinute` is zero. Errors from
    /// individual grants are logged and do not abort the tick (spec §7
    /// propagation policy for background loops).
    pub async fn tick(&self, channel_id: Uuid, tick_period_seconds: i64, settings: &ChannelSettings) {
        let now = Utc::now();
        let viewers: Vec<(Uuid, Vec<Role>)> = {
            let mut channels = self.channels.lock().await;
            let Some(state) = channels.get_mut(&channel_id) else {
                return;
            };
            if !state.streaming {
                return;
            }
            state
                .active_viewers
                .retain(|_, v| now - v.last_chat_activity < ACTIVE_VIEWER_WINDOW);
            state
                .active_viewers
                .iter()
                .map(|(user_id, v)| (*user_id, v.roles.clone()))
                .collect()
        };

        for (user_id, roles) in viewers {
            if let Err(e) = self.repo.add_watch_seconds(channel_id, user_id, tick_period_seconds).await {
                warn!(channel_id = %channel_id, %user_id, error = %e, "watch-time accrual failed");
            }

            let multiplier = settings.role_multipliers.for_roles(&roles);
            let grant = (settings.points_per_minute as f64 * multiplier).floor() as i64;
            if grant == 0 {
                continue;
            }
            if let Err(e) = self.repo.adjust_points(channel_id, user_id, grant).await {
                warn!(channel_id = %channel_id, %user_id, error = %e, "points tick grant failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kickbot_common::models::PointsBalance;
    use tokio::sync::Mutex as TokioMutex;

    #[derive(Default)]
    struct FakePointsRepo {
        balances: TokioMutex<HashMap<(Uuid, Uuid), i64>>,
    }

    #[async_trait]
    impl PointsRepository for FakePointsRepo {
        async fn get_balance(&self, channel_id: Uuid, user_id: Uuid) -> Result<Option<PointsBalance>, Error> {
            let points = self.balances.lock().await.get(&(channel_id, user_id)).copied();
            Ok(points.map(|points| PointsBalance {
                channel_id,
                user_id,
                points,
                watch_seconds: 0,
                last_updated: Utc::now(),
            }))
        }

        async fn adjust_points(&self, channel_id: Uuid, user_id: Uuid, delta: i64) -> Result<i64, Error> {
            let mut balances = self.balances.lock().await;
            let entry = balances.entry((channel_id, user_id)).or_insert(0);
            let new_balance = *entry + delta;
            if new_balance < 0 {
                return Err(Error::InsufficientPoints { have: *entry, need: -delta });
            }
            *entry = new_balance;
            Ok(new_balance)
        }

        async fn add_watch_seconds(&self, _channel_id: Uuid, _user_id: Uuid, _seconds: i64) -> Result<(), Error> {
            Ok(())
        }

        async fn top_points(&self, _channel_id: Uuid, _limit: i64) -> Result<Vec<PointsBalance>, Error> {
            Ok(vec![])
        }
    }

    /// Scenario S2: alice (non-subscriber) and bob (subscriber) each chat
    /// once, then a tick fires with pointsPerMinute=1 and subscriber
    /// multiplier 1.5. Both end at balance 2 (chat grant of 1, tick grant of
    /// floor(1*1)=1 for alice and floor(1*1.5)=1 for bob).
    #[tokio::test]
    async fn s2_points_accrual() {
        let channel_id = Uuid::new_v4();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let mut settings = ChannelSettings::default();
        settings.points_per_minute = 1;
        settings.points_per_chat_message = 1;
        settings.role_multipliers.subscriber = 1.5;

        let engine = PointsEngine::new(FakePointsRepo::default());
        engine.on_stream_start(channel_id).await;

        engine.on_chat(channel_id, alice, &[], &settings).await.unwrap();
        engine.on_chat(channel_id, bob, &[Role::Subscriber], &settings).await.unwrap();

        engine.tick(channel_id, 60, &settings).await;

        let alice_balance = engine.repo.get_balance(channel_id, alice).await.unwrap().unwrap();
        let bob_balance = engine.repo.get_balance(channel_id, bob).await.unwrap().unwrap();
        assert_eq!(alice_balance.points, 2);
        assert_eq!(bob_balance.points, 2);
    }

    #[tokio::test]
    async fn tick_is_a_no_op_before_stream_start() {
        let channel_id = Uuid::new_v4();
        let alice = Uuid::new_v4();
        let settings = ChannelSettings::default();

        let engine = PointsEngine::new(FakePointsRepo::default());
        engine.on_chat(channel_id, alice, &[], &settings).await.unwrap();
        engine.tick(channel_id, 60, &settings).await;

        let balance = engine.repo.get_balance(channel_id, alice).await.unwrap().unwrap();
        // The chat-message grant still applies; only the tick grant is gated
        // on `streaming`.
        assert_eq!(balance.points, settings.points_per_chat_message);
    }

    #[tokio::test]
    async fn tick_stops_after_stream_end() {
        let channel_id = Uuid::new_v4();
        let alice = Uuid::new_v4();
        let settings = ChannelSettings::default();

        let engine = PointsEngine::new(FakePointsRepo::default());
        engine.on_stream_start(channel_id).await;
        engine.on_chat(channel_id, alice, &[], &settings).await.unwrap();
        engine.on_stream_end(channel_id).await;
        engine.tick(channel_id, 60, &settings).await;

        let balance = engine.repo.get_balance(channel_id, alice).await.unwrap().unwrap();
        assert_eq!(balance.points, settings.points_per_chat_message);
    }

    #[tokio::test]
    async fn raid_credits_the_raider_by_viewer_count() {
        let channel_id = Uuid::new_v4();
        let raider = Uuid::new_v4();
        let mut settings = ChannelSettings::default();
        settings.points_per_raid_viewer = 2;

        let engine = PointsEngine::new(FakePointsRepo::default());
        engine.on_raid(channel_id, raider, 5, &settings).await.unwrap();

        let balance = engine.repo.get_balance(channel_id, raider).await.unwrap().unwrap();
        assert_eq!(balance.points, 10);
    }
}
