// File: kickbot-core/src/services/reward_arbiter.rs

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use kickbot_common::error::Error;
use kickbot_common::models::{Reward, RewardRejection, RewardStreamState, Role};
use kickbot_common::traits::RewardRepository;

/// Outcome of a successful redemption attempt, returned for the caller to
/// relay back to chat.
#[derive(Debug, Clone, PartialEq)]
pub struct RedemptionReceipt {
    pub redemption_id: Uuid,
    pub reward_name: String,
    pub cost: i64,
}

/// Orders the checks in spec §4.G `redeem`: enabled, cooldown, per-stream
/// cap, per-user-per-stream cap, role requirement, then the atomic balance
/// debit. Per-stream counters live only in memory and are wiped by
/// `on_stream_start`.
pub struct RewardArbiter<R> {
    repo: R,
    stream_state: Mutex<HashMap<Uuid, RewardStreamState>>,
}

impl<R: RewardRepository> RewardArbiter<R> {
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            stream_state: Mutex::new(HashMap::new()),
        }
    }

    pub async fn on_stream_start(&self, reward_id: Uuid) {
        self.stream_state.lock().await.insert(reward_id, RewardStreamState::default());
    }

    fn role_requirement_satisfied(reward: &Reward, roles: &[Role]) -> bool {
        if reward.moderator_only {
            return roles.iter().any(|r| matches!(r, Role::Moderator | Role::Owner));
        }
        if reward.subscriber_only {
            return roles.iter().any(|r| {
                matches!(r, Role::Subscriber | Role::Vip | Role::Moderator | Role::Owner)
            });
        }
        true
    }

    pub async fn redeem(
        &self,
        channel_id: Uuid,
        user_id: Uuid,
        reward_id: Uuid,
        roles: &[Role],
    ) -> Result<Result<RedemptionReceipt, RewardRejection>, Error> {
        let Some(reward) = self.repo.get_reward(reward_id).await? else {
            return Ok(Err(RewardRejection::RewardNotFound));
        };
        if reward.channel_id != channel_id {
            return Ok(Err(RewardRejection::RewardNotFound));
        }
        if !reward.enabled {
            return Ok(Err(RewardRejection::RewardDisabled));
        }

        let now = Utc::now();
        {
            let mut states = self.stream_state.lock().await;
            let state = states.entry(reward_id).or_default();

            if let Some(last) = state.last_redemption_at {
                let elapsed = (now - last).num_seconds();
                let remaining = reward.cooldown_seconds as i64 - elapsed;
                if remaining > 0 {
                    return Ok(Err(RewardRejection::OnCooldown { remaining_seconds: remaining }));
                }
            }

            if reward.max_per_stream > 0 && state.redemption_count_this_stream >= reward.max_per_stream as u32 {
                return Ok(Err(RewardRejection::StreamCapReached));
            }

            let user_count = state.user_redemption_counts_this_stream.get(&user_id).copied().unwrap_or(0);
            if reward.max_per_user_per_stream > 0 && user_count >= reward.max_per_user_per_stream as u32 {
                return Ok(Err(RewardRejection::UserCapReached));
            }

            if !Self::role_requirement_satisfied(&reward, roles) {
                return Ok(Err(RewardRejection::RoleNotSatisfied));
            }
        }

        let redemption_id = match self.repo.record_redemption(channel_id, user_id, reward_id, reward.cost).await {
            Ok(id) => id,
            Err(Error::InsufficientPoints { have, need }) => {
                return Ok(Err(RewardRejection::InsufficientPoints { have, need }));
            }
            Err(e) => return Err(e),
        };

        let mut states = self.stream_state.lock().await;
        let state = states.entry(reward_id).or_default();
        state.redemption_count_this_stream += 1;
        *state.user_redemption_counts_this_stream.entry(user_id).or_insert(0) += 1;
        state.last_redemption_at = Some(now);

        Ok(Ok(RedemptionReceipt {
            redemption_id,
            reward_name: reward.name,
            cost: reward.cost,
        }))
    }
}
