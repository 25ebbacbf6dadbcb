// File: kickbot-core/src/services/requirement_validators.rs

use std::collections::{HashMap, HashSet};

use tokio::sync::Mutex;
use uuid::Uuid;

use kickbot_common::error::Error;
use kickbot_common::models::{Requirement, Role};
use kickbot_common::traits::PointsRepository;

/// Checks `Requirement`s in declaration order against a user (spec §4.I
/// step 3). Grounded on the original bot's per-type validator registry
/// (`FollowerValidator`, `SubscriberValidator`, `PointsValidator`,
/// `WatchTimeValidator`), collapsed into one struct since each check here is
/// a handful of lines rather than its own database round-trip class.
///
/// Follower status has no dedicated repository in this system; it is
/// inferred from observed `ChatEvent::Follow` events recorded in memory via
/// `record_follow`, mirroring `PointsEngine`'s active-viewer tracking.
pub struct RequirementValidators<P> {
    points: P,
    followers: Mutex<HashMap<Uuid, HashSet<Uuid>>>,
}

impl<P: PointsRepository> RequirementValidators<P> {
    pub fn new(points: P) -> Self {
        Self {
            points,
            followers: Mutex::new(HashMap::new()),
        }
    }

    pub async fn record_follow(&self, channel_id: Uuid, user_id: Uuid) {
        self.followers.lock().await.entry(channel_id).or_default().insert(user_id);
    }

    /// Returns `Ok(Ok(()))` if satisfied, `Ok(Err(reason))` if not, `Err` on
    /// a repository failure.
    pub async fn check(
        &self,
        channel_id: Uuid,
        user_id: Uuid,
        roles: &[Role],
        requirement: &Requirement,
    ) -> Result<Result<(), String>, Error> {
        match requirement {
            Requirement::Follower => {
                let followers = self.followers.lock().await;
                let is_follower = followers.get(&channel_id).is_some_and(|set| set.contains(&user_id));
                Ok(if is_follower {
                    Ok(())
                } else {
                    Err("you must follow the channel to enter".to_string())
                })
            }
            Requirement::Subscriber { .. } => {
                // Subscription tier is not modeled beyond the `Role` badge
                // set; any subscriber-or-above role satisfies a tiered
                // requirement (see DESIGN.md).
                let is_subscriber = roles
                    .iter()
                    .any(|r| matches!(r, Role::Subscriber | Role::Vip | Role::Moderator | Role::Owner));
                Ok(if is_subscriber {
                    Ok(())
                } else {
                    Err("you must be subscribed to enter".to_string())
                })
            }
            Requirement::Points { min_points } => {
                let balance = self.points.get_balance(channel_id, user_id).await?;
                let have = balance.map(|b| b.points).unwrap_or(0);
                Ok(if have >= *min_points {
                    Ok(())
                } else {
                    Err(format!("you need at least {min_points} points (you have {have})"))
                })
            }
            Requirement::WatchTime { min_seconds } => {
                let balance = self.points.get_balance(channel_id, user_id).await?;
                let have = balance.map(|b| b.watch_seconds).unwrap_or(0);
                Ok(if have >= *min_seconds {
                    Ok(())
                } else {
                    Err(format!(
                        "you need at least {} minutes of watch time (you have {})",
                        min_seconds / 60,
                        have / 60
                    ))
                })
            }
            Requirement::Custom { name } => {
                Ok(Err(format!("custom requirement '{name}' is not configured")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kickbot_common::models::PointsBalance;
    use chrono::Utc;

    struct FakePointsRepo {
        balance: i64,
        watch_seconds: i64,
    }

    #[async_trait]
    impl PointsRepository for FakePointsRepo {
        async fn get_balance(&self, channel_id: Uuid, user_id: Uuid) -> Result<Option<PointsBalance>, Error> {
            Ok(Some(PointsBalance {
                channel_id,
                user_id,
                points: self.balance,
                watch_seconds: self.watch_seconds,
                last_updated: Utc::now(),
            }))
        }
        async fn adjust_points(&self, _channel_id: Uuid, _user_id: Uuid, _delta: i64) -> Result<i64, Error> {
            unimplemented!()
        }
        async fn add_watch_seconds(&self, _channel_id: Uuid, _user_id: Uuid, _seconds: i64) -> Result<(), Error> {
            unimplemented!()
        }
        async fn top_points(&self, _channel_id: Uuid, _limit: i64) -> Result<Vec<PointsBalance>, Error> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn follower_requirement_rejects_a_stranger_and_accepts_a_recorded_follow() {
        let channel_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let validators = RequirementValidators::new(FakePointsRepo { balance: 0, watch_seconds: 0 });

        let before = validators.check(channel_id, user_id, &[], &Requirement::Follower).await.unwrap();
        assert!(before.is_err());

        validators.record_follow(channel_id, user_id).await;
        let after = validators.check(channel_id, user_id, &[], &Requirement::Follower).await.unwrap();
        assert!(after.is_ok());
    }

    #[tokio::test]
    async fn points_requirement_compares_against_balance() {
        let channel_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let validators = RequirementValidators::new(FakePointsRepo { balance: 50, watch_seconds: 0 });

        let ok = validators
            .check(channel_id, user_id, &[], &Requirement::Points { min_points: 50 })
            .await
            .unwrap();
        assert!(ok.is_ok());

        let rejected = validators
            .check(channel_id, user_id, &[], &Requirement::Points { min_points: 51 })
            .await
            .unwrap();
        assert!(rejected.is_err());
    }

    #[tokio::test]
    async fn custom_requirement_is_always_unmet_without_a_registry() {
        let channel_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let validators = RequirementValidators::new(FakePointsRepo { balance: 0, watch_seconds: 0 });

        let outcome = validators
            .check(channel_id, user_id, &[], &Requirement::Custom { name: "dance".to_string() })
            .await
            .unwrap();
        assert!(outcome.is_err());
    }
}
