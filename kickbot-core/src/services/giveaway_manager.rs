// File: kickbot-core/src/services/giveaway_manager.rs

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rand::seq::SliceRandom;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use kickbot_common::error::Error;
use kickbot_common::models::{EntryRejection, Giveaway, GiveawayStatus, Role, ScheduledEvent, Winner};
use kickbot_common::traits::{ClaimEntryOutcome, GiveawayRepository, Notifier, PointsRepository};

use super::requirement_validators::RequirementValidators;
use super::scheduler::EventHandler;

/// Drives the giveaway lifecycle (`pending -> active -> completed`, any state
/// `-> cancelled`) and the entry flow (spec §4.I). Winner selection is a
/// uniform random sample with no replacement over the recorded entries.
pub struct GiveawayManager<G, P, N> {
    repo: G,
    validators: RequirementValidators<P>,
    notifier: N,
}

impl<G, P, N> GiveawayManager<G, P, N>
where
    G: GiveawayRepository,
    P: PointsRepository,
    N: Notifier,
{
    pub fn new(repo: G, validators: RequirementValidators<P>, notifier: N) -> Self {
        Self { repo, validators, notifier }
    }

    pub async fn record_follow(&self, channel_id: Uuid, user_id: Uuid) {
        self.validators.record_follow(channel_id, user_id).await;
    }

    pub async fn activate(&self, giveaway_id: Uuid) -> Result<(), Error> {
        let mut giveaway = self
            .repo
            .get_giveaway(giveaway_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("giveaway {giveaway_id}")))?;
        if giveaway.status != GiveawayStatus::Pending {
            return Err(Error::PreconditionFailed(format!(
                "giveaway {giveaway_id} is not pending"
            )));
        }
        giveaway.status = GiveawayStatus::Active;
        self.repo.update_giveaway(&giveaway).await
    }

    pub async fn cancel(&self, giveaway_id: Uuid) -> Result<(), Error> {
        let mut giveaway = self
            .repo
            .get_giveaway(giveaway_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("giveaway {giveaway_id}")))?;
        if giveaway.status == GiveawayStatus::Completed {
            return Err(Error::PreconditionFailed(format!(
                "giveaway {giveaway_id} is already completed"
            )));
        }
        giveaway.status = GiveawayStatus::Cancelled;
        self.repo.update_giveaway(&giveaway).await
    }

    /// Implements spec §4.I `enter`: active check, atomic claim, then every
    /// `Requirement` in declaration order. The first unmet requirement
    /// short-circuits the remaining checks.
    pub async fn enter(
        &self,
        giveaway_id: Uuid,
        user_id: Uuid,
        username: &str,
        roles: &[Role],
    ) -> Result<Result<Uuid, EntryRejection>, Error> {
        let giveaway = self
            .repo
            .get_giveaway(giveaway_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("giveaway {giveaway_id}")))?;
        if giveaway.status != GiveawayStatus::Active {
            return Ok(Err(EntryRejection::GiveawayNotActive));
        }

        let entry_id = match self.repo.claim_entry(giveaway_id, user_id, username).await? {
            ClaimEntryOutcome::Claimed(id) => id,
            ClaimEntryOutcome::AlreadyEntered => return Ok(Err(EntryRejection::AlreadyEntered)),
        };

        for requirement in giveaway.requirements_typed() {
            match self.validators.check(giveaway.channel_id, user_id, roles, &requirement).await? {
                Ok(()) => continue,
                Err(reason) => {
                    return Ok(Err(EntryRejection::RequirementUnmet { requirement, reason }));
                }
            }
        }

        Ok(Ok(entry_id))
    }

    /// Implements spec §4.I winner selection: sample `min(maxWinners,
    /// entries.len())` entries uniformly without replacement, persist the
    /// winners and the `completed` transition atomically, then notify the
    /// channel and each winner. An empty entry pool still completes the
    /// giveaway with zero winners (spec §4.I edge case).
    pub async fn complete(&self, giveaway_id: Uuid) -> Result<Vec<Winner>, Error> {
        let giveaway = self
            .repo
            .get_giveaway(giveaway_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("giveaway {giveaway_id}")))?;
        if giveaway.status != GiveawayStatus::Active {
            return Err(Error::PreconditionFailed(format!(
                "giveaway {giveaway_id} is not active"
            )));
        }

        let mut entries = self.repo.list_entries(giveaway_id).await?;
        let winner_count = (giveaway.max_winners as usize).min(entries.len());
        entries.shuffle(&mut rand::rng());
        let chosen: Vec<(Uuid, Uuid)> = entries
            .into_iter()
            .take(winner_count)
            .map(|e| (e.user_id, e.id))
            .collect();

        if let Some(prize_id) = giveaway.prize_id {
            info!(%giveaway_id, %prize_id, winner_count = chosen.len(), "prize assignment pending admin integration");
        }

        let winners = self.repo.complete_with_winners(giveaway_id, &chosen).await?;

        if winners.is_empty() {
            self.notifier
                .notify(
                    "giveaway_completed_no_entries",
                    &[],
                    json!({"giveaway_id": giveaway_id, "title": giveaway.title}),
                )
                .await;
        } else {
            let winner_ids: Vec<Uuid> = winners.iter().map(|w| w.user_id).collect();
            self.notifier
                .notify(
                    "giveaway_completed",
                    &winner_ids,
                    json!({"giveaway_id": giveaway_id, "title": giveaway.title, "winner_count": winners.len()}),
                )
                .await;
        }

        Ok(winners)
    }
}

/// Dispatches `EventType::Giveaway` promotions from the `Scheduler` to
/// `GiveawayManager::activate`, following the `giveaway_id` the scheduled
/// event's `metadata` carries (spec §4.H "handlers for event types giveaway
/// and automation are provided by GiveawayManager and the command layer").
pub struct GiveawayActivationHandler<G, P, N> {
    manager: Arc<GiveawayManager<G, P, N>>,
}

impl<G, P, N> GiveawayActivationHandler<G, P, N> {
    pub fn new(manager: Arc<GiveawayManager<G, P, N>>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl<G, P, N> EventHandler for GiveawayActivationHandler<G, P, N>
where
    G: GiveawayRepository,
    P: PointsRepository,
    N: Notifier,
{
    async fn handle(&self, event: &ScheduledEvent) -> Result<(), Error> {
        let giveaway_id = event
            .metadata
            .get("giveaway_id")
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| {
                Error::Internal(format!(
                    "scheduled event {} has no giveaway_id in its metadata",
                    event.id
                ))
            })?;
        self.manager.activate(giveaway_id).await
    }
}

/// Periodic sweep matching `Scheduler`'s shape: promote `active` giveaways
/// past their `end_at` into a completion call. Giveaways with no `end_at`
/// are only ever completed by an explicit admin call.
pub async fn sweep_due_giveaways<G, P, N>(manager: &GiveawayManager<G, P, N>, channel_id: Uuid) -> Result<(), Error>
where
    G: GiveawayRepository,
    P: PointsRepository,
    N: Notifier,
{
    let now = Utc::now();
    let active = manager.repo.list_active_giveaways(Some(channel_id)).await?;
    for giveaway in active {
        let Some(end_at) = giveaway.end_at else { continue };
        if end_at > now {
            continue;
        }
        if let Err(e) = manager.complete(giveaway.id).await {
            warn!(giveaway_id = %giveaway.id, error = %e, "giveaway completion sweep failed");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kickbot_common::models::{Entry, PointsBalance};
    use std::sync::Mutex as StdMutex;

    struct FakeGiveawayRepo {
        giveaway: StdMutex<Giveaway>,
        entries: StdMutex<Vec<Entry>>,
        completed: StdMutex<bool>,
    }

    #[async_trait]
    impl GiveawayRepository for FakeGiveawayRepo {
        async fn create_giveaway(&self, _giveaway: &Giveaway) -> Result<(), Error> {
            unimplemented!()
        }
        async fn get_giveaway(&self, id: Uuid) -> Result<Option<Giveaway>, Error> {
            let g = self.giveaway.lock().unwrap();
            if g.id == id { Ok(Some(g.clone())) } else { Ok(None) }
        }
        async fn update_giveaway(&self, giveaway: &Giveaway) -> Result<(), Error> {
            *self.giveaway.lock().unwrap() = giveaway.clone();
            Ok(())
        }
        async fn list_pending_giveaways(&self, _channel_id: Option<Uuid>) -> Result<Vec<Giveaway>, Error> {
            unimplemented!()
        }
        async fn list_active_giveaways(&self, _channel_id: Option<Uuid>) -> Result<Vec<Giveaway>, Error> {
            Ok(vec![self.giveaway.lock().unwrap().clone()])
        }
        async fn claim_entry(&self, giveaway_id: Uuid, user_id: Uuid, username: &str) -> Result<ClaimEntryOutcome, Error> {
            let mut entries = self.entries.lock().unwrap();
            if entries.iter().any(|e| e.user_id == user_id) {
                return Ok(ClaimEntryOutcome::AlreadyEntered);
            }
            let id = Uuid::new_v4();
            entries.push(Entry {
                id,
                giveaway_id,
                user_id,
                username: username.to_string(),
                created_at: Utc::now(),
            });
            Ok(ClaimEntryOutcome::Claimed(id))
        }
        async fn list_entries(&self, _giveaway_id: Uuid) -> Result<Vec<Entry>, Error> {
            Ok(self.entries.lock().unwrap().clone())
        }
        async fn complete_with_winners(&self, giveaway_id: Uuid, winners: &[(Uuid, Uuid)]) -> Result<Vec<Winner>, Error> {
            *self.completed.lock().unwrap() = true;
            let mut giveaway = self.giveaway.lock().unwrap();
            giveaway.status = GiveawayStatus::Completed;
            Ok(winners
                .iter()
                .map(|(user_id, entry_id)| Winner {
                    giveaway_id,
                    user_id: *user_id,
                    entry_id: *entry_id,
                    selected_at: Utc::now(),
                })
                .collect())
        }
        async fn list_winners(&self, _giveaway_id: Uuid) -> Result<Vec<Winner>, Error> {
            unimplemented!()
        }
    }

    struct FakePointsRepo;

    #[async_trait]
    impl PointsRepository for FakePointsRepo {
        async fn get_balance(&self, channel_id: Uuid, user_id: Uuid) -> Result<Option<PointsBalance>, Error> {
            Ok(Some(PointsBalance { channel_id, user_id, points: 0, watch_seconds: 0, last_updated: Utc::now() }))
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

    #[derive(Default)]
    struct RecordingNotifier {
        calls: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, template_id: &str, _recipients: &[Uuid], _data: serde_json::Value) {
            self.calls.lock().unwrap().push(template_id.to_string());
        }
    }

    fn active_giveaway(channel_id: Uuid, max_winners: i32, requirements: serde_json::Value) -> Giveaway {
        Giveaway {
            id: Uuid::new_v4(),
            channel_id,
            title: "Launch giveaway".to_string(),
            prize_id: None,
            status: GiveawayStatus::Active,
            start_at: Utc::now(),
            end_at: None,
            max_winners,
            requirements,
        }
    }

    fn manager(giveaway: Giveaway) -> GiveawayManager<FakeGiveawayRepo, FakePointsRepo, RecordingNotifier> {
        GiveawayManager::new(
            FakeGiveawayRepo {
                giveaway: StdMutex::new(giveaway),
                entries: StdMutex::new(vec![]),
                completed: StdMutex::new(false),
            },
            RequirementValidators::new(FakePointsRepo),
            RecordingNotifier::default(),
        )
    }

    /// S4: follower-gated giveaway, `{u1,u2}` follow and enter, `u3` does
    /// not follow and is rejected at the requirement check.
    #[tokio::test]
    async fn s4_follower_requirement_gates_entry() {
        let channel_id = Uuid::new_v4();
        let giveaway = active_giveaway(channel_id, 2, serde_json::json!([{"kind": "follower"}]));
        let giveaway_id = giveaway.id;
        let mgr = manager(giveaway);

        let u1 = Uuid::new_v4();
        let u2 = Uuid::new_v4();
        let u3 = Uuid::new_v4();
        mgr.record_follow(channel_id, u1).await;
        mgr.record_follow(channel_id, u2).await;

        assert!(mgr.enter(giveaway_id, u1, "u1", &[]).await.unwrap().is_ok());
        assert!(mgr.enter(giveaway_id, u2, "u2", &[]).await.unwrap().is_ok());
        let rejection = mgr.enter(giveaway_id, u3, "u3", &[]).await.unwrap();
        assert!(matches!(rejection, Err(EntryRejection::RequirementUnmet { .. })));

        let winners = mgr.complete(giveaway_id).await.unwrap();
        assert_eq!(winners.len(), 2);
        let winner_ids: std::collections::HashSet<Uuid> = winners.iter().map(|w| w.user_id).collect();
        assert_eq!(winner_ids, [u1, u2].into_iter().collect());
    }

    #[tokio::test]
    async fn duplicate_entry_is_rejected() {
        let channel_id = Uuid::new_v4();
        let giveaway = active_giveaway(channel_id, 1, serde_json::json!([]));
        let giveaway_id = giveaway.id;
        let mgr = manager(giveaway);
        let user_id = Uuid::new_v4();

        assert!(mgr.enter(giveaway_id, user_id, "alice", &[]).await.unwrap().is_ok());
        let second = mgr.enter(giveaway_id, user_id, "alice", &[]).await.unwrap();
        assert_eq!(second, Err(EntryRejection::AlreadyEntered));
    }

    #[tokio::test]
    async fn completing_with_no_entries_yields_zero_winners_and_an_informational_notification() {
        let channel_id = Uuid::new_v4();
        let giveaway = active_giveaway(channel_id, 3, serde_json::json!([]));
        let giveaway_id = giveaway.id;
        let mgr = manager(giveaway);

        let winners = mgr.complete(giveaway_id).await.unwrap();
        assert!(winners.is_empty());
        assert_eq!(mgr.notifier.calls.lock().unwrap().as_slice(), ["giveaway_completed_no_entries"]);
    }

    #[tokio::test]
    async fn entering_a_pending_giveaway_is_rejected() {
        let channel_id = Uuid::new_v4();
        let mut giveaway = active_giveaway(channel_id, 1, serde_json::json!([]));
        giveaway.status = GiveawayStatus::Pending;
        let giveaway_id = giveaway.id;
        let mgr = manager(giveaway);

        let outcome = mgr.enter(giveaway_id, Uuid::new_v4(), "alice", &[]).await.unwrap();
        assert_eq!(outcome, Err(EntryRejection::GiveawayNotActive));
    }
}
