//! Cooldown bookkeeping for `CommandDispatcher` (spec §4.E): a global map
//! keyed by `(channel_id, command_name)` and a per-user map keyed by
//! `(channel_id, command_name, user_id)`, each storing the most recent
//! dispatch timestamp. Both maps are capped per channel; eviction removes the
//! least-recently-updated entry.

use std::collections::{BTreeMap, HashMap};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Cap on the number of tracked keys per channel, per map. Generous enough
/// that normal command catalogues never evict a live cooldown.
const MAX_ENTRIES_PER_CHANNEL: usize = 10_000;

#[derive(Default)]
struct Bucket<K: Ord + Clone> {
    last_use: HashMap<K, DateTime<Utc>>,
    /// Secondary index for least-recent eviction: timestamp -> key. A
    /// channel with many distinct keys updated at the same instant is fine;
    /// `BTreeMap` keys on `(DateTime<Utc>, K)` to stay unique.
    by_time: BTreeMap<(DateTime<Utc>, K), ()>,
}

impl<K: Ord + Clone + std::hash::Hash> Bucket<K> {
    fn get(&self, key: &K) -> Option<DateTime<Utc>> {
        self.last_use.get(key).copied()
    }

    /// Records `now` for `key`. Returns `true` if this call "won" the
    /// update (no entry existed, or `now` is not older than the existing
    /// one) — ties are awarded to whichever call reaches here first, which
    /// under a single lock is simply every call that observes no strictly
    /// newer existing timestamp.
    fn record(&mut self, key: K, now: DateTime<Utc>) {
        if let Some(old) = self.last_use.get(&key).copied() {
            self.by_time.remove(&(old, key.clone()));
        }
        self.last_use.insert(key.clone(), now);
        self.by_time.insert((now, key), ());

        while self.last_use.len() > MAX_ENTRIES_PER_CHANNEL {
            if let Some((&(ts, ref k), _)) = self.by_time.iter().next() {
                let ts = ts;
                let k = k.clone();
                self.by_time.remove(&(ts, k.clone()));
                self.last_use.remove(&k);
            } else {
                break;
            }
        }
    }
}

#[derive(Default)]
struct ChannelCooldowns {
    global: Bucket<String>,
    per_user: Bucket<(String, Uuid)>,
}

/// Owned exclusively by `CommandDispatcher`. Never mutated from outside via
/// shared memory (spec §5 shared-resource policy).
#[derive(Default)]
pub struct CooldownCache {
    channels: HashMap<Uuid, ChannelCooldowns>,
}

impl CooldownCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Combined gate-and-update for one dispatch attempt, matching spec
    /// §4.E steps 5 and 7. Returns `Ok(())` if both the global default
    /// cooldown and the command's per-user cooldown are satisfied, having
    /// already recorded `now` against both maps. Returns the number of
    /// seconds still remaining (the larger of the two) on rejection, with
    /// no mutation performed.
    pub fn check_and_update(
        &mut self,
        channel_id: Uuid,
        command_name: &str,
        user_id: Uuid,
        now: DateTime<Utc>,
        global_cooldown_seconds: i64,
        per_user_cooldown_seconds: i64,
    ) -> Result<(), i64> {
        let bucket = self.channels.entry(channel_id).or_default();

        let global_remaining = bucket
            .global
            .get(&command_name.to_string())
            .map(|last| global_cooldown_seconds - (now - last).num_seconds())
            .filter(|r| *r > 0);

        let user_key = (command_name.to_string(), user_id);
        let user_remaining = bucket
            .per_user
            .get(&user_key)
            .map(|last| per_user_cooldown_seconds - (now - last).num_seconds())
            .filter(|r| *r > 0);

        if let Some(remaining) = global_remaining.into_iter().chain(user_remaining).max() {
            return Err(remaining);
        }

        bucket.global.record(command_name.to_string(), now);
        bucket.per_user.record(user_key, now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn s1_command_dispatch_and_cooldown() {
        // Channel c1, command "hi" with per-user cooldown 10s, global
        // default cooldown taken as 1s (doesn't bind here since spacing
        // exceeds it). alice dispatches at t=0, t=5 (rejected), t=11 (ok).
        let mut cache = CooldownCache::new();
        let channel = Uuid::new_v4();
        let alice = Uuid::new_v4();
        let t0 = Utc::now();

        assert!(cache
            .check_and_update(channel, "hi", alice, t0, 1, 10)
            .is_ok());
        assert!(cache
            .check_and_update(channel, "hi", alice, t0 + Duration::seconds(5), 1, 10)
            .is_err());
        assert!(cache
            .check_and_update(channel, "hi", alice, t0 + Duration::seconds(11), 1, 10)
            .is_ok());
    }

    #[test]
    fn different_users_share_the_global_cooldown_but_not_the_per_user_one() {
        let mut cache = CooldownCache::new();
        let channel = Uuid::new_v4();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let t0 = Utc::now();

        assert!(cache.check_and_update(channel, "hi", alice, t0, 5, 0).is_ok());
        // bob is blocked by the still-active global cooldown
        assert!(cache
            .check_and_update(channel, "hi", bob, t0 + Duration::seconds(1), 5, 0)
            .is_err());
        // once the global cooldown clears, bob's own zero-second per-user
        // cooldown lets him through
        assert!(cache
            .check_and_update(channel, "hi", bob, t0 + Duration::seconds(6), 5, 0)
            .is_ok());
    }

    #[test]
    fn zero_cooldown_is_still_throttled_by_the_global_default() {
        let mut cache = CooldownCache::new();
        let channel = Uuid::new_v4();
        let alice = Uuid::new_v4();
        let t0 = Utc::now();

        assert!(cache.check_and_update(channel, "hi", alice, t0, 1, 0).is_ok());
        assert!(cache
            .check_and_update(channel, "hi", alice, t0 + Duration::milliseconds(500), 1, 0)
            .is_err());
    }
}
