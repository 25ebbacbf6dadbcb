use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A viewer's channel-local points balance. Uniqueness: `(channel_id,
/// user_id)`. `points` is never observed negative (spec §3, §4.A).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PointsBalance {
    pub channel_id: Uuid,
    pub user_id: Uuid,
    pub points: i64,
    pub watch_seconds: i64,
    pub last_updated: DateTime<Utc>,
}

/// Role point-accrual multipliers, configurable per channel (spec §4.F).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RoleMultipliers {
    pub subscriber: f64,
    pub vip: f64,
    pub moderator: f64,
}

impl Default for RoleMultipliers {
    fn default() -> Self {
        Self {
            subscriber: 1.5,
            vip: 2.0,
            moderator: 1.2,
        }
    }
}

impl RoleMultipliers {
    /// Highest multiplier among held roles; `1.0` if none apply.
    pub fn for_roles(&self, roles: &[crate::models::role::Role]) -> f64 {
        use crate::models::role::Role;
        let mut best = 1.0_f64;
        for r in roles {
            let m = match r {
                Role::Subscriber => self.subscriber,
                Role::Vip => self.vip,
                Role::Moderator => self.moderator,
                Role::Owner => best,
            };
            if m > best {
                best = m;
            }
        }
        best
    }
}
