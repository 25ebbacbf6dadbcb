use serde::{Deserialize, Serialize};

/// Role order is significant: `everyone < subscriber < vip < moderator < owner`
/// (spec §4.E). `Ord` follows declaration order via `derive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "snake_case")]
pub enum UserLevel {
    Everyone,
    Subscriber,
    Vip,
    Moderator,
    Owner,
}

impl UserLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserLevel::Everyone => "everyone",
            UserLevel::Subscriber => "subscriber",
            UserLevel::Vip => "vip",
            UserLevel::Moderator => "moderator",
            UserLevel::Owner => "owner",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "everyone" => Some(UserLevel::Everyone),
            "subscriber" => Some(UserLevel::Subscriber),
            "vip" => Some(UserLevel::Vip),
            "moderator" => Some(UserLevel::Moderator),
            "owner" => Some(UserLevel::Owner),
            _ => None,
        }
    }
}

/// A viewer's held roles in one message/event, as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Subscriber,
    Vip,
    Moderator,
    Owner,
}

impl Role {
    /// Highest `UserLevel` satisfied by a set of held roles.
    pub fn highest_level(roles: &[Role]) -> UserLevel {
        roles
            .iter()
            .map(|r| match r {
                Role::Subscriber => UserLevel::Subscriber,
                Role::Vip => UserLevel::Vip,
                Role::Moderator => UserLevel::Moderator,
                Role::Owner => UserLevel::Owner,
            })
            .max()
            .unwrap_or(UserLevel::Everyone)
    }

    /// Whether a set of held roles satisfies a required minimum level.
    pub fn satisfies(roles: &[Role], required: UserLevel) -> bool {
        Role::highest_level(roles) >= required
    }
}
