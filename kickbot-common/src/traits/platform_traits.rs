use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::error::Error;
use crate::models::ChatEvent;

#[derive(Debug, Clone)]
pub struct ChannelInfo {
    pub external_id: String,
    pub display_name: String,
    pub is_live: bool,
}

#[derive(Debug, Clone)]
pub struct UserInfo {
    pub external_id: String,
    pub username: String,
}

/// Outbound API to a streaming platform (spec §4.C). No internal retries —
/// callers decide on `TransportError`.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    async fn send_message(&self, channel_id: Uuid, text: &str) -> Result<(), Error>;
    async fn ban(&self, channel_id: Uuid, user_id: Uuid, reason: Option<&str>) -> Result<(), Error>;
    async fn timeout(
        &self,
        channel_id: Uuid,
        user_id: Uuid,
        duration_sec: u64,
        reason: Option<&str>,
    ) -> Result<(), Error>;
    async fn get_channel_info(&self, name: &str) -> Result<ChannelInfo, Error>;
    async fn get_user_info(&self, id_or_name: &str) -> Result<UserInfo, Error>;
}

/// A lazy, stoppable sequence of normalized chat/lifecycle events for one
/// channel (spec §4.D). Implementations are either a push connection or a
/// polling adapter.
#[async_trait]
pub trait ChatIngress: Send + Sync {
    /// Blocks until the next event is available, or returns `None` once
    /// `stop()` has been called and no further events will arrive.
    async fn next_event(&mut self) -> Option<ChatEvent>;

    /// Signals the ingress to stop producing events and release any
    /// underlying connection.
    async fn stop(&mut self);
}

/// Fire-and-forget notification sink standing in for the admin layer's
/// running event-notification service (spec §6 "Notifier").
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, template_id: &str, recipients: &[Uuid], data: Value);
}
