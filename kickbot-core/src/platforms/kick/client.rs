// File: kickbot-core/src/platforms/kick/client.rs

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use kickbot_common::error::Error;
use kickbot_common::traits::repository_traits::ChannelRepository;
use kickbot_common::traits::platform_traits::{ChannelInfo, PlatformClient, UserInfo};

use crate::token_vault::TokenVault;

const KICK_API_BASE: &str = "https://kick.com/api/v2";

/// Outbound Kick API surface (spec §4.C). Stateless beyond the shared
/// connection pool and a handle to resolve internal channel ids to Kick
/// slugs/ids, mirroring the teacher's `twitch_helix` client shape but over
/// raw `reqwest` calls rather than a generated Helix SDK.
pub struct KickClient<R: kickbot_common::traits::repository_traits::TokenRepository> {
    http: reqwest::Client,
    vault: Arc<TokenVault<R>>,
    channels: Arc<dyn ChannelRepository>,
}

impl<R: kickbot_common::traits::repository_traits::TokenRepository> KickClient<R> {
    pub fn new(http: reqwest::Client, vault: Arc<TokenVault<R>>, channels: Arc<dyn ChannelRepository>) -> Self {
        Self { http, vault, channels }
    }

    async fn external_id(&self, channel_id: Uuid) -> Result<String, Error> {
        let channel = self
            .channels
            .get_channel(channel_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("channel {channel_id}")))?;
        Ok(channel.external_id)
    }

    fn map_status(status: reqwest::StatusCode, body: String) -> Error {
        if status.is_client_error() {
            Error::PreconditionFailed(format!("kick API {status}: {body}"))
        } else {
            Error::TransportError(format!("kick API {status}: {body}"))
        }
    }
}

#[derive(Deserialize)]
struct KickChannelPayload {
    slug: String,
    user: KickChannelUser,
    #[serde(default)]
    livestream: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct KickChannelUser {
    username: String,
}

#[async_trait]
impl<R: kickbot_common::traits::repository_traits::TokenRepository + Send + Sync + 'static> PlatformClient
    for KickClient<R>
{
    async fn send_message(&self, channel_id: Uuid, text: &str) -> Result<(), Error> {
        let access_token = self.vault.get_valid(channel_id).await?;
        let external_id = self.external_id(channel_id).await?;

        let response = self
            .http
            .post(format!("{KICK_API_BASE}/channels/{external_id}/messages"))
            .bearer_auth(access_token)
            .json(&json!({ "content": text }))
            .send()
            .await
            .map_err(|e| Error::TransportError(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(Self::map_status(status, body))
        }
    }

    async fn ban(&self, channel_id: Uuid, user_id: Uuid, reason: Option<&str>) -> Result<(), Error> {
        let access_token = self.vault.get_valid(channel_id).await?;
        let external_id = self.external_id(channel_id).await?;

        let response = self
            .http
            .post(format!("{KICK_API_BASE}/channels/{external_id}/bans"))
            .bearer_auth(access_token)
            .json(&json!({ "user_id": user_id, "reason": reason }))
            .send()
            .await
            .map_err(|e| Error::TransportError(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(Self::map_status(status, body))
        }
    }

    async fn timeout(
        &self,
        channel_id: Uuid,
        user_id: Uuid,
        duration_sec: u64,
        reason: Option<&str>,
    ) -> Result<(), Error> {
        let access_token = self.vault.get_valid(channel_id).await?;
        let external_id = self.external_id(channel_id).await?;

        let response = self
            .http
            .post(format!("{KICK_API_BASE}/channels/{external_id}/bans"))
            .bearer_auth(access_token)
            .json(&json!({ "user_id": user_id, "duration": duration_sec, "reason": reason }))
            .send()
            .await
            .map_err(|e| Error::TransportError(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(Self::map_status(status, body))
        }
    }

    async fn get_channel_info(&self, name: &str) -> Result<ChannelInfo, Error> {
        let response = self
            .http
            .get(format!("{KICK_API_BASE}/channels/{name}"))
            .send()
            .await
            .map_err(|e| Error::TransportError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Self::map_status(status, body));
        }

        let payload: KickChannelPayload = response.json().await.map_err(Error::Http)?;
        Ok(ChannelInfo {
            external_id: payload.slug,
            display_name: payload.user.username,
            is_live: payload.livestream.is_some(),
        })
    }

    async fn get_user_info(&self, id_or_name: &str) -> Result<UserInfo, Error> {
        let response = self
            .http
            .get(format!("{KICK_API_BASE}/users/{id_or_name}"))
            .send()
            .await
            .map_err(|e| Error::TransportError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Self::map_status(status, body));
        }

        let payload: KickChannelUser = response.json().await.map_err(Error::Http)?;
        Ok(UserInfo {
            external_id: id_or_name.to_string(),
            username: payload.username,
        })
    }
}
