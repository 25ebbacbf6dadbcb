// File: kickbot-core/src/platforms/youtube/client.rs

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use kickbot_common::error::Error;
use kickbot_common::traits::repository_traits::ChannelRepository;
use kickbot_common::traits::platform_traits::{ChannelInfo, PlatformClient, UserInfo};

use crate::token_vault::TokenVault;

const YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// Outbound YouTube Data/LiveChat API surface (spec §4.C).
pub struct YoutubeClient<R: kickbot_common::traits::repository_traits::TokenRepository> {
    http: reqwest::Client,
    vault: Arc<TokenVault<R>>,
    channels: Arc<dyn ChannelRepository>,
}

impl<R: kickbot_common::traits::repository_traits::TokenRepository> YoutubeClient<R> {
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
            Error::PreconditionFailed(format!("youtube API {status}: {body}"))
        } else {
            Error::TransportError(format!("youtube API {status}: {body}"))
        }
    }
}

#[derive(Deserialize)]
struct YoutubeChannelListResponse {
    items: Vec<YoutubeChannelItem>,
}

#[derive(Deserialize)]
struct YoutubeChannelItem {
    id: String,
    snippet: YoutubeChannelSnippet,
    #[serde(default)]
    live_broadcast_content: Option<String>,
}

#[derive(Deserialize)]
struct YoutubeChannelSnippet {
    title: String,
}

#[async_trait]
impl<R: kickbot_common::traits::repository_traits::TokenRepository + Send + Sync + 'static> PlatformClient
    for YoutubeClient<R>
{
    async fn send_message(&self, channel_id: Uuid, text: &str) -> Result<(), Error> {
        let access_token = self.vault.get_valid(channel_id).await?;
        let live_chat_id = self.external_id(channel_id).await?;

        let response = self
            .http
            .post(format!("{YOUTUBE_API_BASE}/liveChat/messages?part=snippet"))
            .bearer_auth(access_token)
            .json(&json!({
                "snippet": {
                    "liveChatId": live_chat_id,
                    "type": "textMessageEvent",
                    "textMessageDetails": { "messageText": text },
                }
            }))
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

    async fn ban(&self, channel_id: Uuid, user_id: Uuid, _reason: Option<&str>) -> Result<(), Error> {
        let access_token = self.vault.get_valid(channel_id).await?;
        let live_chat_id = self.external_id(channel_id).await?;

        let response = self
            .http
            .post(format!("{YOUTUBE_API_BASE}/liveChat/bans"))
            .bearer_auth(access_token)
            .json(&json!({
                "snippet": {
                    "liveChatId": live_chat_id,
                    "type": "permanent",
                    "bannedUserDetails": { "channelId": user_id },
                }
            }))
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
        _reason: Option<&str>,
    ) -> Result<(), Error> {
        let access_token = self.vault.get_valid(channel_id).await?;
        let live_chat_id = self.external_id(channel_id).await?;

        let response = self
            .http
            .post(format!("{YOUTUBE_API_BASE}/liveChat/bans"))
            .bearer_auth(access_token)
            .json(&json!({
                "snippet": {
                    "liveChatId": live_chat_id,
                    "type": "temporary",
                    "banDurationSeconds": duration_sec,
                    "bannedUserDetails": { "channelId": user_id },
                }
            }))
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
            .get(format!("{YOUTUBE_API_BASE}/channels?part=snippet,liveBroadcastContent&forHandle={name}"))
            .send()
            .await
            .map_err(|e| Error::TransportError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Self::map_status(status, body));
        }

        let payload: YoutubeChannelListResponse = response.json().await.map_err(Error::Http)?;
        let item = payload
            .items
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(format!("youtube channel '{name}'")))?;

        Ok(ChannelInfo {
            external_id: item.id,
            display_name: item.snippet.title,
            is_live: item.live_broadcast_content.as_deref() == Some("live"),
        })
    }

    async fn get_user_info(&self, id_or_name: &str) -> Result<UserInfo, Error> {
        let response = self
            .http
            .get(format!("{YOUTUBE_API_BASE}/channels?part=snippet&id={id_or_name}"))
            .send()
            .await
            .map_err(|e| Error::TransportError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Self::map_status(status, body));
        }

        let payload: YoutubeChannelListResponse = response.json().await.map_err(Error::Http)?;
        let item = payload
            .items
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(format!("youtube user '{id_or_name}'")))?;

        Ok(UserInfo {
            external_id: item.id,
            username: item.snippet.title,
        })
    }
}
