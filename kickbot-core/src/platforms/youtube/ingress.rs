// File: kickbot-core/src/platforms/youtube/ingress.rs

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use serde::Deserialize;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};
use uuid::Uuid;

use kickbot_common::error::Error;
use kickbot_common::models::{ChatEvent, Role};
use kickbot_common::traits::ChatIngress;

use crate::cache::{DedupCache, DEFAULT_DEDUP_CAPACITY};
use crate::token_vault::TokenVault;

const YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// Polling `ChatIngress` for YouTube Live Chat (spec §4.D). Dedup is handled
/// with the shared bounded `DedupCache` since `liveChatMessages.list` can
/// return overlapping pages across polls.
pub struct YoutubeChatIngress {
    channel_id: Uuid,
    incoming: mpsc::UnboundedReceiver<ChatEvent>,
    stop_signal: Arc<Notify>,
    poll_task: JoinHandle<()>,
}

#[derive(Deserialize)]
struct LiveChatListResponse {
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
    #[serde(rename = "pollingIntervalMillis")]
    polling_interval_millis: Option<u64>,
    items: Vec<LiveChatMessageItem>,
}

#[derive(Deserialize)]
struct LiveChatMessageItem {
    id: String,
    snippet: LiveChatMessageSnippet,
    #[serde(rename = "authorDetails")]
    author_details: LiveChatAuthor,
}

#[derive(Deserialize)]
struct LiveChatMessageSnippet {
    #[serde(rename = "displayMessage")]
    display_message: Option<String>,
}

#[derive(Deserialize)]
struct LiveChatAuthor {
    #[serde(rename = "channelId")]
    channel_id: String,
    #[serde(rename = "displayName")]
    display_name: String,
    #[serde(rename = "isChatModerator", default)]
    is_moderator: bool,
    #[serde(rename = "isChatSponsor", default)]
    is_sponsor: bool,
    #[serde(rename = "isChatOwner", default)]
    is_owner: bool,
}

impl YoutubeChatIngress {
    /// `live_chat_id` is the YouTube live broadcast's chat id, resolved by
    /// the caller (e.g. via `PlatformClient::get_channel_info`) before
    /// starting ingress.
    pub fn start<R>(
        channel_id: Uuid,
        http: reqwest::Client,
        vault: Arc<TokenVault<R>>,
        live_chat_id: String,
        poll_interval_floor: StdDuration,
    ) -> Self
    where
        R: kickbot_common::traits::repository_traits::TokenRepository + Send + Sync + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel::<ChatEvent>();
        let stop_signal = Arc::new(Notify::new());
        let stop_signal_task = stop_signal.clone();

        let poll_task = tokio::spawn(async move {
            let mut dedup = DedupCache::new(DEFAULT_DEDUP_CAPACITY);
            let mut page_token: Option<String> = None;

            loop {
                let access_token = match vault.get_valid(channel_id).await {
                    Ok(t) => t,
                    Err(e) => {
                        error!(channel_id = %channel_id, error = %e, "youtube ingress: token unavailable");
                        tokio::select! {
                            _ = tokio::time::sleep(poll_interval_floor) => continue,
                            _ = stop_signal_task.notified() => break,
                        }
                    }
                };

                let mut req = http
                    .get(format!("{YOUTUBE_API_BASE}/liveChat/messages"))
                    .bearer_auth(access_token)
                    .query(&[("liveChatId", live_chat_id.as_str()), ("part", "snippet,authorDetails")]);
                if let Some(ref token) = page_token {
                    req = req.query(&[("pageToken", token.as_str())]);
                }

                let wait = match req.send().await {
                    Ok(response) if response.status().is_success() => {
                        match response.json::<LiveChatListResponse>().await {
                            Ok(parsed) => {
                                page_token = parsed.next_page_token;
                                for item in parsed.items {
                                    if dedup.seen(&item.id) {
                                        continue;
                                    }
                                    let Some(text) = item.snippet.display_message else {
                                        continue;
                                    };
                                    let mut roles = Vec::new();
                                    if item.author_details.is_owner {
                                        roles.push(Role::Owner);
                                    }
                                    if item.author_details.is_moderator {
                                        roles.push(Role::Moderator);
                                    }
                                    if item.author_details.is_sponsor {
                                        roles.push(Role::Subscriber);
                                    }
                                    let event = ChatEvent::Message {
                                        channel_id,
                                        user_id: Uuid::new_v5(
                                            &Uuid::NAMESPACE_OID,
                                            item.author_details.channel_id.as_bytes(),
                                        ),
                                        username: item.author_details.display_name,
                                        text,
                                        roles,
                                        received_at: Utc::now(),
                                        external_id: item.id,
                                    };
                                    if tx.send(event).is_err() {
                                        return;
                                    }
                                }
                                parsed
                                    .polling_interval_millis
                                    .map(StdDuration::from_millis)
                                    .unwrap_or(poll_interval_floor)
                                    .max(poll_interval_floor)
                            }
                            Err(e) => {
                                warn!("youtube ingress: malformed response: {e}");
                                poll_interval_floor
                            }
                        }
                    }
                    Ok(response) => {
                        let status = response.status();
                        debug!(%status, "youtube ingress: non-2xx poll response");
                        poll_interval_floor
                    }
                    Err(e) => {
                        warn!("youtube ingress: poll request failed: {e}");
                        poll_interval_floor
                    }
                };

                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = stop_signal_task.notified() => break,
                }
            }
        });

        Self {
            channel_id,
            incoming: rx,
            stop_signal,
            poll_task,
        }
    }

    pub fn channel_id(&self) -> Uuid {
        self.channel_id
    }
}

#[async_trait::async_trait]
impl ChatIngress for YoutubeChatIngress {
    async fn next_event(&mut self) -> Option<ChatEvent> {
        self.incoming.recv().await
    }

    async fn stop(&mut self) {
        self.stop_signal.notify_waiters();
        self.poll_task.abort();
    }
}
