// File: kickbot-core/src/platforms/kick/ingress.rs

use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use uuid::Uuid;

use kickbot_common::error::Error;
use kickbot_common::models::{ChatEvent, Role};
use kickbot_common::traits::ChatIngress;

const KICK_PUSHER_URL: &str =
    "wss://ws-us2.pusher.com/app/32cbd69e4b950bf97679?protocol=7&client=kickbot&version=1.0&flash=false";

/// Initial reconnect delay; doubled after every failed or dropped connection
/// (spec §4.D "reconnects with exponential backoff capped at 60 s").
const INITIAL_BACKOFF: StdDuration = StdDuration::from_secs(1);
const MAX_BACKOFF: StdDuration = StdDuration::from_secs(60);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Push-based `ChatIngress` over Kick's Pusher-protocol chat websocket (spec
/// §4.D). A background driver task owns the socket end to end: it
/// reconnects with exponential backoff on any drop and re-subscribes, while
/// this handle's `incoming` channel stays open across reconnects so callers
/// never see a gap.
pub struct KickChatIngress {
    channel_id: Uuid,
    incoming: mpsc::UnboundedReceiver<ChatEvent>,
    driver_task: JoinHandle<()>,
}

#[derive(Deserialize)]
struct PusherEnvelope {
    event: String,
    data: String,
    #[serde(default)]
    channel: Option<String>,
}

#[derive(Deserialize)]
struct ChatMessageEventPayload {
    id: String,
    content: String,
    sender: ChatMessageSender,
}

#[derive(Deserialize)]
struct ChatMessageSender {
    id: u64,
    username: String,
    #[serde(default)]
    identity: Option<SenderIdentity>,
}

#[derive(Deserialize)]
struct SenderIdentity {
    #[serde(default)]
    badges: Vec<SenderBadge>,
}

#[derive(Deserialize)]
struct SenderBadge {
    #[serde(rename = "type")]
    badge_type: String,
}

fn roles_from_badges(identity: &Option<SenderIdentity>) -> Vec<Role> {
    let Some(identity) = identity else {
        return Vec::new();
    };
    identity
        .badges
        .iter()
        .filter_map(|b| match b.badge_type.as_str() {
            "subscriber" => Some(Role::Subscriber),
            "vip" => Some(Role::Vip),
            "moderator" => Some(Role::Moderator),
            "broadcaster" => Some(Role::Owner),
            _ => None,
        })
        .collect()
}

impl KickChatIngress {
    /// Connects to Kick's chatroom websocket for `chatroom_id` (Kick's
    /// per-channel chat identifier, distinct from our internal `channel_id`)
    /// and begins normalizing events. The initial dial happens synchronously
    /// so a rejected handshake is reported to the caller immediately;
    /// subsequent drops are handled by the driver task's own reconnect loop.
    pub async fn connect(channel_id: Uuid, chatroom_id: &str) -> Result<Self, Error> {
        let chatroom_id = chatroom_id.to_string();
        let stream = dial().await?;

        let (tx_incoming, rx_incoming) = mpsc::unbounded_channel::<ChatEvent>();
        let driver_task = tokio::spawn(drive(channel_id, chatroom_id, stream, tx_incoming));

        Ok(Self {
            channel_id,
            incoming: rx_incoming,
            driver_task,
        })
    }

    pub fn channel_id(&self) -> Uuid {
        self.channel_id
    }
}

async fn dial() -> Result<WsStream, Error> {
    let (ws_stream, _) = tokio_tungstenite::connect_async(KICK_PUSHER_URL)
        .await
        .map_err(|e| Error::TransportError(format!("kick pusher connect failed: {e}")))?;
    Ok(ws_stream)
}

/// Owns the websocket end to end across reconnects: subscribes, reads
/// frames onto `tx_incoming`, and on any read error or stream end re-dials
/// with exponential backoff rather than exiting. `last_delivered_at` is
/// carried across reconnects so a redelivered frame from before the drop is
/// never forwarded twice.
async fn drive(channel_id: Uuid, chatroom_id: String, mut stream: WsStream, tx_incoming: mpsc::UnboundedSender<ChatEvent>) {
    let mut backoff = INITIAL_BACKOFF;
    let mut last_delivered_at: Option<DateTime<Utc>> = None;

    loop {
        let subscribe = json!({
            "event": "pusher:subscribe",
            "data": { "channel": format!("chatrooms.{chatroom_id}.v2") }
        })
        .to_string();

        if let Err(e) = stream.send(WsMessage::Text(subscribe.into())).await {
            warn!(%channel_id, error = %e, "kick pusher subscribe failed, reconnecting");
            stream = match reconnect(&mut backoff).await {
                Some(s) => s,
                None => return,
            };
            continue;
        }
        backoff = INITIAL_BACKOFF;

        loop {
            let msg = match stream.next().await {
                Some(Ok(m)) => m,
                Some(Err(e)) => {
                    warn!(%channel_id, error = %e, "kick pusher read error, reconnecting");
                    break;
                }
                None => {
                    warn!(%channel_id, "kick pusher stream ended, reconnecting");
                    break;
                }
            };

            let WsMessage::Text(text) = msg else { continue };

            let envelope: PusherEnvelope = match serde_json::from_str(&text) {
                Ok(e) => e,
                Err(e) => {
                    warn!("kick pusher: unparseable frame: {e}");
                    continue;
                }
            };

            if envelope.event != "App\\Events\\ChatMessageEvent" {
                debug!("kick pusher: ignoring event {}", envelope.event);
                continue;
            }

            let payload: ChatMessageEventPayload = match serde_json::from_str(&envelope.data) {
                Ok(p) => p,
                Err(e) => {
                    warn!("kick pusher: unparseable chat payload: {e}");
                    continue;
                }
            };

            let received_at = Utc::now();
            if let Some(last) = last_delivered_at {
                if received_at <= last {
                    continue;
                }
            }

            let event = ChatEvent::Message {
                channel_id,
                user_id: Uuid::new_v5(&Uuid::NAMESPACE_OID, payload.sender.id.to_string().as_bytes()),
                username: payload.sender.username,
                text: payload.content,
                roles: roles_from_badges(&payload.sender.identity),
                received_at,
                external_id: payload.id,
            };

            if tx_incoming.send(event).is_err() {
                info!(%channel_id, "kick pusher consumer dropped, ending driver");
                return;
            }
            last_delivered_at = Some(received_at);
        }

        stream = match reconnect(&mut backoff).await {
            Some(s) => s,
            None => return,
        };
    }
}

/// Sleeps for the current backoff, doubles it (capped at `MAX_BACKOFF`), and
/// dials again. Retries indefinitely on dial failure; only returns `None` if
/// a retry is not worth attempting (never happens today, kept so a future
/// cancellation signal has somewhere to plug in).
async fn reconnect(backoff: &mut StdDuration) -> Option<WsStream> {
    loop {
        tokio::time::sleep(*backoff).await;
        *backoff = (*backoff * 2).min(MAX_BACKOFF);

        match dial().await {
            Ok(stream) => return Some(stream),
            Err(e) => warn!(error = %e, "kick pusher reconnect attempt failed, retrying"),
        }
    }
}

#[async_trait::async_trait]
impl ChatIngress for KickChatIngress {
    async fn next_event(&mut self) -> Option<ChatEvent> {
        self.incoming.recv().await
    }

    async fn stop(&mut self) {
        self.driver_task.abort();
    }
}
