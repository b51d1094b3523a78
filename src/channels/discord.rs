//! Discord bot channel.
//!
//! Inbound events arrive over the gateway websocket (API v10); replies,
//! reactions and edits go through the REST API.
//!
//! ## Gateway session
//!
//! 1. **Hello** (op 10) carries the heartbeat interval
//! 2. **Identify** (op 2) with the bot token and intents
//! 3. **Dispatch** (op 0) events: `READY`, `MESSAGE_CREATE`, `INTERACTION_CREATE`
//! 4. Heartbeats (op 1) on the interval, each answered by an ACK (op 11).
//!    A missing ACK, op 7/9 or a dropped socket end the session and
//!    [`listen`](Channel::listen) reconnects after a fixed delay

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use super::traits::{
    ButtonStyle, Channel, ChannelEvent, ChannelInteraction, ChannelMessage, EditMessage,
    InteractiveView, MessageRef, SendMessage,
};

// ── Constants ──────────────────────────────────────────────────────

const API_BASE: &str = "https://discord.com/api/v10";
const GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";

const INTENT_GUILD_MESSAGES: u64 = 1 << 9;
const INTENT_DIRECT_MESSAGES: u64 = 1 << 12;
const INTENT_MESSAGE_CONTENT: u64 = 1 << 15;
pub const INTENTS: u64 = INTENT_GUILD_MESSAGES | INTENT_DIRECT_MESSAGES | INTENT_MESSAGE_CONTENT;

/// Discord limits, in characters.
const MAX_CONTENT_CHARS: usize = 2000;
const MAX_EMBED_TITLE_CHARS: usize = 256;
const MAX_EMBED_DESCRIPTION_CHARS: usize = 4096;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);
/// Per-request deadline for REST calls.
const REST_TIMEOUT: Duration = Duration::from_secs(10);

const OP_DISPATCH: u64 = 0;
const OP_HEARTBEAT: u64 = 1;
const OP_IDENTIFY: u64 = 2;
const OP_RECONNECT: u64 = 7;
const OP_INVALID_SESSION: u64 = 9;
const OP_HELLO: u64 = 10;
const OP_HEARTBEAT_ACK: u64 = 11;

const INTERACTION_COMPONENT: u64 = 3;
/// Acknowledge a component click without sending anything visible.
const CALLBACK_DEFERRED_UPDATE: u64 = 6;

// ── Channel ────────────────────────────────────────────────────────

pub struct DiscordChannel {
    bot_token: String,
    api_base: String,
    gateway_url: String,
    client: reqwest::Client,
    /// Filled from `READY`; used to drop our own messages.
    bot_user_id: Mutex<Option<String>>,
}

impl DiscordChannel {
    pub fn new(bot_token: String) -> Self {
        Self::with_endpoints(bot_token, API_BASE.into(), GATEWAY_URL.into())
    }

    pub fn with_endpoints(bot_token: String, api_base: String, gateway_url: String) -> Self {
        Self {
            bot_token,
            api_base: api_base.trim_end_matches('/').to_string(),
            gateway_url,
            client: reqwest::Client::builder()
                .timeout(REST_TIMEOUT)
                .connect_timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            bot_user_id: Mutex::new(None),
        }
    }

    fn auth_header(&self) -> String {
        format!("Bot {}", self.bot_token)
    }

    async fn check(resp: reqwest::Response, what: &str) -> anyhow::Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        tracing::error!("Discord {what} failed: {status}: {body}");
        anyhow::bail!("Discord API error ({what}): {status}")
    }

    /// Acknowledge a click without blocking the gateway loop.
    fn spawn_acknowledge(&self, interaction_id: String, token: String) {
        let client = self.client.clone();
        let url = format!(
            "{}/interactions/{interaction_id}/{token}/callback",
            self.api_base
        );
        tokio::spawn(async move {
            if let Err(e) = acknowledge_interaction(&client, &url).await {
                tracing::warn!(interaction_id = %interaction_id, "Discord: failed to acknowledge interaction: {e}");
            }
        });
    }

    /// One gateway connection, from Hello until the socket drops or
    /// Discord asks us to reconnect.
    async fn run_session(&self, tx: &mpsc::Sender<ChannelEvent>) -> anyhow::Result<()> {
        let (ws_stream, _response) = tokio_tungstenite::connect_async(self.gateway_url.as_str())
            .await
            .map_err(|e| anyhow::anyhow!("Failed to connect to Discord gateway: {e}"))?;
        let (mut write, mut read) = ws_stream.split();

        let hello = match read.next().await {
            Some(Ok(WsMessage::Text(text))) => serde_json::from_str::<Value>(&text)?,
            Some(Ok(other)) => anyhow::bail!("Unexpected first gateway frame: {other:?}"),
            Some(Err(e)) => anyhow::bail!("Gateway error before Hello: {e}"),
            None => anyhow::bail!("Gateway closed before Hello"),
        };
        let interval_ms = heartbeat_interval(&hello)
            .ok_or_else(|| anyhow::anyhow!("Gateway Hello without heartbeat_interval"))?;
        tracing::debug!(interval_ms, "Discord gateway hello");

        write
            .send(WsMessage::Text(identify_payload(&self.bot_token).to_string().into()))
            .await?;

        let period = Duration::from_millis(interval_ms);
        let mut heartbeat = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        let mut seq: Option<u64> = None;
        let mut acks = HeartbeatAcks::default();

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    if !acks.on_tick() {
                        tracing::warn!("Discord: heartbeat not acknowledged, reconnecting");
                        return Ok(());
                    }
                    write
                        .send(WsMessage::Text(heartbeat_payload(seq).to_string().into()))
                        .await?;
                }
                frame = read.next() => {
                    let text = match frame {
                        Some(Ok(WsMessage::Text(text))) => text,
                        Some(Ok(WsMessage::Close(frame))) => {
                            tracing::info!(close_frame = ?frame, "Discord gateway closed");
                            return Ok(());
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => anyhow::bail!("Discord gateway error: {e}"),
                        None => return Ok(()),
                    };
                    let payload: Value = match serde_json::from_str(&text) {
                        Ok(v) => v,
                        Err(e) => {
                            tracing::warn!("Discord: unparseable gateway frame: {e}");
                            continue;
                        }
                    };
                    if let Some(s) = payload.get("s").and_then(Value::as_u64) {
                        seq = Some(s);
                    }

                    match payload.get("op").and_then(Value::as_u64) {
                        Some(OP_DISPATCH) => {
                            if tx.is_closed() {
                                return Ok(());
                            }
                            self.on_dispatch(&payload, tx).await;
                        }
                        Some(OP_HEARTBEAT) => {
                            write
                                .send(WsMessage::Text(heartbeat_payload(seq).to_string().into()))
                                .await?;
                        }
                        Some(OP_RECONNECT) => {
                            tracing::info!("Discord asked for a reconnect");
                            return Ok(());
                        }
                        Some(OP_INVALID_SESSION) => {
                            tracing::warn!("Discord invalidated the gateway session");
                            return Ok(());
                        }
                        Some(OP_HEARTBEAT_ACK) => acks.on_ack(),
                        other => tracing::debug!(op = ?other, "Discord: ignoring gateway op"),
                    }
                }
            }
        }
    }

    async fn on_dispatch(&self, payload: &Value, tx: &mpsc::Sender<ChannelEvent>) {
        let event_type = payload.get("t").and_then(Value::as_str).unwrap_or("");
        let Some(data) = payload.get("d") else {
            return;
        };

        match event_type {
            "READY" => {
                let bot_id = data
                    .get("user")
                    .and_then(|u| u.get("id"))
                    .and_then(Value::as_str)
                    .map(str::to_string);
                tracing::info!(bot_id = ?bot_id, "Discord: logged in");
                *self.bot_user_id.lock() = bot_id;
            }
            "MESSAGE_CREATE" => {
                let bot_id = self.bot_user_id.lock().clone();
                if let Some(msg) = parse_message_create(data, bot_id.as_deref()) {
                    let _ = tx.send(ChannelEvent::Message(msg)).await;
                }
            }
            "INTERACTION_CREATE" => {
                let Some((interaction, token)) = parse_interaction_create(data) else {
                    return;
                };
                self.spawn_acknowledge(interaction.id.clone(), token);
                let _ = tx.send(ChannelEvent::Interaction(interaction)).await;
            }
            _ => {}
        }
    }
}

#[async_trait]
impl Channel for DiscordChannel {
    fn name(&self) -> &str {
        "discord"
    }

    async fn listen(&self, tx: mpsc::Sender<ChannelEvent>) -> anyhow::Result<()> {
        loop {
            match self.run_session(&tx).await {
                Ok(()) => tracing::info!("Discord gateway session ended"),
                Err(e) => tracing::warn!("Discord gateway session failed: {e}"),
            }
            if tx.is_closed() {
                return Ok(());
            }
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    }

    async fn send(&self, message: &SendMessage) -> anyhow::Result<Option<String>> {
        let url = format!("{}/channels/{}/messages", self.api_base, message.recipient);
        let resp = self
            .client
            .post(url)
            .header("Authorization", self.auth_header())
            .json(&view_payload(&message.view))
            .send()
            .await?;
        let resp = Self::check(resp, "send").await?;

        let body: Value = resp.json().await.unwrap_or(Value::Null);
        Ok(body.get("id").and_then(Value::as_str).map(str::to_string))
    }

    async fn react(&self, target: &MessageRef, emoji: &str) -> anyhow::Result<()> {
        let url = format!(
            "{}/channels/{}/messages/{}/reactions/{}/@me",
            self.api_base,
            target.channel_id,
            target.message_id,
            urlencoding::encode(emoji)
        );
        let resp = self
            .client
            .put(url)
            .header("Authorization", self.auth_header())
            .body(Vec::new())
            .send()
            .await?;
        Self::check(resp, "react").await?;
        Ok(())
    }

    async fn edit(&self, message: &EditMessage) -> anyhow::Result<()> {
        let url = format!(
            "{}/channels/{}/messages/{}",
            self.api_base, message.target.channel_id, message.target.message_id
        );
        let resp = self
            .client
            .patch(url)
            .header("Authorization", self.auth_header())
            .json(&view_payload(&message.view))
            .send()
            .await?;
        Self::check(resp, "edit").await?;
        Ok(())
    }
}

async fn acknowledge_interaction(client: &reqwest::Client, url: &str) -> anyhow::Result<()> {
    let resp = client
        .post(url)
        .json(&json!({ "type": CALLBACK_DEFERRED_UPDATE }))
        .send()
        .await?;
    DiscordChannel::check(resp, "interaction callback").await?;
    Ok(())
}

// ── Heartbeats ─────────────────────────────────────────────────────

/// Zombie-connection detection: every heartbeat must be acknowledged
/// before the next one is due.
#[derive(Debug, Default)]
struct HeartbeatAcks {
    awaiting: bool,
}

impl HeartbeatAcks {
    /// `false` when the previous heartbeat was never acknowledged.
    fn on_tick(&mut self) -> bool {
        if self.awaiting {
            return false;
        }
        self.awaiting = true;
        true
    }

    fn on_ack(&mut self) {
        self.awaiting = false;
    }
}

// ── Gateway payloads ───────────────────────────────────────────────

fn identify_payload(token: &str) -> Value {
    json!({
        "op": OP_IDENTIFY,
        "d": {
            "token": token,
            "intents": INTENTS,
            "properties": {
                "os": std::env::consts::OS,
                "browser": "notecatch",
                "device": "notecatch"
            }
        }
    })
}

fn heartbeat_payload(seq: Option<u64>) -> Value {
    json!({ "op": OP_HEARTBEAT, "d": seq })
}

fn heartbeat_interval(hello: &Value) -> Option<u64> {
    if hello.get("op").and_then(Value::as_u64) != Some(OP_HELLO) {
        return None;
    }
    hello
        .get("d")
        .and_then(|d| d.get("heartbeat_interval"))
        .and_then(Value::as_u64)
        .filter(|ms| *ms > 0)
}

/// Turn a `MESSAGE_CREATE` payload into a [`ChannelMessage`]. Messages from
/// bots (including this one) are dropped.
fn parse_message_create(data: &Value, bot_user_id: Option<&str>) -> Option<ChannelMessage> {
    let author = data.get("author")?;
    let author_id = author.get("id").and_then(Value::as_str)?;
    if author.get("bot").and_then(Value::as_bool).unwrap_or(false) {
        return None;
    }
    if bot_user_id == Some(author_id) {
        return None;
    }

    let id = data.get("id").and_then(Value::as_str)?.to_string();
    let channel_id = data.get("channel_id").and_then(Value::as_str)?.to_string();
    let content = data
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    Some(ChannelMessage {
        id,
        sender: author_id.to_string(),
        reply_target: channel_id,
        content,
    })
}

/// Parse a component click. Returns the interaction and its callback token.
fn parse_interaction_create(data: &Value) -> Option<(ChannelInteraction, String)> {
    if data.get("type").and_then(Value::as_u64) != Some(INTERACTION_COMPONENT) {
        return None;
    }
    let id = data.get("id").and_then(Value::as_str)?.to_string();
    let token = data.get("token").and_then(Value::as_str)?.to_string();
    let custom_id = data
        .get("data")
        .and_then(|d| d.get("custom_id"))
        .and_then(Value::as_str)?
        .to_string();

    // Guild clicks carry `member.user`, DM clicks carry `user`.
    let sender = data
        .get("member")
        .and_then(|m| m.get("user"))
        .or_else(|| data.get("user"))
        .and_then(|u| u.get("id"))
        .and_then(Value::as_str)?
        .to_string();

    let message = data.get("message")?;
    let message_id = message.get("id").and_then(Value::as_str)?.to_string();
    let channel_id = data
        .get("channel_id")
        .or_else(|| message.get("channel_id"))
        .and_then(Value::as_str)?
        .to_string();

    Some((
        ChannelInteraction {
            id,
            sender,
            custom_id,
            message: MessageRef {
                channel_id,
                message_id,
            },
        },
        token,
    ))
}

// ── REST payloads ──────────────────────────────────────────────────

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Create/edit message body. Always sends `embeds` and `components` so an
/// edit replaces both.
fn view_payload(view: &InteractiveView) -> Value {
    let embeds: Vec<Value> = view
        .embed
        .iter()
        .map(|embed| {
            let mut e = json!({ "title": truncate_chars(&embed.title, MAX_EMBED_TITLE_CHARS) });
            if let Some(description) = &embed.description {
                e["description"] =
                    json!(truncate_chars(description, MAX_EMBED_DESCRIPTION_CHARS));
            }
            if let Some(footer) = &embed.footer {
                e["footer"] = json!({ "text": footer });
            }
            e
        })
        .collect();

    let components: Vec<Value> = if view.buttons.is_empty() {
        Vec::new()
    } else {
        let buttons: Vec<Value> = view
            .buttons
            .iter()
            .map(|b| {
                json!({
                    "type": 2,
                    "style": match b.style {
                        ButtonStyle::Primary => 1,
                        ButtonStyle::Danger => 4,
                    },
                    "label": b.label,
                    "custom_id": b.custom_id,
                    "disabled": b.disabled,
                })
            })
            .collect();
        vec![json!({ "type": 1, "components": buttons })]
    };

    json!({
        "content": truncate_chars(&view.content, MAX_CONTENT_CHARS),
        "embeds": embeds,
        "components": components,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::traits::{Button, Embed};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn channel_for(server: &MockServer) -> DiscordChannel {
        DiscordChannel::with_endpoints("tok".into(), server.uri(), "ws://unused".into())
    }

    #[test]
    fn intents_cover_guild_dm_and_content() {
        assert_eq!(INTENTS, 512 | 4096 | 32768);
        assert_eq!(identify_payload("abc")["d"]["intents"], INTENTS);
        assert_eq!(identify_payload("abc")["d"]["token"], "abc");
    }

    #[test]
    fn heartbeat_carries_last_sequence() {
        assert_eq!(heartbeat_payload(None), json!({"op": 1, "d": null}));
        assert_eq!(heartbeat_payload(Some(42)), json!({"op": 1, "d": 42}));
    }

    #[test]
    fn hello_interval_is_read() {
        let hello = json!({"op": 10, "d": {"heartbeat_interval": 41250}});
        assert_eq!(heartbeat_interval(&hello), Some(41250));
        assert_eq!(heartbeat_interval(&json!({"op": 0, "d": {}})), None);
    }

    #[test]
    fn missed_ack_ends_the_session() {
        let mut acks = HeartbeatAcks::default();
        assert!(acks.on_tick());
        acks.on_ack();
        assert!(acks.on_tick());
        // No ACK for the last beat.
        assert!(!acks.on_tick());
    }

    fn message_data(author_id: &str, bot: bool) -> Value {
        json!({
            "id": "175928847299117063",
            "channel_id": "c1",
            "content": "leche, huevos, pan",
            "author": {"id": author_id, "bot": bot}
        })
    }

    #[test]
    fn message_create_is_parsed() {
        let msg = parse_message_create(&message_data("1001", false), Some("999")).unwrap();
        assert_eq!(msg.sender, "1001");
        assert_eq!(msg.reply_target, "c1");
        assert_eq!(msg.content, "leche, huevos, pan");
        assert_eq!(msg.id, "175928847299117063");
    }

    #[test]
    fn own_and_bot_messages_are_dropped() {
        assert!(parse_message_create(&message_data("999", false), Some("999")).is_none());
        assert!(parse_message_create(&message_data("1001", true), Some("999")).is_none());
    }

    fn interaction_data() -> Value {
        json!({
            "type": 3,
            "id": "i1",
            "token": "itok",
            "channel_id": "c1",
            "data": {"custom_id": "capture:confirm:abc"},
            "member": {"user": {"id": "1001"}},
            "message": {"id": "m1"}
        })
    }

    #[test]
    fn component_click_is_parsed() {
        let (interaction, token) = parse_interaction_create(&interaction_data()).unwrap();
        assert_eq!(token, "itok");
        assert_eq!(interaction.sender, "1001");
        assert_eq!(interaction.custom_id, "capture:confirm:abc");
        assert_eq!(interaction.message.message_id, "m1");
        assert_eq!(interaction.message.channel_id, "c1");
    }

    #[test]
    fn dm_click_uses_top_level_user() {
        let mut data = interaction_data();
        data.as_object_mut().unwrap().remove("member");
        data["user"] = json!({"id": "2002"});
        let (interaction, _) = parse_interaction_create(&data).unwrap();
        assert_eq!(interaction.sender, "2002");
    }

    #[test]
    fn non_component_interactions_are_ignored() {
        let mut data = interaction_data();
        data["type"] = json!(2);
        assert!(parse_interaction_create(&data).is_none());
    }

    #[test]
    fn view_payload_renders_embed_and_buttons() {
        let view = InteractiveView {
            content: String::new(),
            embed: Some(Embed {
                title: "Compras".into(),
                description: Some("• leche".into()),
                footer: Some("LIST".into()),
            }),
            buttons: vec![Button {
                label: "Save".into(),
                custom_id: "capture:confirm:x".into(),
                style: ButtonStyle::Primary,
                disabled: true,
            }],
        };
        let payload = view_payload(&view);
        assert_eq!(payload["embeds"][0]["title"], "Compras");
        assert_eq!(payload["embeds"][0]["description"], "• leche");
        assert_eq!(payload["embeds"][0]["footer"]["text"], "LIST");
        let button = &payload["components"][0]["components"][0];
        assert_eq!(button["custom_id"], "capture:confirm:x");
        assert_eq!(button["style"], 1);
        assert_eq!(button["disabled"], true);
    }

    #[test]
    fn view_payload_clears_components_when_none() {
        let payload = view_payload(&InteractiveView::text("hi"));
        assert_eq!(payload["components"], json!([]));
        assert_eq!(payload["embeds"], json!([]));
    }

    #[test]
    fn long_content_is_truncated_on_char_boundary() {
        let text = "ñ".repeat(MAX_CONTENT_CHARS + 10);
        let payload = view_payload(&InteractiveView::text(text));
        assert_eq!(
            payload["content"].as_str().unwrap().chars().count(),
            MAX_CONTENT_CHARS
        );
    }

    #[test]
    fn long_embed_title_and_description_are_truncated() {
        let items: Vec<String> = (0..600).map(|i| format!("• artículo {i}")).collect();
        let view = InteractiveView {
            content: "Save this?".into(),
            embed: Some(Embed {
                title: "ñ".repeat(300),
                description: Some(items.join("\n")),
                footer: None,
            }),
            buttons: Vec::new(),
        };
        let payload = view_payload(&view);
        let embed = &payload["embeds"][0];
        assert_eq!(
            embed["title"].as_str().unwrap().chars().count(),
            MAX_EMBED_TITLE_CHARS
        );
        let description = embed["description"].as_str().unwrap();
        assert_eq!(description.chars().count(), MAX_EMBED_DESCRIPTION_CHARS);
        assert!(description.starts_with("• artículo 0\n"));
    }

    #[tokio::test]
    async fn react_encodes_emoji_in_path() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/channels/c1/messages/m1/reactions/%F0%9F%91%80/@me"))
            .and(header("authorization", "Bot tok"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let target = MessageRef {
            channel_id: "c1".into(),
            message_id: "m1".into(),
        };
        channel_for(&server).react(&target, "👀").await.unwrap();
    }

    #[tokio::test]
    async fn send_returns_message_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/channels/c1/messages"))
            .and(body_partial_json(json!({"content": "hello"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "m9"})))
            .mount(&server)
            .await;

        let id = channel_for(&server)
            .send(&SendMessage::text("c1", "hello"))
            .await
            .unwrap();
        assert_eq!(id.as_deref(), Some("m9"));
    }

    #[tokio::test]
    async fn edit_failure_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/channels/c1/messages/m1"))
            .respond_with(ResponseTemplate::new(403).set_body_string("missing access"))
            .mount(&server)
            .await;

        let edit = EditMessage {
            target: MessageRef {
                channel_id: "c1".into(),
                message_id: "m1".into(),
            },
            view: InteractiveView::text("done"),
        };
        assert!(channel_for(&server).edit(&edit).await.is_err());
    }

    #[tokio::test]
    async fn interaction_is_acknowledged_with_deferred_update() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/interactions/i1/itok/callback"))
            .and(body_partial_json(json!({"type": 6})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let channel = channel_for(&server);
        let url = format!("{}/interactions/i1/itok/callback", server.uri());
        acknowledge_interaction(&channel.client, &url).await.unwrap();
    }

    #[tokio::test]
    async fn click_is_forwarded_without_waiting_for_the_acknowledgement() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/interactions/i1/itok/callback"))
            .respond_with(ResponseTemplate::new(204).set_delay(Duration::from_secs(30)))
            .mount(&server)
            .await;

        let channel = channel_for(&server);
        let (tx, mut rx) = mpsc::channel(4);
        let click = json!({"op": 0, "t": "INTERACTION_CREATE", "d": interaction_data()});

        tokio::time::timeout(Duration::from_secs(2), channel.on_dispatch(&click, &tx))
            .await
            .expect("dispatch blocked on the callback");
        let Some(ChannelEvent::Interaction(interaction)) = rx.recv().await else {
            panic!("expected an interaction event");
        };
        assert_eq!(interaction.custom_id, "capture:confirm:abc");

        for _ in 0..50 {
            if !server.received_requests().await.unwrap_or_default().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
    }

    #[tokio::test]
    async fn dispatch_forwards_messages_after_ready() {
        let server = MockServer::start().await;
        let channel = channel_for(&server);
        let (tx, mut rx) = mpsc::channel(4);

        let ready = json!({"op": 0, "t": "READY", "d": {"user": {"id": "999"}}});
        channel.on_dispatch(&ready, &tx).await;

        let own = json!({"op": 0, "t": "MESSAGE_CREATE", "d": message_data("999", false)});
        channel.on_dispatch(&own, &tx).await;
        let theirs = json!({"op": 0, "t": "MESSAGE_CREATE", "d": message_data("1001", false)});
        channel.on_dispatch(&theirs, &tx).await;

        let Some(ChannelEvent::Message(msg)) = rx.recv().await else {
            panic!("expected a message event");
        };
        assert_eq!(msg.sender, "1001");
        assert!(rx.try_recv().is_err());
    }
}
