//! Glue between a [`Channel`] and the [`CaptureCoordinator`].
//!
//! Each inbound event runs in its own task, so a slow LLM call never
//! blocks the next message. Outcomes are rendered as reactions, replies
//! and message edits. A failed reaction or edit is logged and dropped; a
//! preview that cannot be delivered is discarded and reported.

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::channels::{
    capture_custom_id, parse_capture_custom_id, Button, ButtonStyle, Channel, ChannelEvent,
    ChannelInteraction, ChannelMessage, EditMessage, Embed, InteractiveView, MessageRef,
    SendMessage,
};
use crate::classifier::CaptureKind;
use crate::coordinator::{
    Capture, CaptureBody, CaptureCoordinator, CaptureRequest, Decision, IgnoreReason, Outcome,
};

pub const EMOJI_RECEIVED: &str = "👀";
pub const EMOJI_STORED: &str = "✅";
pub const EMOJI_FAILED: &str = "❌";

pub const MSG_CLASSIFICATION_FAILED: &str = "Could not analyze the text with the AI.";
const MSG_UNCERTAIN: &str = "It may have been saved anyway; check your notes before retrying.";
pub const MSG_PREVIEW_FAILED: &str =
    "Could not show the capture for confirmation. Nothing was saved; send it again.";

pub struct Dispatcher {
    coordinator: Arc<CaptureCoordinator>,
    channel: Arc<dyn Channel>,
}

impl Dispatcher {
    pub fn new(coordinator: Arc<CaptureCoordinator>, channel: Arc<dyn Channel>) -> Self {
        Self {
            coordinator,
            channel,
        }
    }

    /// Consume events until every sender is dropped.
    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<ChannelEvent>) {
        while let Some(event) = rx.recv().await {
            let this = Arc::clone(&self);
            tokio::spawn(async move {
                match event {
                    ChannelEvent::Message(msg) => this.handle_message(&msg).await,
                    ChannelEvent::Interaction(click) => this.handle_interaction(&click).await,
                }
            });
        }
        tracing::info!(channel = self.channel.name(), "Dispatcher: event stream closed");
    }

    pub async fn handle_message(&self, msg: &ChannelMessage) {
        // Strangers get no reaction at all.
        if !self.coordinator.is_authorized(&msg.sender) {
            tracing::debug!(sender = %msg.sender, "Dropping message from unauthorized sender");
            return;
        }

        let target = msg.message_ref();
        self.react(&target, EMOJI_RECEIVED).await;

        let request = CaptureRequest {
            raw_text: msg.content.clone(),
            requester_id: msg.sender.clone(),
        };
        match self.coordinator.handle(&request).await {
            Outcome::Stored { .. } => self.react(&target, EMOJI_STORED).await,
            Outcome::ClassificationFailed { reason } => {
                tracing::error!(message_id = %msg.id, "Classification failed: {reason}");
                self.react(&target, EMOJI_FAILED).await;
                self.reply(&msg.reply_target, MSG_CLASSIFICATION_FAILED).await;
            }
            Outcome::StoreFailed {
                reason, uncertain, ..
            } => {
                self.react(&target, EMOJI_FAILED).await;
                self.reply(&msg.reply_target, &store_failed_text(&reason, uncertain))
                    .await;
            }
            Outcome::Staged {
                pending_id,
                capture,
            } => {
                let message = SendMessage {
                    recipient: msg.reply_target.clone(),
                    view: preview_view(&pending_id, &capture),
                };
                if let Err(e) = self.channel.send(&message).await {
                    tracing::error!(pending_id = %pending_id, "Failed to send capture preview: {e}");
                    // Without buttons nobody can resolve it.
                    self.coordinator.gate().resolve(&pending_id, Decision::Discard);
                    self.react(&target, EMOJI_FAILED).await;
                    self.reply(&msg.reply_target, MSG_PREVIEW_FAILED).await;
                }
            }
            Outcome::Ignored(IgnoreReason::EmptyText) => {}
            other => tracing::debug!(outcome = ?other, "Unexpected outcome for a message"),
        }
    }

    pub async fn handle_interaction(&self, click: &ChannelInteraction) {
        let Some((decision, pending_id)) = parse_capture_custom_id(&click.custom_id) else {
            tracing::debug!(custom_id = %click.custom_id, "Ignoring foreign component");
            return;
        };

        let outcome = self
            .coordinator
            .resolve(pending_id, decision, &click.sender)
            .await;

        let content = match outcome {
            Outcome::Stored { title, kind, .. } => {
                format!("{EMOJI_STORED} {} saved: **{title}**", kind_label(kind))
            }
            Outcome::StoreFailed {
                reason, uncertain, ..
            } => format!("{EMOJI_FAILED} {}", store_failed_text(&reason, uncertain)),
            Outcome::Discarded { title } => format!("🗑️ Discarded: **{title}**"),
            Outcome::AlreadyResolved | Outcome::UnknownCapture | Outcome::Ignored(_) => return,
            other => {
                tracing::debug!(outcome = ?other, "Unexpected outcome for a click");
                return;
            }
        };

        let edit = EditMessage {
            target: click.message.clone(),
            view: InteractiveView {
                content,
                embed: None,
                buttons: staging_buttons(pending_id),
            }
            .disabled(),
        };
        if let Err(e) = self.channel.edit(&edit).await {
            tracing::warn!(pending_id = %pending_id, "Failed to update staged message: {e}");
        }
    }

    async fn react(&self, target: &MessageRef, emoji: &str) {
        if let Err(e) = self.channel.react(target, emoji).await {
            tracing::warn!(message_id = %target.message_id, "Could not react with {emoji}: {e}");
        }
    }

    async fn reply(&self, recipient: &str, text: &str) {
        if let Err(e) = self.channel.send(&SendMessage::text(recipient, text)).await {
            tracing::warn!("Could not send reply: {e}");
        }
    }
}

fn kind_label(kind: CaptureKind) -> &'static str {
    match kind {
        CaptureKind::Note => "Note",
        CaptureKind::List => "List",
    }
}

fn store_failed_text(reason: &str, uncertain: bool) -> String {
    if uncertain {
        format!("Error saving the note: {reason}\n{MSG_UNCERTAIN}")
    } else {
        format!("Error saving the note: {reason}")
    }
}

fn staging_buttons(pending_id: &str) -> Vec<Button> {
    vec![
        Button {
            label: "Save".into(),
            custom_id: capture_custom_id(Decision::Confirm, pending_id),
            style: ButtonStyle::Primary,
            disabled: false,
        },
        Button {
            label: "Discard".into(),
            custom_id: capture_custom_id(Decision::Discard, pending_id),
            style: ButtonStyle::Danger,
            disabled: false,
        },
    ]
}

fn preview_view(pending_id: &str, capture: &Capture) -> InteractiveView {
    let description = match &capture.body {
        CaptureBody::Note(text) => text.clone(),
        CaptureBody::List(items) => items
            .iter()
            .map(|item| format!("• {item}"))
            .collect::<Vec<_>>()
            .join("\n"),
    };
    InteractiveView {
        content: "Save this?".into(),
        embed: Some(Embed {
            title: capture.title.clone(),
            description: Some(description),
            footer: Some(kind_label(capture.kind()).into()),
        }),
        buttons: staging_buttons(pending_id),
    }
}
