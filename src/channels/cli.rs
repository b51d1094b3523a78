use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use super::traits::{
    Channel, ChannelEvent, ChannelInteraction, ChannelMessage, EditMessage, InteractiveView,
    MessageRef, SendMessage,
};
use super::capture_custom_id;
use crate::coordinator::Decision;

const REPLY_TARGET: &str = "stdout";

/// Terminal channel for local runs. Every line typed on stdin is a
/// message from `sender`; `/confirm <id>` and `/discard <id>` click the
/// buttons of a staged capture.
pub struct CliChannel {
    sender: String,
    next_id: AtomicU64,
}

impl CliChannel {
    pub fn new(sender: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            next_id: AtomicU64::new(1),
        }
    }

    fn next_message_id(&self) -> String {
        self.next_id.fetch_add(1, Ordering::Relaxed).to_string()
    }

    fn parse_line(&self, line: &str) -> Option<ChannelEvent> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        for decision in [Decision::Confirm, Decision::Discard] {
            let Some(rest) = line.strip_prefix('/').and_then(|l| l.strip_prefix(decision.as_str()))
            else {
                continue;
            };
            let pending_id = rest.trim();
            if pending_id.is_empty() || !rest.starts_with(char::is_whitespace) {
                continue;
            }
            return Some(ChannelEvent::Interaction(ChannelInteraction {
                id: self.next_message_id(),
                sender: self.sender.clone(),
                custom_id: capture_custom_id(decision, pending_id),
                message: MessageRef {
                    channel_id: REPLY_TARGET.into(),
                    message_id: pending_id.to_string(),
                },
            }));
        }

        let id = self.next_message_id();
        Some(ChannelEvent::Message(ChannelMessage {
            id,
            sender: self.sender.clone(),
            reply_target: REPLY_TARGET.into(),
            content: line.to_string(),
        }))
    }
}

/// Plain-text rendering of a view. Buttons become the slash commands
/// that trigger them.
fn render_view(view: &InteractiveView) -> String {
    let mut out = String::new();
    if !view.content.is_empty() {
        out.push_str(&view.content);
        out.push('\n');
    }
    if let Some(embed) = &view.embed {
        out.push_str(&format!("== {} ==\n", embed.title));
        if let Some(description) = &embed.description {
            out.push_str(description);
            out.push('\n');
        }
        if let Some(footer) = &embed.footer {
            out.push_str(&format!("({footer})\n"));
        }
    }
    for button in view.buttons.iter().filter(|b| !b.disabled) {
        let command = button
            .custom_id
            .split(':')
            .skip(1)
            .collect::<Vec<_>>()
            .join(" ");
        out.push_str(&format!("[{}] /{command}\n", button.label));
    }
    out
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn listen(&self, tx: mpsc::Sender<ChannelEvent>) -> anyhow::Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            if let Some(event) = self.parse_line(&line) {
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        }
        tracing::info!("CLI channel: stdin closed");
        Ok(())
    }

    async fn send(&self, message: &SendMessage) -> anyhow::Result<Option<String>> {
        print!("{}", render_view(&message.view));
        Ok(Some(self.next_message_id()))
    }

    async fn react(&self, _target: &MessageRef, emoji: &str) -> anyhow::Result<()> {
        println!("{emoji}");
        Ok(())
    }

    async fn edit(&self, message: &EditMessage) -> anyhow::Result<()> {
        print!("{}", render_view(&message.view));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::traits::{Button, ButtonStyle, Embed};

    #[test]
    fn plain_line_is_a_message_from_the_configured_sender() {
        let cli = CliChannel::new("1001");
        let Some(ChannelEvent::Message(msg)) = cli.parse_line("  leche, huevos, pan \n") else {
            panic!("expected a message");
        };
        assert_eq!(msg.sender, "1001");
        assert_eq!(msg.content, "leche, huevos, pan");
        assert_eq!(msg.reply_target, REPLY_TARGET);
    }

    #[test]
    fn blank_lines_are_skipped() {
        assert!(CliChannel::new("1").parse_line("   ").is_none());
    }

    #[test]
    fn slash_commands_become_clicks() {
        let cli = CliChannel::new("1001");
        let Some(ChannelEvent::Interaction(click)) = cli.parse_line("/confirm abc123") else {
            panic!("expected an interaction");
        };
        assert_eq!(click.custom_id, "capture:confirm:abc123");
        assert_eq!(click.sender, "1001");
        assert_eq!(click.message.message_id, "abc123");

        let Some(ChannelEvent::Interaction(click)) = cli.parse_line("/discard abc123") else {
            panic!("expected an interaction");
        };
        assert_eq!(click.custom_id, "capture:discard:abc123");
    }

    #[test]
    fn incomplete_commands_are_plain_text() {
        let cli = CliChannel::new("1");
        assert!(matches!(cli.parse_line("/confirm"), Some(ChannelEvent::Message(_))));
        assert!(matches!(cli.parse_line("/confirmed x"), Some(ChannelEvent::Message(_))));
    }

    #[test]
    fn rendered_view_lists_enabled_buttons_as_commands() {
        let view = InteractiveView {
            content: String::new(),
            embed: Some(Embed {
                title: "Compras".into(),
                description: Some("leche".into()),
                footer: None,
            }),
            buttons: vec![
                Button {
                    label: "Save".into(),
                    custom_id: "capture:confirm:x1".into(),
                    style: ButtonStyle::Primary,
                    disabled: false,
                },
                Button {
                    label: "Discard".into(),
                    custom_id: "capture:discard:x1".into(),
                    style: ButtonStyle::Danger,
                    disabled: true,
                },
            ],
        };
        let out = render_view(&view);
        assert!(out.contains("== Compras =="));
        assert!(out.contains("[Save] /confirm x1"));
        assert!(!out.contains("/discard"));
    }
}
