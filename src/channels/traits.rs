use async_trait::async_trait;
use tokio::sync::mpsc;

/// A text message received from a chat channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMessage {
    pub id: String,
    pub sender: String,
    /// Where replies go (Discord channel id, or "stdout").
    pub reply_target: String,
    pub content: String,
}

impl ChannelMessage {
    pub fn message_ref(&self) -> MessageRef {
        MessageRef {
            channel_id: self.reply_target.clone(),
            message_id: self.id.clone(),
        }
    }
}

/// A button click on one of our own messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInteraction {
    pub id: String,
    pub sender: String,
    pub custom_id: String,
    /// The message carrying the button.
    pub message: MessageRef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Message(ChannelMessage),
    Interaction(ChannelInteraction),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRef {
    pub channel_id: String,
    pub message_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Embed {
    pub title: String,
    pub description: Option<String>,
    pub footer: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonStyle {
    Primary,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub custom_id: String,
    pub style: ButtonStyle,
    pub disabled: bool,
}

/// Message body plus optional embed and button row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InteractiveView {
    pub content: String,
    pub embed: Option<Embed>,
    pub buttons: Vec<Button>,
}

impl InteractiveView {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    /// Same view with every button disabled.
    pub fn disabled(mut self) -> Self {
        for button in &mut self.buttons {
            button.disabled = true;
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMessage {
    pub recipient: String,
    pub view: InteractiveView,
}

impl SendMessage {
    pub fn text(recipient: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            view: InteractiveView::text(content),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditMessage {
    pub target: MessageRef,
    pub view: InteractiveView,
}

/// A chat surface the bot listens on and replies through.
#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    /// Forward inbound events to `tx` until the channel shuts down.
    async fn listen(&self, tx: mpsc::Sender<ChannelEvent>) -> anyhow::Result<()>;

    /// Send a message. Returns the new message id when the platform gives one.
    async fn send(&self, message: &SendMessage) -> anyhow::Result<Option<String>>;

    async fn react(&self, target: &MessageRef, emoji: &str) -> anyhow::Result<()>;

    async fn edit(&self, message: &EditMessage) -> anyhow::Result<()>;
}
