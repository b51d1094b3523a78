//! Chat surfaces. A [`Channel`] turns platform events into
//! [`ChannelEvent`]s and renders replies back.

pub mod cli;
pub mod discord;
pub mod traits;

pub use cli::CliChannel;
pub use discord::DiscordChannel;
pub use traits::{
    Button, ButtonStyle, Channel, ChannelEvent, ChannelInteraction, ChannelMessage, EditMessage,
    Embed, InteractiveView, MessageRef, SendMessage,
};

use crate::coordinator::Decision;

const CUSTOM_ID_PREFIX: &str = "capture";

/// Button id for a staged capture: `capture:<confirm|discard>:<pending_id>`.
pub fn capture_custom_id(decision: Decision, pending_id: &str) -> String {
    format!("{CUSTOM_ID_PREFIX}:{}:{pending_id}", decision.as_str())
}

pub fn parse_capture_custom_id(custom_id: &str) -> Option<(Decision, &str)> {
    let mut parts = custom_id.splitn(3, ':');
    if parts.next()? != CUSTOM_ID_PREFIX {
        return None;
    }
    let decision = Decision::parse(parts.next()?)?;
    let pending_id = parts.next().filter(|id| !id.is_empty())?;
    Some((decision, pending_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_id_round_trip() {
        let id = capture_custom_id(Decision::Discard, "abc");
        assert_eq!(id, "capture:discard:abc");
        assert_eq!(parse_capture_custom_id(&id), Some((Decision::Discard, "abc")));
    }

    #[test]
    fn foreign_custom_ids_are_rejected() {
        assert_eq!(parse_capture_custom_id("other:confirm:abc"), None);
        assert_eq!(parse_capture_custom_id("capture:maybe:abc"), None);
        assert_eq!(parse_capture_custom_id("capture:confirm:"), None);
        assert_eq!(parse_capture_custom_id("capture:confirm"), None);
    }
}
