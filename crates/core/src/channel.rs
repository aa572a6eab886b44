//! Channel trait: the abstraction over chat platforms.
//!
//! A Channel connects AI Dog to a messaging surface (Discord, a local
//! console). It turns platform events into [`ChannelMessage`]s and delivers
//! replies back; deciding what to answer is the runtime's job.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};

use crate::error::ChannelError;
use crate::message::Identity;

/// A message received from a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// Name of the channel that produced this message
    pub channel: String,

    /// Who sent it
    pub sender: Identity,

    /// Human-readable sender name (if available)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,

    /// The conversation (guild channel or DM) to reply into
    pub chat_id: String,

    /// Text with the bot's own mention removed
    pub content: String,

    /// True if the bot was mentioned or the message is a DM
    pub addressed: bool,

    /// True for direct messages
    pub is_direct: bool,

    /// True if the author is a bot account
    #[serde(default)]
    pub from_bot: bool,

    /// Number of files attached to the message
    #[serde(default)]
    pub attachment_count: usize,

    /// Platform mention of the sender, prepended to replies outside DMs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mention: Option<String>,
}

impl ChannelMessage {
    /// Build a direct message with no attachments (console, tests).
    pub fn direct(channel: impl Into<String>, sender: Identity, content: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            sender,
            sender_name: None,
            chat_id: sender.to_string(),
            content: content.into(),
            addressed: true,
            is_direct: true,
            from_bot: false,
            attachment_count: 0,
            mention: None,
        }
    }

    pub fn has_attachments(&self) -> bool {
        self.attachment_count > 0
    }

    /// Format a reply to this message, addressing the sender outside DMs.
    pub fn reply_text(&self, body: &str) -> String {
        match (&self.mention, self.is_direct) {
            (Some(mention), false) => format!("{mention} {body}"),
            _ => body.to_string(),
        }
    }
}

/// The core Channel trait.
///
/// Implementations own the platform connection. Everything the runtime
/// needs from the platform goes through these methods.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name (e.g., "discord", "console").
    fn name(&self) -> &str;

    /// Connect and start yielding incoming messages.
    async fn start(&self) -> std::result::Result<mpsc::Receiver<ChannelMessage>, ChannelError>;

    /// Send a message to a specific conversation.
    async fn send(&self, chat_id: &str, content: &str) -> std::result::Result<(), ChannelError>;

    /// Show a typing indicator (if the platform supports it).
    async fn send_typing(&self, _chat_id: &str) -> std::result::Result<(), ChannelError> {
        Ok(())
    }

    /// Reflect whether requests are in flight (presence, status line).
    async fn set_busy(&self, _busy: bool) {}

    /// Flips to `true` once the platform connection is established.
    fn ready(&self) -> watch::Receiver<bool>;

    /// Disconnect gracefully.
    async fn stop(&self) -> std::result::Result<(), ChannelError> {
        Ok(())
    }
}
