//! Chat transport adapters
//!
//! The orchestrator talks to the chat client only through the `Channel` trait.

mod telegram;

use std::path::Path;

use async_trait::async_trait;

pub use telegram::{BotCommand, PollingUpdate, TelegramChannel, UpdateDedup, update_to_incoming};

use crate::Result;

/// Bot command understood without calling any backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotCommandKind {
    /// `/start`: greeting
    Start,
    /// `/help`: short usage text
    Help,
}

impl BotCommandKind {
    /// Parse a command from message text (`/start`, `/help@my_bot`, ...)
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let first = text.split_whitespace().next()?;
        let command = first.strip_prefix('/')?;
        let command = command.split('@').next().unwrap_or(command);
        match command.to_lowercase().as_str() {
            "start" => Some(Self::Start),
            "help" => Some(Self::Help),
            _ => None,
        }
    }
}

/// What an incoming message carries
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    /// Voice note stored on the transport
    Voice {
        /// Opaque transport file handle
        handle: String,
        /// MIME type reported by the transport, if any
        mime_hint: Option<String>,
    },
    /// Plain text
    Text {
        /// Message body
        body: String,
    },
    /// Bot command
    Command(BotCommandKind),
    /// Any other message type (sticker, photo, ...)
    Unsupported,
}

/// A message from a channel
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Message identifier (platform-specific)
    pub id: String,

    /// Chat the message was sent in; replies go here
    pub chat_id: String,

    /// Sender identifier
    pub sender_id: String,

    /// Sender display name
    pub sender_name: String,

    /// Message payload
    pub kind: MessageKind,
}

/// Trait for chat transport adapters
#[async_trait]
pub trait Channel: Send + Sync {
    /// Get the channel name
    fn name(&self) -> &'static str;

    /// Verify credentials and connectivity
    async fn connect(&mut self) -> Result<()>;

    /// Send a text message
    async fn send_text(&self, chat_id: &str, text: &str) -> Result<()>;

    /// Upload a local audio file as a voice message
    async fn send_voice_file(&self, chat_id: &str, path: &Path, display_name: &str) -> Result<()>;

    /// Send typing indicator to show the bot is processing
    ///
    /// Default implementation is a no-op for channels that don't support typing
    async fn send_typing(&self, _chat_id: &str) -> Result<()> {
        Ok(())
    }

    /// Resolve a file handle to a download URL
    async fn file_url(&self, handle: &str) -> Result<String>;
}
