//! Telegram channel adapter
//!
//! Uses long polling for receiving messages and the Bot API for sending

mod api;
mod chunking;
pub mod dedup;
pub mod polling;
pub mod types;

use std::path::Path;

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::mpsc;

use super::{Channel, IncomingMessage};
use crate::{Error, Result};

pub use dedup::UpdateDedup;
pub use polling::{PollingUpdate, update_to_incoming};
pub use types::BotCommand;

/// Capacity of the incoming message queue
const INCOMING_QUEUE: usize = 100;

/// Telegram channel adapter
#[derive(Clone)]
pub struct TelegramChannel {
    token: String,
    api_base: String,
    client: Client,
    message_tx: Option<mpsc::Sender<IncomingMessage>>,
    connected: bool,
}

impl TelegramChannel {
    /// Create a send-only Telegram channel adapter
    #[must_use]
    pub fn new(token: String, api_base: String) -> Self {
        Self {
            token,
            api_base: api_base.trim_end_matches('/').to_string(),
            client: Client::new(),
            message_tx: None,
            connected: false,
        }
    }

    /// Create with a message receiver for polling mode
    ///
    /// Returns the channel and a receiver for incoming messages
    #[must_use]
    pub fn with_receiver(token: String, api_base: String) -> (Self, mpsc::Receiver<IncomingMessage>) {
        let (tx, rx) = mpsc::channel(INCOMING_QUEUE);
        let mut channel = Self::new(token, api_base);
        channel.message_tx = Some(tx);
        (channel, rx)
    }

    /// Whether `connect` succeeded
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.connected
    }

    /// URL of a Bot API method
    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.token)
    }

    /// Download URL of a file path returned by `getFile`
    fn file_download_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{file_path}", self.api_base, self.token)
    }
}

fn parse_chat_id(chat_id: &str) -> Result<i64> {
    chat_id
        .parse()
        .map_err(|_| Error::Channel(format!("Invalid chat ID: {chat_id}")))
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn connect(&mut self) -> Result<()> {
        self.get_me().await?;
        self.connected = true;
        tracing::info!("Telegram channel connected");
        Ok(())
    }

    async fn send_text(&self, chat_id: &str, text: &str) -> Result<()> {
        let chat_id = parse_chat_id(chat_id)?;
        self.send_message(chat_id, text).await
    }

    async fn send_voice_file(&self, chat_id: &str, path: &Path, display_name: &str) -> Result<()> {
        let chat_id = parse_chat_id(chat_id)?;
        self.send_voice_upload(chat_id, path, display_name).await
    }

    async fn send_typing(&self, chat_id: &str) -> Result<()> {
        let chat_id = parse_chat_id(chat_id)?;
        self.send_chat_action(chat_id, "typing").await?;
        tracing::debug!(chat_id, "Telegram typing indicator sent");
        Ok(())
    }

    async fn file_url(&self, handle: &str) -> Result<String> {
        let file_path = self.get_file_path(handle).await?;
        Ok(self.file_download_url(&file_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_method_and_file_urls() {
        let channel = TelegramChannel::new("123:abc".to_string(), "http://localhost:1/".to_string());
        assert_eq!(channel.method_url("getMe"), "http://localhost:1/bot123:abc/getMe");
        assert_eq!(
            channel.file_download_url("voice/file_1.oga"),
            "http://localhost:1/file/bot123:abc/voice/file_1.oga"
        );
    }

    #[test]
    fn rejects_non_numeric_chat_id() {
        assert!(parse_chat_id("-100123").is_ok());
        assert!(matches!(parse_chat_id("general"), Err(Error::Channel(_))));
    }
}
