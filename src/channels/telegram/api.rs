//! Raw Telegram Bot API calls

use std::path::Path;

use super::chunking::{MESSAGE_LIMIT, split_message};
use super::types::*;
use crate::{Error, Result};

/// Guess an upload MIME type from a file extension
fn audio_mime(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .as_deref()
    {
        Some("ogg" | "oga" | "opus") => "audio/ogg",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("m4a") => "audio/mp4",
        _ => "application/octet-stream",
    }
}

/// Strip the request URL (which embeds the bot token) from a reqwest error
fn redact(e: reqwest::Error) -> reqwest::Error {
    e.without_url()
}

impl super::TelegramChannel {
    /// Send a plain-text message to a chat
    ///
    /// Text over Telegram's size cap goes out as several messages, in order.
    ///
    /// # Errors
    ///
    /// Returns error if the text is blank or an API request fails; parts
    /// sent before the failure stay delivered
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let parts = split_message(text, MESSAGE_LIMIT);
        if parts.is_empty() {
            return Err(Error::Channel("Telegram sendMessage error: message is empty".to_string()));
        }

        let count = parts.len();
        for part in &parts {
            self.send_message_part(chat_id, part).await?;
        }

        if count > 1 {
            tracing::debug!(chat_id, parts = count, "long Telegram message split");
        }
        Ok(())
    }

    async fn send_message_part(&self, chat_id: i64, text: &str) -> Result<()> {
        let url = self.method_url("sendMessage");

        let request = SendMessageRequest {
            chat_id,
            text,
            disable_web_page_preview: Some(true),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Channel(format!("Telegram sendMessage error: {}", redact(e))))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let body_lower = body.to_lowercase();

            if body_lower.contains("chat not found")
                || body_lower.contains("bot was blocked by the user")
            {
                return Err(Error::Channel(format!(
                    "Telegram chat {chat_id} not reachable: {body}"
                )));
            }

            return Err(Error::Channel(format!(
                "Telegram sendMessage error: {status} - {body}"
            )));
        }

        tracing::debug!(chat_id, "Telegram message sent");
        Ok(())
    }

    /// Upload a local audio file with `sendVoice`
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or the API request fails
    pub async fn send_voice_upload(&self, chat_id: i64, path: &Path, display_name: &str) -> Result<()> {
        let url = self.method_url("sendVoice");

        let data = tokio::fs::read(path).await?;
        let size = data.len();

        let part = reqwest::multipart::Part::bytes(data)
            .file_name(display_name.to_string())
            .mime_str(audio_mime(path))
            .map_err(|e| Error::Channel(format!("Telegram sendVoice error: {e}")))?;

        let form = reqwest::multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .part("voice", part);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Channel(format!("Telegram sendVoice error: {}", redact(e))))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Channel(format!(
                "Telegram sendVoice error: {status} - {body}"
            )));
        }

        tracing::debug!(chat_id, bytes = size, "Telegram voice message sent");
        Ok(())
    }

    /// Resolve a `file_id` to its storage path with `getFile`
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails or no path is returned
    pub async fn get_file_path(&self, file_id: &str) -> Result<String> {
        let url = self.method_url("getFile");

        let response = self
            .client
            .post(&url)
            .json(&GetFileRequest { file_id })
            .send()
            .await
            .map_err(|e| Error::Channel(format!("Telegram getFile error: {}", redact(e))))?;

        let body = response
            .text()
            .await
            .map_err(|e| Error::Channel(format!("Telegram getFile response read error: {}", redact(e))))?;

        let parsed: TelegramResponse<TelegramFile> = serde_json::from_str(&body)
            .map_err(|e| Error::Channel(format!("Telegram getFile parse error: {e}")))?;

        if !parsed.ok {
            return Err(Error::Channel(format!(
                "Telegram getFile error: {}",
                parsed.description.unwrap_or_default()
            )));
        }

        parsed
            .result
            .and_then(|file| file.file_path)
            .ok_or_else(|| Error::Channel("Telegram getFile returned no file_path".to_string()))
    }

    /// Delete webhook (required before polling)
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails
    pub async fn delete_webhook(&self) -> Result<()> {
        let url = self.method_url("deleteWebhook");

        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| Error::Channel(format!("Telegram deleteWebhook error: {}", redact(e))))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Channel(format!(
                "Telegram deleteWebhook error: {status} - {body}"
            )));
        }

        tracing::info!("Telegram webhook deleted");
        Ok(())
    }

    /// Sync bot commands with Telegram via `setMyCommands`
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails
    pub async fn sync_commands(&self, commands: &[BotCommand]) -> Result<()> {
        let url = self.method_url("setMyCommands");

        let response = self
            .client
            .post(&url)
            .json(&SetMyCommandsRequest { commands })
            .send()
            .await
            .map_err(|e| Error::Channel(format!("Telegram setMyCommands error: {}", redact(e))))?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Channel(format!(
                "Telegram setMyCommands error: {body}"
            )));
        }

        tracing::info!(count = commands.len(), "Telegram bot commands synced");
        Ok(())
    }

    /// Send a chat action (typing indicator, etc.)
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails
    pub async fn send_chat_action(&self, chat_id: i64, action: &str) -> Result<()> {
        let url = self.method_url("sendChatAction");

        let response = self
            .client
            .post(&url)
            .json(&SendChatActionRequest { chat_id, action })
            .send()
            .await
            .map_err(|e| Error::Channel(format!("Telegram sendChatAction error: {}", redact(e))))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Channel(format!(
                "Telegram sendChatAction error: {status} - {body}"
            )));
        }

        Ok(())
    }

    /// Validate the bot token by calling `getMe`
    ///
    /// # Errors
    ///
    /// Returns error if the token is invalid
    pub async fn get_me(&self) -> Result<()> {
        let url = self.method_url("getMe");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Channel(format!("Telegram getMe error: {}", redact(e))))?;

        if !response.status().is_success() {
            return Err(Error::Channel("Invalid Telegram bot token".to_string()));
        }

        Ok(())
    }
}
