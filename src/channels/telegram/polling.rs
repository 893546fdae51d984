//! Telegram polling mode: getUpdates loop and message conversion

use serde::Deserialize;
use tokio::sync::mpsc;

use super::dedup::UpdateDedup;
use crate::channels::{BotCommandKind, IncomingMessage, MessageKind};
use crate::{Error, Result};

/// Long-poll timeout passed to `getUpdates` (seconds)
const LONG_POLL_TIMEOUT_SECS: u64 = 30;

/// Response from Telegram getUpdates API
#[derive(Debug, Deserialize)]
struct GetUpdatesResponse {
    ok: bool,
    #[serde(default)]
    result: Vec<PollingUpdate>,
    description: Option<String>,
}

/// A single update from getUpdates
#[derive(Debug, Deserialize)]
pub struct PollingUpdate {
    update_id: i64,
    message: Option<PollingMessage>,
}

/// Message from a polling update
#[derive(Debug, Deserialize)]
struct PollingMessage {
    message_id: i64,
    chat: PollingChat,
    from: Option<PollingUser>,
    text: Option<String>,
    voice: Option<PollingVoice>,
}

/// Voice message from polling
#[derive(Debug, Deserialize)]
struct PollingVoice {
    file_id: String,
    mime_type: Option<String>,
}

/// Chat info from polling
#[derive(Debug, Deserialize)]
struct PollingChat {
    id: i64,
}

/// User info from polling
#[derive(Debug, Deserialize)]
struct PollingUser {
    id: i64,
    is_bot: bool,
    first_name: String,
}

impl super::TelegramChannel {
    /// Spawn a background task that polls Telegram's getUpdates API
    ///
    /// Forwards received messages into the mpsc channel created by
    /// `with_receiver`. The task ends when the receiver is dropped or the
    /// returned handle is aborted.
    ///
    /// # Errors
    ///
    /// Returns error if the channel was created without a receiver
    pub fn start_polling(&self, interval: std::time::Duration) -> Result<tokio::task::JoinHandle<()>> {
        let tx = self.message_tx.clone().ok_or_else(|| {
            Error::Channel("start_polling requires a channel created with_receiver".to_string())
        })?;
        let channel = self.clone();

        Ok(tokio::spawn(async move {
            channel.polling_loop(tx, interval).await;
        }))
    }

    /// Run the polling loop (background task)
    async fn polling_loop(&self, tx: mpsc::Sender<IncomingMessage>, interval: std::time::Duration) {
        // Delete any existing webhook so getUpdates works
        if let Err(e) = self.delete_webhook().await {
            tracing::warn!(error = %e, "failed to delete Telegram webhook before polling");
        }

        let url = self.method_url("getUpdates");
        let mut offset: Option<i64> = None;
        let mut dedup = UpdateDedup::default();

        tracing::info!("Telegram polling started");

        loop {
            // Polling again would confirm updates nobody will handle
            if tx.is_closed() {
                tracing::info!("message receiver closed, stopping Telegram polling");
                return;
            }

            let mut params = serde_json::json!({
                "timeout": LONG_POLL_TIMEOUT_SECS,
                "allowed_updates": ["message"],
            });
            if let Some(off) = offset {
                params["offset"] = serde_json::json!(off);
            }

            match self.client.post(&url).json(&params).send().await {
                Ok(resp) => match resp.json::<GetUpdatesResponse>().await {
                    Ok(updates) if updates.ok => {
                        for update in &updates.result {
                            // Advance offset past this update
                            offset = Some(update.update_id + 1);

                            if dedup.is_duplicate(update.update_id) {
                                continue;
                            }

                            if let Some(msg) = update_to_incoming(update) {
                                tracing::debug!(chat_id = %msg.chat_id, "Telegram message received");
                                if tx.send(msg).await.is_err() {
                                    tracing::info!("message receiver closed, stopping Telegram polling");
                                    return;
                                }
                            }
                        }
                    }
                    Ok(updates) => {
                        tracing::warn!(
                            description = updates.description.as_deref().unwrap_or_default(),
                            "Telegram getUpdates rejected"
                        );
                    }
                    Err(e) => {
                        tracing::warn!(error = %e.without_url(), "failed to parse Telegram updates");
                    }
                },
                Err(e) => {
                    tracing::warn!(error = %e.without_url(), "Telegram getUpdates error");
                }
            }

            tokio::time::sleep(interval).await;
        }
    }
}

/// Classify a polling message into a `MessageKind`
fn message_kind(msg: &PollingMessage) -> MessageKind {
    if let Some(voice) = &msg.voice {
        return MessageKind::Voice {
            handle: voice.file_id.clone(),
            mime_hint: voice.mime_type.clone(),
        };
    }

    match &msg.text {
        Some(text) => BotCommandKind::parse(text).map_or_else(
            || MessageKind::Text { body: text.clone() },
            MessageKind::Command,
        ),
        None => MessageKind::Unsupported,
    }
}

/// Convert a polling update into an `IncomingMessage`
///
/// Returns `None` for updates without a message and for messages sent by bots.
#[must_use]
pub fn update_to_incoming(update: &PollingUpdate) -> Option<IncomingMessage> {
    let msg = update.message.as_ref()?;

    // Skip bot messages
    if msg.from.as_ref().is_some_and(|u| u.is_bot) {
        return None;
    }

    let sender_id = msg
        .from
        .as_ref()
        .map_or_else(|| msg.chat.id.to_string(), |u| u.id.to_string());

    let sender_name = msg
        .from
        .as_ref()
        .map_or_else(|| "Unknown".to_string(), |u| u.first_name.clone());

    Some(IncomingMessage {
        id: msg.message_id.to_string(),
        chat_id: msg.chat.id.to_string(),
        sender_id,
        sender_name,
        kind: message_kind(msg),
    })
}
