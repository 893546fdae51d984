//! Message orchestration
//!
//! Routes each incoming message to the voice, text or command flow and turns
//! every stage result into outgoing replies. Results already delivered are
//! never retracted when a later stage fails.

mod outcome;

use std::path::Path;
use std::sync::Arc;

pub use outcome::{FlowOutcome, Stage};

use crate::agent::ReplyEngine;
use crate::channels::{BotCommandKind, Channel, IncomingMessage, MessageKind};
use crate::voice::{AudioSource, Synthesizer, Transcriber};

/// Reply to `/start`
pub const GREETING: &str = "GREETINGS FELLOW HUMAN\n\nI'm a language model assistant. \
I can search the web and I understand voice messages. Ask me anything";

/// Reply to `/help`
pub const HELP_TEXT: &str = "I'm a language model assistant. I can search the web and I \
understand voice messages. Ask me anything";

/// Reply to empty or non-text messages
pub const TEXT_PROMPT: &str = "Please send a text message.";

/// Prefix of the voice transcription acknowledgment
pub const TRANSCRIPTION_PREFIX: &str = "Transcription: ";

pub const FETCH_ERROR: &str =
    "Whoops! There was an error while downloading your voice message. See logs for details.";

pub const TRANSCRIPTION_ERROR: &str =
    "Whoops! There was an error while transcribing your voice message. See logs for details.";

/// Reply failure in the voice flow (no detail)
pub const VOICE_REPLY_ERROR: &str = "Whoops! There was an error while talking to OpenAI. See logs for details.";

/// Reply failure in the text flow, followed by the JSON diagnostic
pub const TEXT_REPLY_ERROR_PREFIX: &str = "Whoops! There was an error while talking to OpenAI. Error: ";

pub const SYNTHESIS_ERROR: &str =
    "Whoops! There was an error while synthesizing the response. See logs for details.";

/// Shown in place of a diagnostic the backend did not provide
const NO_DIAGNOSTIC: &str = "Unable to extract error";

/// Text-flow error reply carrying the backend diagnostic as JSON
#[must_use]
pub fn text_reply_error(diagnostic: Option<&serde_json::Value>) -> String {
    let detail = diagnostic.map_or_else(
        || serde_json::Value::String(NO_DIAGNOSTIC.to_string()).to_string(),
        serde_json::Value::to_string,
    );
    format!("{TEXT_REPLY_ERROR_PREFIX}{detail}")
}

/// Per-message pipeline over the transport and the four backends
pub struct Orchestrator {
    channel: Arc<dyn Channel>,
    fetcher: Arc<dyn AudioSource>,
    transcriber: Arc<dyn Transcriber>,
    engine: Arc<dyn ReplyEngine>,
    synthesizer: Arc<dyn Synthesizer>,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        channel: Arc<dyn Channel>,
        fetcher: Arc<dyn AudioSource>,
        transcriber: Arc<dyn Transcriber>,
        engine: Arc<dyn ReplyEngine>,
        synthesizer: Arc<dyn Synthesizer>,
    ) -> Self {
        Self {
            channel,
            fetcher,
            transcriber,
            engine,
            synthesizer,
        }
    }

    /// Process one message to completion
    ///
    /// Never fails: every stage error becomes a reply to the user and a
    /// terminal [`FlowOutcome`].
    pub async fn handle(&self, msg: &IncomingMessage) -> FlowOutcome {
        let chat_id = msg.chat_id.as_str();

        let outcome = match &msg.kind {
            MessageKind::Voice { handle, mime_hint } => {
                tracing::info!(chat_id, sender = %msg.sender_name, handle = %handle, "voice message received");
                self.voice_flow(chat_id, handle, mime_hint.as_deref()).await
            }
            MessageKind::Text { body } => {
                tracing::info!(chat_id, sender = %msg.sender_name, "text message received");
                self.text_flow(chat_id, body).await
            }
            MessageKind::Command(command) => {
                tracing::info!(chat_id, command = ?command, "command received");
                self.command_flow(chat_id, *command).await
            }
            MessageKind::Unsupported => {
                tracing::info!(chat_id, "unsupported message received");
                self.send(chat_id, TEXT_PROMPT).await;
                FlowOutcome::Prompted
            }
        };

        match outcome.failed_stage() {
            Some(stage) => tracing::warn!(chat_id, message_id = %msg.id, %stage, ?outcome, "flow ended early"),
            None => tracing::debug!(chat_id, message_id = %msg.id, ?outcome, "flow finished"),
        }
        outcome
    }

    async fn voice_flow(&self, chat_id: &str, handle: &str, mime_hint: Option<&str>) -> FlowOutcome {
        self.typing(chat_id).await;

        // Dropped when this function returns, removing the file
        let audio = match self.fetcher.fetch(handle, mime_hint).await {
            Ok(audio) => audio,
            Err(e) => {
                tracing::error!(chat_id, stage = %Stage::Downloading, error = %e, "voice download failed");
                self.send(chat_id, FETCH_ERROR).await;
                return FlowOutcome::Failed { stage: Stage::Downloading };
            }
        };

        let transcription = match self.transcriber.transcribe(audio.path()).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(chat_id, stage = %Stage::Transcribing, error = %e, "transcription failed");
                self.send(chat_id, TRANSCRIPTION_ERROR).await;
                return FlowOutcome::Failed { stage: Stage::Transcribing };
            }
        };

        self.send(chat_id, &format!("{TRANSCRIPTION_PREFIX}{transcription}")).await;
        self.typing(chat_id).await;

        let answer = match self.engine.respond(chat_id, &transcription).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::error!(
                    chat_id,
                    stage = %Stage::Replying,
                    error = %e,
                    diagnostic = ?e.diagnostic(),
                    "reply failed"
                );
                self.send(chat_id, VOICE_REPLY_ERROR).await;
                return FlowOutcome::AbortedAfterPartialSuccess { stage: Stage::Replying };
            }
        };

        self.send(chat_id, &answer).await;

        let speech = match self.synthesizer.synthesize(&answer).await {
            Ok(speech) => speech,
            Err(e) => {
                tracing::error!(chat_id, stage = %Stage::Synthesizing, error = %e, "speech synthesis failed");
                self.send(chat_id, SYNTHESIS_ERROR).await;
                return FlowOutcome::AbortedAfterPartialSuccess { stage: Stage::Synthesizing };
            }
        };

        self.typing(chat_id).await;
        self.send_voice(chat_id, speech.path(), &speech.file_name()).await;
        FlowOutcome::Done
    }

    async fn text_flow(&self, chat_id: &str, body: &str) -> FlowOutcome {
        if body.trim().is_empty() {
            self.send(chat_id, TEXT_PROMPT).await;
            return FlowOutcome::Prompted;
        }

        self.typing(chat_id).await;

        match self.engine.respond(chat_id, body).await {
            Ok(answer) => {
                self.send(chat_id, &answer).await;
                FlowOutcome::Done
            }
            Err(e) => {
                let diagnostic = e.diagnostic();
                tracing::error!(chat_id, stage = %Stage::Replying, error = %e, ?diagnostic, "reply failed");
                self.send(chat_id, &text_reply_error(diagnostic)).await;
                FlowOutcome::Failed { stage: Stage::Replying }
            }
        }
    }

    async fn command_flow(&self, chat_id: &str, command: BotCommandKind) -> FlowOutcome {
        let text = match command {
            BotCommandKind::Start => GREETING,
            BotCommandKind::Help => HELP_TEXT,
        };
        self.send(chat_id, text).await;
        FlowOutcome::Done
    }

    async fn send(&self, chat_id: &str, text: &str) {
        if let Err(e) = self.channel.send_text(chat_id, text).await {
            tracing::warn!(chat_id, channel = self.channel.name(), error = %e, "failed to send reply");
        }
    }

    async fn send_voice(&self, chat_id: &str, path: &Path, display_name: &str) {
        if let Err(e) = self.channel.send_voice_file(chat_id, path, display_name).await {
            tracing::warn!(chat_id, channel = self.channel.name(), error = %e, "failed to send voice reply");
        }
    }

    async fn typing(&self, chat_id: &str) {
        if let Err(e) = self.channel.send_typing(chat_id).await {
            tracing::debug!(chat_id, error = %e, "failed to send typing indicator");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_error_embeds_diagnostic_json() {
        let diagnostic = serde_json::json!({"message": "quota", "code": "insufficient_quota"});
        let reply = text_reply_error(Some(&diagnostic));
        let json = reply.strip_prefix(TEXT_REPLY_ERROR_PREFIX).unwrap();
        assert_eq!(serde_json::from_str::<serde_json::Value>(json).unwrap(), diagnostic);
    }

    #[test]
    fn text_error_without_diagnostic() {
        assert_eq!(
            text_reply_error(None),
            format!("{TEXT_REPLY_ERROR_PREFIX}\"Unable to extract error\"")
        );
    }
}
