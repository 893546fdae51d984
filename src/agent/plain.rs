//! Single-pass reply engine

use async_trait::async_trait;

use super::llm::{ChatClient, ChatMessage};
use super::{ReplyEngine, answer_text};
use crate::Result;

/// Sends the system prompt and user text, returns the answer. No memory, no tools.
pub struct PlainEngine {
    client: ChatClient,
    system_prompt: String,
}

impl PlainEngine {
    #[must_use]
    pub const fn new(client: ChatClient, system_prompt: String) -> Self {
        Self { client, system_prompt }
    }
}

#[async_trait]
impl ReplyEngine for PlainEngine {
    async fn respond(&self, conversation_key: &str, text: &str) -> Result<String> {
        let messages = [ChatMessage::system(&self.system_prompt), ChatMessage::user(text)];
        let reply = self.client.complete(&messages, None).await?;
        tracing::debug!(conversation = conversation_key, "plain reply received");
        Ok(answer_text(reply.content))
    }
}
