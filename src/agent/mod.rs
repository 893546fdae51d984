//! Reply engines
//!
//! A [`ReplyEngine`] turns user text into an answer. [`PlainEngine`] makes a
//! single completion call; [`ToolEngine`] keeps per-chat memory and lets the
//! model call tools before answering.

mod augmented;
pub mod llm;
pub mod memory;
mod plain;

use std::sync::Arc;

use async_trait::async_trait;

pub use augmented::ToolEngine;
pub use llm::ChatClient;
pub use memory::{Conversation, ConversationStore, Turn};
pub use plain::PlainEngine;

use crate::Result;
use crate::config::{EngineMode, LlmConfig};
use crate::tools::ToolRegistry;

/// Answer substituted when the backend returns no content
pub const NO_RESPONSE: &str = "(no response)";

/// Produces an answer for user text
#[async_trait]
pub trait ReplyEngine: Send + Sync {
    /// Answer `text` within the conversation identified by `conversation_key`
    async fn respond(&self, conversation_key: &str, text: &str) -> Result<String>;
}

/// Final answer text, with missing or empty content replaced by [`NO_RESPONSE`]
#[must_use]
pub fn answer_text(content: Option<String>) -> String {
    content
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| NO_RESPONSE.to_string())
}

/// Build the engine selected by `config.engine`
///
/// # Errors
///
/// Returns error if the backend client cannot be configured
pub fn build_engine(config: &LlmConfig, tools: ToolRegistry) -> Result<Arc<dyn ReplyEngine>> {
    let client = ChatClient::from_config(config)?;
    tracing::info!(model = client.model(), engine = ?config.engine, "reply engine ready");

    Ok(match config.engine {
        EngineMode::Plain => Arc::new(PlainEngine::new(client, config.system_prompt.clone())),
        EngineMode::Tools => Arc::new(ToolEngine::new(
            client,
            tools,
            ConversationStore::new(config.max_conversations, config.history_turns),
            config.system_prompt.clone(),
            config.max_tool_rounds,
        )),
    })
}
