//! Tool-augmented reply engine with per-chat memory

use async_trait::async_trait;

use super::llm::{ChatClient, ChatMessage};
use super::memory::{ConversationStore, Turn};
use super::{ReplyEngine, answer_text};
use crate::Result;
use crate::tools::ToolRegistry;

/// Extract a short display label from tool arguments JSON
/// Tries common field names; falls back to truncated raw args
fn summarize_invocation(name: &str, args: &str) -> String {
    let Ok(v) = serde_json::from_str::<serde_json::Value>(args) else {
        return args.chars().take(60).collect();
    };
    for field in &["query", "url"] {
        if let Some(s) = v.get(field).and_then(|v| v.as_str()) {
            let truncated: String = s.chars().take(60).collect();
            return format!("{name}: {truncated}");
        }
    }
    args.chars().take(60).collect()
}

/// Reply engine that remembers each chat and may call tools before answering
pub struct ToolEngine {
    client: ChatClient,
    tools: ToolRegistry,
    store: ConversationStore,
    system_prompt: String,
    max_tool_rounds: usize,
}

impl ToolEngine {
    #[must_use]
    pub const fn new(
        client: ChatClient,
        tools: ToolRegistry,
        store: ConversationStore,
        system_prompt: String,
        max_tool_rounds: usize,
    ) -> Self {
        Self {
            client,
            tools,
            store,
            system_prompt,
            max_tool_rounds,
        }
    }

    /// Conversation store backing this engine
    #[must_use]
    pub const fn store(&self) -> &ConversationStore {
        &self.store
    }
}

#[async_trait]
impl ReplyEngine for ToolEngine {
    /// Run the tool loop until the model answers
    ///
    /// Tools are offered for at most `max_tool_rounds` rounds; the request
    /// after that goes out without tools. History is only updated on success.
    async fn respond(&self, conversation_key: &str, text: &str) -> Result<String> {
        let conversation = self.store.conversation(conversation_key).await;
        // Held for the whole call: one chat, one request at a time
        let mut conversation = conversation.lock().await;

        let mut messages = Vec::with_capacity(conversation.len() * 2 + 2);
        messages.push(ChatMessage::system(&self.system_prompt));
        messages.extend(conversation.to_messages());
        messages.push(ChatMessage::user(text));

        let specs = self.tools.specs();
        let mut rounds = 0;

        loop {
            let offered = (rounds < self.max_tool_rounds && !specs.is_empty()).then_some(specs.as_slice());
            let reply = self.client.complete(&messages, offered).await?;

            if offered.is_none() || reply.tool_calls.is_empty() {
                let answer = answer_text(reply.content);
                conversation.push(Turn {
                    user: text.to_string(),
                    assistant: answer.clone(),
                });
                tracing::debug!(
                    conversation = conversation_key,
                    rounds,
                    turns = conversation.len(),
                    "tool engine answered"
                );
                return Ok(answer);
            }

            rounds += 1;
            let calls = reply.tool_calls.clone();
            messages.push(reply);

            for call in &calls {
                let invocation = summarize_invocation(&call.function.name, &call.function.arguments);
                let output = match self.tools.execute(&call.function.name, &call.function.arguments).await {
                    Ok(out) => {
                        tracing::debug!(conversation = conversation_key, tool = %invocation, "tool call succeeded");
                        out
                    }
                    Err(e) => {
                        tracing::warn!(conversation = conversation_key, tool = %invocation, error = %e, "tool call failed");
                        format!("Error: {e}")
                    }
                };
                messages.push(ChatMessage::tool(&call.id, output));
            }
        }
    }
}
