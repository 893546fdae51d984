//! Function tools offered to the reply backend

mod clock;
mod web;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

pub use clock::ClockTool;
pub use web::{SearchProvider, SearchResult, WebSearchTool, format_results};

use crate::config::SearchConfig;
use crate::{Error, Result};

/// A capability the model may call mid-reasoning
#[async_trait]
pub trait Tool: Send + Sync {
    /// Function name exposed to the model
    fn name(&self) -> &'static str;

    /// One-line description exposed to the model
    fn description(&self) -> &'static str;

    /// JSON schema of the arguments object
    fn parameters(&self) -> serde_json::Value;

    /// Run the tool with the raw JSON arguments produced by the model
    async fn execute(&self, arguments: &str) -> Result<String>;
}

/// Function declaration sent alongside a chat request
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Set of tools available to the tool-augmented engine
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the clock and, when configured, web search
    #[must_use]
    pub fn from_config(search: Option<&SearchConfig>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ClockTool));
        match search {
            Some(search) => registry.register(Arc::new(WebSearchTool::from_config(search))),
            None => tracing::info!("no search API key configured, web_search tool disabled"),
        }
        registry
    }

    /// Add a tool, replacing any tool with the same name
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.retain(|t| t.name() != tool.name());
        self.tools.push(tool);
    }

    /// Whether no tools are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Names of the registered tools
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Function declarations for every registered tool
    #[must_use]
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools
            .iter()
            .map(|t| ToolSpec {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters(),
            })
            .collect()
    }

    /// Execute a tool by name
    ///
    /// # Errors
    ///
    /// Returns `Error::Tool` for unknown tools, and whatever the tool returns
    pub async fn execute(&self, name: &str, arguments: &str) -> Result<String> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| Error::Tool(format!("unknown tool: {name}")))?;

        tracing::debug!(tool = name, "executing tool");
        tool.execute(arguments).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn description(&self) -> &'static str {
            "Echo the arguments"
        }

        fn parameters(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {}})
        }

        async fn execute(&self, arguments: &str) -> Result<String> {
            Ok(arguments.to_string())
        }
    }

    #[tokio::test]
    async fn executes_registered_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));

        assert_eq!(registry.execute("echo", "{}").await.unwrap(), "{}");
    }

    #[tokio::test]
    async fn unknown_tool_is_tool_error() {
        let registry = ToolRegistry::new();
        let err = registry.execute("nope", "{}").await.unwrap_err();
        assert!(matches!(err, Error::Tool(msg) if msg.contains("nope")));
    }

    #[test]
    fn register_replaces_same_name() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        registry.register(Arc::new(EchoTool));
        assert_eq!(registry.names(), vec!["echo"]);
        assert_eq!(registry.specs()[0].description, "Echo the arguments");
    }

    #[test]
    fn default_registry_has_clock_only_without_search() {
        let registry = ToolRegistry::from_config(None);
        assert_eq!(registry.names(), vec!["current_time"]);
    }
}
