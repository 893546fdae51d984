//! Error types for the voice relay

use thiserror::Error;

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the voice relay
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Chat transport error
    #[error("channel error: {0}")]
    Channel(String),

    /// Downloading a voice file from the transport failed
    #[error("fetch error: {0}")]
    Fetch(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Reply backend error
    ///
    /// `diagnostic` carries the backend's structured error body when one
    /// could be extracted
    #[error("reply error: {message}")]
    Reply {
        message: String,
        diagnostic: Option<serde_json::Value>,
    },

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Tool invocation error
    #[error("tool error: {0}")]
    Tool(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Build a reply error without a diagnostic payload
    pub fn reply(message: impl Into<String>) -> Self {
        Self::Reply {
            message: message.into(),
            diagnostic: None,
        }
    }

    /// Structured backend diagnostic, if this is a reply error that carries one
    #[must_use]
    pub const fn diagnostic(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Reply { diagnostic, .. } => diagnostic.as_ref(),
            _ => None,
        }
    }
}
