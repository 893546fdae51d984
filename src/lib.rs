//! Voice Relay - conversational relay between Telegram and a language model
//!
//! This library provides the core functionality for the relay:
//! - Telegram transport (long polling, replies, voice uploads)
//! - Voice processing (download, STT, TTS)
//! - Reply engines with optional tools and per-chat memory
//! - The per-message orchestration pipeline
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 Telegram (Bot API)                   │
//! └────────────────────┬────────────────────────────────┘
//!                      │ IncomingMessage
//! ┌────────────────────▼────────────────────────────────┐
//! │              Daemon → Orchestrator                   │
//! │   Fetch  │  STT  │  Reply Engine  │  TTS            │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                    Backends                          │
//! │  Whisper/Deepgram │ Chat completions │ TTS │ Search │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod agent;
pub mod artifact;
pub mod channels;
pub mod config;
pub mod daemon;
pub mod error;
pub mod health;
pub mod pipeline;
pub mod tools;
pub mod voice;

pub use config::Config;
pub use daemon::Daemon;
pub use error::{Error, Result};
pub use pipeline::{FlowOutcome, Orchestrator, Stage};
