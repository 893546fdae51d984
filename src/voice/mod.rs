//! Voice processing module
//!
//! Downloading voice notes, speech-to-text and text-to-speech. Each stage is
//! exposed as a trait so the orchestrator can be driven by any backend.

mod fetch;
mod stt;
mod tts;

use std::path::Path;

use async_trait::async_trait;

pub use fetch::{AudioFetcher, extension_for_mime};
pub use stt::SpeechToText;
pub use tts::TextToSpeech;

use crate::Result;
use crate::artifact::Artifact;

/// Retrieves a voice file referenced by a transport handle
#[async_trait]
pub trait AudioSource: Send + Sync {
    /// Download `handle` into the work directory
    async fn fetch(&self, handle: &str, mime_hint: Option<&str>) -> Result<Artifact>;
}

/// Turns a local audio file into text
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe the audio file at `path`
    async fn transcribe(&self, path: &Path) -> Result<String>;
}

/// Turns text into a local audio file
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize `text` into a file in the work directory
    async fn synthesize(&self, text: &str) -> Result<Artifact>;
}
