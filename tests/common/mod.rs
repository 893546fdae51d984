//! Shared test utilities
//!
//! Scripted stand-ins for the transport and the four pipeline backends.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use voice_relay::agent::ReplyEngine;
use voice_relay::artifact::Artifact;
use voice_relay::channels::{BotCommandKind, Channel, IncomingMessage, MessageKind};
use voice_relay::voice::{AudioSource, Synthesizer, Transcriber};
use voice_relay::{Error, Orchestrator, Result};

/// Something the relay sent to a chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text(String),
    Voice(PathBuf),
}

/// Records everything sent through it
#[derive(Default)]
pub struct MockChannel {
    sent: Mutex<Vec<(String, Sent)>>,
    typing: AtomicUsize,
    pub fail_sends: bool,
}

impl MockChannel {
    /// Channel whose sends all fail after being recorded
    pub fn failing() -> Self {
        Self {
            fail_sends: true,
            ..Self::default()
        }
    }

    /// Replies in send order, without chat ids
    pub async fn replies(&self) -> Vec<Sent> {
        self.sent.lock().await.iter().map(|(_, s)| s.clone()).collect()
    }

    /// Replies sent to `chat_id`
    pub async fn replies_to(&self, chat_id: &str) -> Vec<Sent> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|(c, _)| c == chat_id)
            .map(|(_, s)| s.clone())
            .collect()
    }

    pub fn typing_count(&self) -> usize {
        self.typing.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Channel for MockChannel {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    async fn send_text(&self, chat_id: &str, text: &str) -> Result<()> {
        self.sent.lock().await.push((chat_id.to_string(), Sent::Text(text.to_string())));
        if self.fail_sends {
            return Err(Error::Channel("send rejected".to_string()));
        }
        Ok(())
    }

    async fn send_voice_file(&self, chat_id: &str, path: &Path, _display_name: &str) -> Result<()> {
        self.sent.lock().await.push((chat_id.to_string(), Sent::Voice(path.to_path_buf())));
        if self.fail_sends {
            return Err(Error::Channel("send rejected".to_string()));
        }
        Ok(())
    }

    async fn send_typing(&self, _chat_id: &str) -> Result<()> {
        self.typing.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn file_url(&self, handle: &str) -> Result<String> {
        Ok(format!("mock://{handle}"))
    }
}

/// Scripted audio artifact producer
///
/// With `create_file` the file is written and owned by a scoped artifact,
/// otherwise the path is returned as-is and never touched.
pub struct ScriptedFile {
    pub path: Option<PathBuf>,
    pub create_file: bool,
    pub calls: AtomicUsize,
}

impl ScriptedFile {
    pub fn ok(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            create_file: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self {
            create_file: true,
            ..Self::ok(path)
        }
    }

    pub fn failing() -> Self {
        Self {
            path: None,
            create_file: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn produce(&self) -> Option<Artifact> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let path = self.path.clone()?;
        if self.create_file {
            std::fs::write(&path, b"audio").unwrap();
            Some(Artifact::scoped(path))
        } else {
            Some(Artifact::retained(path))
        }
    }
}

#[async_trait]
impl AudioSource for ScriptedFile {
    async fn fetch(&self, handle: &str, _mime_hint: Option<&str>) -> Result<Artifact> {
        self.produce()
            .ok_or_else(|| Error::Fetch(format!("no such file: {handle}")))
    }
}

#[async_trait]
impl Synthesizer for ScriptedFile {
    async fn synthesize(&self, _text: &str) -> Result<Artifact> {
        self.produce()
            .ok_or_else(|| Error::Tts("quota exceeded".to_string()))
    }
}

/// Scripted transcriber; records the paths it was given
pub struct ScriptedTranscriber {
    pub text: Option<String>,
    pub inputs: Mutex<Vec<PathBuf>>,
}

impl ScriptedTranscriber {
    pub fn ok(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            text: None,
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub async fn calls(&self) -> usize {
        self.inputs.lock().await.len()
    }
}

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn transcribe(&self, path: &Path) -> Result<String> {
        self.inputs.lock().await.push(path.to_path_buf());
        self.text
            .clone()
            .ok_or_else(|| Error::Stt("Whisper API error 400: bad audio".to_string()))
    }
}

/// Scripted reply engine; records (conversation key, text) pairs
pub struct ScriptedEngine {
    pub answer: Option<String>,
    pub diagnostic: Option<serde_json::Value>,
    pub inputs: Mutex<Vec<(String, String)>>,
    /// Channel whose replies are snapshotted when `respond` starts
    pub watched: Option<Arc<MockChannel>>,
    pub replies_at_call: Mutex<Vec<Vec<Sent>>>,
}

impl ScriptedEngine {
    pub fn ok(answer: &str) -> Self {
        Self {
            answer: Some(answer.to_string()),
            diagnostic: None,
            inputs: Mutex::new(Vec::new()),
            watched: None,
            replies_at_call: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(diagnostic: Option<serde_json::Value>) -> Self {
        Self {
            answer: None,
            diagnostic,
            inputs: Mutex::new(Vec::new()),
            watched: None,
            replies_at_call: Mutex::new(Vec::new()),
        }
    }

    /// Record what `channel` had already sent each time the engine is asked
    pub fn watching(mut self, channel: &Arc<MockChannel>) -> Self {
        self.watched = Some(Arc::clone(channel));
        self
    }

    pub async fn calls(&self) -> usize {
        self.inputs.lock().await.len()
    }
}

#[async_trait]
impl ReplyEngine for ScriptedEngine {
    async fn respond(&self, conversation_key: &str, text: &str) -> Result<String> {
        if let Some(channel) = &self.watched {
            let replies = channel.replies().await;
            self.replies_at_call.lock().await.push(replies);
        }
        self.inputs
            .lock()
            .await
            .push((conversation_key.to_string(), text.to_string()));
        self.answer.clone().ok_or_else(|| Error::Reply {
            message: "backend returned 429 Too Many Requests".to_string(),
            diagnostic: self.diagnostic.clone(),
        })
    }
}

/// All collaborators of one orchestrator
pub struct Fixture {
    pub channel: Arc<MockChannel>,
    pub fetcher: Arc<ScriptedFile>,
    pub transcriber: Arc<ScriptedTranscriber>,
    pub engine: Arc<ScriptedEngine>,
    pub synthesizer: Arc<ScriptedFile>,
}

impl Default for Fixture {
    /// The happy-path voice scenario
    fn default() -> Self {
        Self {
            channel: Arc::new(MockChannel::default()),
            fetcher: Arc::new(ScriptedFile::ok("/tmp/abc123.ogg")),
            transcriber: Arc::new(ScriptedTranscriber::ok("What's the weather")),
            engine: Arc::new(ScriptedEngine::ok("I don't have real-time data.")),
            synthesizer: Arc::new(ScriptedFile::ok("/tmp/out1.mp3")),
        }
    }
}

impl Fixture {
    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(
            Arc::clone(&self.channel) as Arc<dyn Channel>,
            Arc::clone(&self.fetcher) as Arc<dyn AudioSource>,
            Arc::clone(&self.transcriber) as Arc<dyn Transcriber>,
            Arc::clone(&self.engine) as Arc<dyn ReplyEngine>,
            Arc::clone(&self.synthesizer) as Arc<dyn Synthesizer>,
        )
    }
}

fn message(chat_id: &str, kind: MessageKind) -> IncomingMessage {
    IncomingMessage {
        id: "1".to_string(),
        chat_id: chat_id.to_string(),
        sender_id: "7".to_string(),
        sender_name: "Ada".to_string(),
        kind,
    }
}

pub fn voice(chat_id: &str, handle: &str) -> IncomingMessage {
    message(
        chat_id,
        MessageKind::Voice {
            handle: handle.to_string(),
            mime_hint: Some("audio/ogg".to_string()),
        },
    )
}

pub fn text(chat_id: &str, body: &str) -> IncomingMessage {
    message(chat_id, MessageKind::Text { body: body.to_string() })
}

pub fn command(chat_id: &str, command: BotCommandKind) -> IncomingMessage {
    message(chat_id, MessageKind::Command(command))
}

pub fn unsupported(chat_id: &str) -> IncomingMessage {
    message(chat_id, MessageKind::Unsupported)
}
