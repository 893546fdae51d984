//! Configuration management for the voice relay
//!
//! Values are resolved with the precedence env > TOML file > default.

pub mod file;

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::{Error, Result};

pub use file::{RelayConfigFile, config_file_path, load_config_file};

/// Default system prompt for the reply engine
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant chatting with a user \
through a messenger. Your answers may be read aloud, so keep them short and conversational. \
Use the available tools when a question needs current information.";

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEEPGRAM_BASE_URL: &str = "https://api.deepgram.com/v1";
const ELEVENLABS_BASE_URL: &str = "https://api.elevenlabs.io/v1";
const PLAYHT_BASE_URL: &str = "https://play.ht/api/v1";
const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Voice relay configuration
#[derive(Debug)]
pub struct Config {
    /// Directory for downloaded and synthesized audio
    pub work_dir: PathBuf,

    /// Keep audio files on disk after a flow finishes
    pub keep_artifacts: bool,

    /// URL pinged once after the transport starts listening
    pub healthcheck_url: Option<String>,

    /// How long shutdown waits for in-flight messages
    pub shutdown_grace: Duration,

    /// Telegram transport configuration
    pub telegram: TelegramConfig,

    /// Reply backend configuration
    pub llm: LlmConfig,

    /// Speech-to-text configuration
    pub stt: SttConfig,

    /// Text-to-speech configuration
    pub tts: TtsConfig,

    /// Web search tool (disabled when no key is configured)
    pub search: Option<SearchConfig>,
}

/// Telegram transport configuration
#[derive(Debug)]
pub struct TelegramConfig {
    /// Bot token
    pub token: SecretString,

    /// Bot API base URL (without the `/bot<token>` suffix)
    pub api_base: String,

    /// Pause between `getUpdates` calls
    pub poll_interval: Duration,
}

/// Reply engine variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineMode {
    /// Single forward pass, no memory, no tools
    Plain,
    /// Per-chat memory and function-calling tools
    Tools,
}

impl FromStr for EngineMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "plain" => Ok(Self::Plain),
            "tools" | "agent" => Ok(Self::Tools),
            other => Err(Error::Config(format!("unknown reply engine: {other}"))),
        }
    }
}

/// Reply backend configuration
#[derive(Debug)]
pub struct LlmConfig {
    /// API key for the chat completions endpoint
    pub api_key: SecretString,

    /// OpenAI-compatible base URL (e.g. `https://api.openai.com/v1`)
    pub base_url: String,

    /// Model identifier
    pub model: String,

    /// Engine variant
    pub engine: EngineMode,

    /// Sampling temperature
    pub temperature: f32,

    /// Max tokens per completion
    pub max_tokens: u32,

    /// Tool rounds allowed before a direct answer is forced
    pub max_tool_rounds: usize,

    /// Turns kept per conversation
    pub history_turns: usize,

    /// Conversations kept in memory before the least recently used is dropped
    pub max_conversations: usize,

    /// System prompt prepended to every request
    pub system_prompt: String,
}

/// Speech-to-text provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SttProvider {
    Whisper,
    Deepgram,
}

impl FromStr for SttProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "whisper" | "openai" => Ok(Self::Whisper),
            "deepgram" => Ok(Self::Deepgram),
            other => Err(Error::Config(format!("unknown STT provider: {other}"))),
        }
    }
}

/// Speech-to-text configuration
#[derive(Debug)]
pub struct SttConfig {
    pub provider: SttProvider,

    /// Fixed model selection (e.g. "whisper-1", "nova-2")
    pub model: String,

    pub api_key: SecretString,
    pub base_url: String,
}

/// Text-to-speech provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtsProvider {
    OpenAi,
    ElevenLabs,
    PlayHt,
}

impl FromStr for TtsProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "elevenlabs" => Ok(Self::ElevenLabs),
            "playht" | "play.ht" => Ok(Self::PlayHt),
            other => Err(Error::Config(format!("unknown TTS provider: {other}"))),
        }
    }
}

/// Text-to-speech configuration
#[derive(Debug)]
pub struct TtsConfig {
    pub provider: TtsProvider,

    /// Model (OpenAI, ElevenLabs); unused by Play.ht
    pub model: String,

    /// Voice identifier (OpenAI voice name, ElevenLabs voice id, Play.ht voice)
    pub voice: String,

    /// Speed multiplier (OpenAI only)
    pub speed: f32,

    pub api_key: SecretString,

    /// Play.ht user id
    pub user_id: Option<String>,

    pub base_url: String,

    /// Pause between Play.ht status polls
    pub poll_interval: Duration,

    /// Status polls before a Play.ht job is considered failed
    pub max_polls: u32,
}

/// Web search provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchProviderKind {
    SerpApi,
    Brave,
    Serper,
}

impl FromStr for SearchProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "serpapi" => Ok(Self::SerpApi),
            "brave" => Ok(Self::Brave),
            "serper" => Ok(Self::Serper),
            other => Err(Error::Config(format!("unknown search provider: {other}"))),
        }
    }
}

impl SearchProviderKind {
    /// Environment variable holding this provider's API key
    #[must_use]
    pub const fn key_env(self) -> &'static str {
        match self {
            Self::SerpApi => "SERPAPI_API_KEY",
            Self::Brave => "BRAVE_API_KEY",
            Self::Serper => "SERPER_API_KEY",
        }
    }
}

/// Web search configuration
#[derive(Debug)]
pub struct SearchConfig {
    pub provider: SearchProviderKind,
    pub api_key: SecretString,

    /// Endpoint override (tests, proxies)
    pub base_url: Option<String>,
}

/// Default work directory (`~/.cache/voice-relay/work` on Linux)
fn default_work_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from("./tmp"),
        |d| d.cache_dir().join("voice-relay").join("work"),
    )
}

fn parse_bool(value: &str) -> bool {
    !matches!(value.trim().to_lowercase().as_str(), "false" | "0" | "no" | "off" | "")
}

fn secret(value: String) -> SecretString {
    SecretString::from(value)
}

impl Config {
    /// Load configuration from the environment and the TOML file
    ///
    /// # Errors
    ///
    /// Returns error if a required value is missing or invalid
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let fc = load_config_file(config_path);
        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Build configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if a required value is missing or invalid
    #[allow(clippy::too_many_lines)]
    pub fn from_sources(fc: RelayConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let work_dir = env("VOICE_RELAY_WORK_DIR")
            .or(fc.work_dir)
            .map_or_else(default_work_dir, PathBuf::from);

        let keep_artifacts = env("VOICE_RELAY_KEEP_ARTIFACTS")
            .map(|v| parse_bool(&v))
            .or(fc.keep_artifacts)
            .unwrap_or(false);

        let healthcheck_url = env("VOICE_RELAY_HEALTHCHECK_URL").or(fc.healthcheck_url);

        let shutdown_grace = Duration::from_secs(fc.shutdown_grace_secs.unwrap_or(10));

        // Telegram (env > toml)
        let token = env("TELEGRAM_TOKEN")
            .or_else(|| env("TELEGRAM_BOT_TOKEN"))
            .or(fc.telegram.token)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Config("TELEGRAM_TOKEN is required".to_string()))?;

        let telegram = TelegramConfig {
            token: secret(token),
            api_base: env("TELEGRAM_API_BASE")
                .or(fc.telegram.api_base)
                .unwrap_or_else(|| TELEGRAM_API_BASE.to_string()),
            poll_interval: Duration::from_millis(fc.telegram.poll_interval_ms.unwrap_or(500)),
        };

        // Reply backend
        let llm_key = env("OPENAI_API_KEY")
            .or(fc.llm.api_key)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::Config("OPENAI_API_KEY is required".to_string()))?;

        let engine = env("VOICE_RELAY_ENGINE")
            .or(fc.llm.engine)
            .map_or(Ok(EngineMode::Tools), |s| s.parse())?;

        let llm = LlmConfig {
            api_key: secret(llm_key.clone()),
            base_url: env("OPENAI_BASE_URL")
                .or(fc.llm.base_url)
                .unwrap_or_else(|| OPENAI_BASE_URL.to_string()),
            model: env("VOICE_RELAY_LLM_MODEL")
                .or(fc.llm.model)
                .unwrap_or_else(|| "gpt-3.5-turbo".to_string()),
            engine,
            temperature: fc.llm.temperature.unwrap_or(0.0),
            max_tokens: fc.llm.max_tokens.unwrap_or(1024),
            max_tool_rounds: fc.llm.max_tool_rounds.unwrap_or(4),
            history_turns: fc.llm.history_turns.unwrap_or(20),
            max_conversations: fc.llm.max_conversations.unwrap_or(1000).max(1),
            system_prompt: fc
                .llm
                .system_prompt
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
        };

        // Speech-to-text
        let stt_provider = env("VOICE_RELAY_STT_PROVIDER")
            .or(fc.stt.provider)
            .map_or(Ok(SttProvider::Whisper), |s| s.parse())?;

        let stt = match stt_provider {
            SttProvider::Whisper => SttConfig {
                provider: stt_provider,
                model: env("VOICE_RELAY_STT_MODEL")
                    .or(fc.stt.model)
                    .unwrap_or_else(|| "whisper-1".to_string()),
                api_key: secret(fc.stt.api_key.unwrap_or_else(|| llm_key.clone())),
                // OpenAI-compatible proxies serve transcription too
                base_url: fc.stt.base_url.unwrap_or_else(|| llm.base_url.clone()),
            },
            SttProvider::Deepgram => SttConfig {
                provider: stt_provider,
                model: env("VOICE_RELAY_STT_MODEL")
                    .or(fc.stt.model)
                    .unwrap_or_else(|| "nova-2".to_string()),
                api_key: secret(
                    env("DEEPGRAM_API_KEY")
                        .or(fc.stt.api_key)
                        .ok_or_else(|| {
                            Error::Config("DEEPGRAM_API_KEY is required for Deepgram".to_string())
                        })?,
                ),
                base_url: fc.stt.base_url.unwrap_or_else(|| DEEPGRAM_BASE_URL.to_string()),
            },
        };

        // Text-to-speech
        let tts_provider = env("VOICE_RELAY_TTS_PROVIDER")
            .or(fc.tts.provider)
            .map_or(Ok(TtsProvider::OpenAi), |s| s.parse())?;

        let (tts_key, default_model, default_voice, default_base) = match tts_provider {
            TtsProvider::OpenAi => (
                fc.tts.api_key.unwrap_or_else(|| llm_key.clone()),
                "tts-1",
                "alloy",
                llm.base_url.as_str(),
            ),
            TtsProvider::ElevenLabs => (
                env("ELEVENLABS_API_KEY").or(fc.tts.api_key).ok_or_else(|| {
                    Error::Config("ELEVENLABS_API_KEY is required for ElevenLabs".to_string())
                })?,
                "eleven_monolingual_v1",
                "21m00Tcm4TlvDq8ikWAM",
                ELEVENLABS_BASE_URL,
            ),
            TtsProvider::PlayHt => (
                env("PLAYHT_SECRET_KEY").or(fc.tts.api_key).ok_or_else(|| {
                    Error::Config("PLAYHT_SECRET_KEY is required for Play.ht".to_string())
                })?,
                "",
                "en-US-JennyNeural",
                PLAYHT_BASE_URL,
            ),
        };

        let tts_user_id = env("PLAYHT_USER_ID").or(fc.tts.user_id);
        if tts_provider == TtsProvider::PlayHt && tts_user_id.is_none() {
            return Err(Error::Config(
                "PLAYHT_USER_ID is required for Play.ht".to_string(),
            ));
        }

        let tts = TtsConfig {
            provider: tts_provider,
            model: fc.tts.model.unwrap_or_else(|| default_model.to_string()),
            voice: fc.tts.voice.unwrap_or_else(|| default_voice.to_string()),
            speed: fc.tts.speed.unwrap_or(1.0),
            api_key: secret(tts_key),
            user_id: tts_user_id,
            base_url: fc.tts.base_url.unwrap_or_else(|| default_base.to_string()),
            poll_interval: Duration::from_millis(fc.tts.poll_interval_ms.unwrap_or(1000)),
            max_polls: fc.tts.max_polls.unwrap_or(30),
        };

        // Web search (optional)
        let search_provider = env("VOICE_RELAY_SEARCH_PROVIDER")
            .or(fc.search.provider)
            .map_or(Ok(SearchProviderKind::SerpApi), |s| s.parse())?;
        let search = env(search_provider.key_env())
            .or(fc.search.api_key)
            .filter(|k| !k.is_empty())
            .map(|key| SearchConfig {
                provider: search_provider,
                api_key: secret(key),
                base_url: fc.search.base_url,
            });

        Ok(Self {
            work_dir,
            keep_artifacts,
            healthcheck_url,
            shutdown_grace,
            telegram,
            llm,
            stt,
            tts,
            search,
        })
    }
}
