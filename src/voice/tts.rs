//! Text-to-speech (TTS) processing

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tempfile::TempPath;

use super::Synthesizer;
use crate::artifact::{Artifact, WorkDir};
use crate::config::{TtsConfig, TtsProvider};
use crate::{Error, Result};

/// Play.ht conversion job, as returned by `/convert`
#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayHtJob {
    transcription_id: String,
}

/// Play.ht job status, as returned by `/articleStatus`
#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayHtStatus {
    #[serde(default)]
    converted: bool,
    #[serde(default)]
    error: bool,
    error_message: Option<String>,
    audio_url: Option<AudioUrl>,
}

/// Play.ht reports either a single URL or one per content chunk
#[derive(serde::Deserialize)]
#[serde(untagged)]
enum AudioUrl {
    One(String),
    Many(Vec<String>),
}

impl AudioUrl {
    fn first(&self) -> Option<&str> {
        match self {
            Self::One(url) => Some(url),
            Self::Many(urls) => urls.first().map(String::as_str),
        }
    }
}

/// Play.ht polling limits
#[derive(Clone, Copy, Debug)]
struct PollSettings {
    interval: Duration,
    max_polls: u32,
}

/// Synthesizes speech from text
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: SecretString,
    voice: String,
    speed: f32,
    model: String,
    base_url: String,
    provider: TtsProvider,
    user_id: Option<String>,
    poll: PollSettings,
    work_dir: WorkDir,
}

impl TextToSpeech {
    /// Create from the loaded configuration
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing, or the Play.ht user id for
    /// that provider
    pub fn from_config(config: &TtsConfig, work_dir: WorkDir) -> Result<Self> {
        if config.api_key.expose_secret().is_empty() {
            let message = match config.provider {
                TtsProvider::OpenAi => "OpenAI API key required for TTS",
                TtsProvider::ElevenLabs => "ElevenLabs API key required for TTS",
                TtsProvider::PlayHt => "Play.ht secret key required for TTS",
            };
            return Err(Error::Config(message.to_string()));
        }

        if config.provider == TtsProvider::PlayHt && config.user_id.as_deref().is_none_or(str::is_empty) {
            return Err(Error::Config("Play.ht user id required for TTS".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            voice: config.voice.clone(),
            speed: config.speed,
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            provider: config.provider,
            user_id: config.user_id.clone(),
            poll: PollSettings {
                interval: config.poll_interval,
                max_polls: config.max_polls,
            },
            work_dir,
        })
    }

    /// Synthesize text to speech
    ///
    /// # Returns
    ///
    /// Audio bytes (MP3 format)
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails
    pub async fn synthesize_bytes(&self, text: &str) -> Result<Vec<u8>> {
        match self.provider {
            TtsProvider::OpenAi => self.synthesize_openai(text).await,
            TtsProvider::ElevenLabs => self.synthesize_elevenlabs(text).await,
            TtsProvider::PlayHt => self.synthesize_playht(text).await,
        }
    }

    /// Synthesize using OpenAI TTS
    async fn synthesize_openai(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f32,
            response_format: &'a str,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            speed: self.speed,
            response_format: "mp3",
        };

        let response = self
            .client
            .post(format!("{}/audio/speech", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Tts(format!("OpenAI TTS request failed: {e}")))?;

        read_audio("OpenAI TTS", response).await
    }

    /// Synthesize using ElevenLabs TTS
    async fn synthesize_elevenlabs(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct ElevenLabsRequest<'a> {
            text: &'a str,
            model_id: &'a str,
        }

        let url = format!("{}/text-to-speech/{}", self.base_url, self.voice);

        let request = ElevenLabsRequest {
            text,
            model_id: &self.model,
        };

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", self.api_key.expose_secret())
            .header("Accept", "audio/mpeg")
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Tts(format!("ElevenLabs request failed: {e}")))?;

        read_audio("ElevenLabs TTS", response).await
    }

    /// Synthesize using Play.ht: start a conversion, poll it, download the result
    async fn synthesize_playht(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct ConvertRequest<'a> {
            content: [&'a str; 1],
            voice: &'a str,
        }

        let user_id = self.user_id.as_deref().unwrap_or_default();

        let response = self
            .client
            .post(format!("{}/convert", self.base_url))
            .header("Authorization", self.api_key.expose_secret())
            .header("X-User-ID", user_id)
            .json(&ConvertRequest {
                content: [text],
                voice: &self.voice,
            })
            .send()
            .await
            .map_err(|e| Error::Tts(format!("Play.ht request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("Play.ht convert error {status}: {body}")));
        }

        let job: PlayHtJob = response
            .json()
            .await
            .map_err(|e| Error::Tts(format!("invalid Play.ht convert response: {e}")))?;
        tracing::debug!(job = %job.transcription_id, "Play.ht conversion started");

        let audio_url = self.poll_playht(&job.transcription_id, user_id).await?;

        let response = self
            .client
            .get(&audio_url)
            .send()
            .await
            .map_err(|e| Error::Tts(format!("Play.ht download failed: {e}")))?;

        read_audio("Play.ht download", response).await
    }

    /// Poll a Play.ht job until it has an audio URL
    async fn poll_playht(&self, job_id: &str, user_id: &str) -> Result<String> {
        let url = format!("{}/articleStatus", self.base_url);

        for attempt in 1..=self.poll.max_polls {
            let response = self
                .client
                .get(&url)
                .query(&[("transcriptionId", job_id)])
                .header("Authorization", self.api_key.expose_secret())
                .header("X-User-ID", user_id)
                .send()
                .await
                .map_err(|e| Error::Tts(format!("Play.ht status request failed: {e}")))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(Error::Tts(format!("Play.ht status error {status}: {body}")));
            }

            let job: PlayHtStatus = response
                .json()
                .await
                .map_err(|e| Error::Tts(format!("invalid Play.ht status response: {e}")))?;

            if job.error {
                let message = job.error_message.unwrap_or_else(|| "conversion failed".to_string());
                return Err(Error::Tts(format!("Play.ht: {message}")));
            }

            if job.converted
                && let Some(audio_url) = job.audio_url.as_ref().and_then(AudioUrl::first)
            {
                tracing::debug!(job = job_id, attempt, "Play.ht conversion finished");
                return Ok(audio_url.to_string());
            }

            tracing::trace!(job = job_id, attempt, "Play.ht conversion pending");
            tokio::time::sleep(self.poll.interval).await;
        }

        Err(Error::Tts(format!(
            "Play.ht job {job_id} not ready after {} polls",
            self.poll.max_polls
        )))
    }
}

/// Read a successful audio response body, or turn an error status into `Error::Tts`
async fn read_audio(what: &str, response: reqwest::Response) -> Result<Vec<u8>> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Tts(format!("{what} error {status}: {body}")));
    }

    let audio = response
        .bytes()
        .await
        .map_err(|e| Error::Tts(format!("{what} body read failed: {e}")))?;
    Ok(audio.to_vec())
}

#[async_trait]
impl Synthesizer for TextToSpeech {
    async fn synthesize(&self, text: &str) -> Result<Artifact> {
        let audio = self.synthesize_bytes(text).await?;

        // Guarded before the write so a partial file is removed on error
        let temp = TempPath::from_path(
            self.work_dir
                .path_for(&format!("reply-{}.mp3", uuid::Uuid::new_v4())),
        );
        tokio::fs::write(&temp, &audio)
            .await
            .map_err(|e| Error::Tts(format!("could not write {}: {e}", temp.display())))?;
        let artifact = self
            .work_dir
            .artifact(temp)
            .map_err(|e| Error::Tts(format!("could not keep synthesized audio: {e}")))?;

        tracing::info!(
            provider = ?self.provider,
            bytes = audio.len(),
            path = %artifact.path().display(),
            "speech synthesized"
        );
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn config(provider: TtsProvider, base_url: String) -> TtsConfig {
        TtsConfig {
            provider,
            model: "tts-1".to_string(),
            voice: "alloy".to_string(),
            speed: 1.0,
            api_key: SecretString::from("sk-test".to_string()),
            user_id: Some("user-1".to_string()),
            base_url,
            poll_interval: Duration::from_millis(1),
            max_polls: 3,
        }
    }

    fn work_dir(dir: &tempfile::TempDir) -> WorkDir {
        WorkDir::create(dir.path(), false).unwrap()
    }

    #[test]
    fn playht_requires_user_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(TtsProvider::PlayHt, String::new());
        cfg.user_id = None;
        assert!(matches!(
            TextToSpeech::from_config(&cfg, work_dir(&dir)),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn openai_writes_unique_mp3() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/speech"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({"input": "hi", "voice": "alloy"})))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ID3-audio".to_vec()))
            .expect(2)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let tts = TextToSpeech::from_config(&config(TtsProvider::OpenAi, server.uri()), work_dir(&dir)).unwrap();

        let first = tts.synthesize("hi").await.unwrap();
        let second = tts.synthesize("hi").await.unwrap();

        assert_ne!(first.path(), second.path());
        assert!(first.file_name().starts_with("reply-"));
        assert!(first.file_name().ends_with(".mp3"));
        assert_eq!(std::fs::read(first.path()).unwrap(), b"ID3-audio");
    }

    #[tokio::test]
    async fn elevenlabs_posts_to_voice_path() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/text-to-speech/alloy"))
            .and(header("xi-api-key", "sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"audio".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let tts = TextToSpeech::from_config(&config(TtsProvider::ElevenLabs, server.uri()), work_dir(&dir)).unwrap();

        assert_eq!(tts.synthesize_bytes("hi").await.unwrap(), b"audio");
    }

    #[tokio::test]
    async fn backend_error_is_tts_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let tts = TextToSpeech::from_config(&config(TtsProvider::OpenAi, server.uri()), work_dir(&dir)).unwrap();

        let err = tts.synthesize("hi").await.unwrap_err();
        assert!(matches!(err, Error::Tts(msg) if msg.contains("quota exceeded")));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn playht_polls_then_downloads() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/convert"))
            .and(header("authorization", "sk-test"))
            .and(header("x-user-id", "user-1"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"transcriptionId": "job-1"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/articleStatus"))
            .and(query_param("transcriptionId", "job-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"converted": false})))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/articleStatus"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "converted": true,
                "audioUrl": format!("{}/audio/job-1.mp3", server.uri()),
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/audio/job-1.mp3"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"playht-audio".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let tts = TextToSpeech::from_config(&config(TtsProvider::PlayHt, server.uri()), work_dir(&dir)).unwrap();

        assert_eq!(tts.synthesize_bytes("hello").await.unwrap(), b"playht-audio");
    }

    #[tokio::test]
    async fn playht_gives_up_after_max_polls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/convert"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"transcriptionId": "job-2"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/articleStatus"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"converted": false})))
            .expect(3)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let tts = TextToSpeech::from_config(&config(TtsProvider::PlayHt, server.uri()), work_dir(&dir)).unwrap();

        let err = tts.synthesize_bytes("hello").await.unwrap_err();
        assert!(matches!(err, Error::Tts(msg) if msg.contains("not ready")));
    }

    #[tokio::test]
    async fn playht_job_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/convert"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"transcriptionId": "job-3"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/articleStatus"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "converted": false,
                "error": true,
                "errorMessage": "voice not found"
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let tts = TextToSpeech::from_config(&config(TtsProvider::PlayHt, server.uri()), work_dir(&dir)).unwrap();

        let err = tts.synthesize_bytes("hello").await.unwrap_err();
        assert!(matches!(err, Error::Tts(msg) if msg.contains("voice not found")));
    }
}
