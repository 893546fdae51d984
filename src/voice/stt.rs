//! Speech-to-text (STT) processing

use std::path::Path;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use super::Transcriber;
use crate::config::{SttConfig, SttProvider};
use crate::{Error, Result};

/// Response from OpenAI Whisper transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Response from Deepgram transcription API
#[derive(serde::Deserialize)]
struct DeepgramResponse {
    results: DeepgramResults,
}

#[derive(serde::Deserialize)]
struct DeepgramResults {
    channels: Vec<DeepgramChannel>,
}

#[derive(serde::Deserialize)]
struct DeepgramChannel {
    alternatives: Vec<DeepgramAlternative>,
}

#[derive(serde::Deserialize)]
struct DeepgramAlternative {
    transcript: String,
}

/// MIME type for an audio file, from its extension
fn mime_for_path(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("mp3") => "audio/mpeg",
        Some("m4a") => "audio/mp4",
        Some("wav") => "audio/wav",
        Some("webm") => "audio/webm",
        _ => "audio/ogg",
    }
}

fn request_error(provider: &str, e: &reqwest::Error) -> Error {
    tracing::error!(provider, error = %e, "STT request failed");
    Error::Stt(format!("{provider} request failed: {e}"))
}

/// Transcribes speech to text
pub struct SpeechToText {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    base_url: String,
    provider: SttProvider,
}

impl SpeechToText {
    /// Create a new STT instance using `OpenAI` Whisper
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_whisper(api_key: SecretString, model: String, base_url: String) -> Result<Self> {
        Self::new(SttProvider::Whisper, api_key, model, base_url)
    }

    /// Create a new STT instance using Deepgram
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_deepgram(api_key: SecretString, model: String, base_url: String) -> Result<Self> {
        Self::new(SttProvider::Deepgram, api_key, model, base_url)
    }

    /// Create from the loaded configuration
    ///
    /// # Errors
    ///
    /// Returns error if the provider's API key is missing
    pub fn from_config(config: &SttConfig) -> Result<Self> {
        Self::new(
            config.provider,
            config.api_key.clone(),
            config.model.clone(),
            config.base_url.clone(),
        )
    }

    fn new(provider: SttProvider, api_key: SecretString, model: String, base_url: String) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            let message = match provider {
                SttProvider::Whisper => "OpenAI API key required for Whisper",
                SttProvider::Deepgram => "Deepgram API key required",
            };
            return Err(Error::Config(message.to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            provider,
        })
    }

    /// Transcribe audio to text
    ///
    /// # Arguments
    ///
    /// * `audio` - Encoded audio bytes
    /// * `file_name` - Name reported to the provider; Whisper infers the format from its extension
    /// * `mime` - MIME type of `audio`
    ///
    /// # Errors
    ///
    /// Returns error if transcription fails
    pub async fn transcribe_bytes(&self, audio: Vec<u8>, file_name: &str, mime: &str) -> Result<String> {
        match self.provider {
            SttProvider::Whisper => self.transcribe_whisper(audio, file_name, mime).await,
            SttProvider::Deepgram => self.transcribe_deepgram(audio, mime).await,
        }
    }

    /// Transcribe using OpenAI Whisper
    async fn transcribe_whisper(&self, audio: Vec<u8>, file_name: &str, mime: &str) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), "starting Whisper transcription");

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio)
                    .file_name(file_name.to_string())
                    .mime_str(mime)
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone());

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .map_err(|e| request_error("Whisper", &e))?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(Error::Stt(format!("Whisper API error {status}: {body}")));
        }

        let result: WhisperResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse response");
            Error::Stt(format!("invalid Whisper response: {e}"))
        })?;

        tracing::info!(transcript = %result.text, "transcription complete");
        Ok(result.text)
    }

    /// Transcribe using Deepgram
    async fn transcribe_deepgram(&self, audio: Vec<u8>, mime: &str) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), "starting Deepgram transcription");

        let response = self
            .client
            .post(format!("{}/listen", self.base_url))
            .query(&[("model", self.model.as_str()), ("punctuate", "true")])
            .header("Authorization", format!("Token {}", self.api_key.expose_secret()))
            .header("Content-Type", mime)
            .body(audio)
            .send()
            .await
            .map_err(|e| request_error("Deepgram", &e))?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Deepgram API error");
            return Err(Error::Stt(format!("Deepgram API error {status}: {body}")));
        }

        let result: DeepgramResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse Deepgram response");
            Error::Stt(format!("invalid Deepgram response: {e}"))
        })?;

        let transcript = result
            .results
            .channels
            .first()
            .and_then(|c| c.alternatives.first())
            .map(|a| a.transcript.clone())
            .unwrap_or_default();

        tracing::info!(transcript = %transcript, "transcription complete");
        Ok(transcript)
    }
}

#[async_trait]
impl Transcriber for SpeechToText {
    async fn transcribe(&self, path: &Path) -> Result<String> {
        let audio = tokio::fs::read(path)
            .await
            .map_err(|e| Error::Stt(format!("could not read {}: {e}", path.display())))?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.ogg");

        self.transcribe_bytes(audio, file_name, mime_for_path(path)).await
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn key() -> SecretString {
        SecretString::from("sk-test".to_string())
    }

    fn write_audio(dir: &Path, name: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"OggS").unwrap();
        path
    }

    #[test]
    fn requires_api_key() {
        let empty = SecretString::from(String::new());
        assert!(matches!(
            SpeechToText::new_whisper(empty, "whisper-1".to_string(), String::new()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn mime_follows_extension() {
        assert_eq!(mime_for_path(Path::new("a.ogg")), "audio/ogg");
        assert_eq!(mime_for_path(Path::new("a.mp3")), "audio/mpeg");
        assert_eq!(mime_for_path(Path::new("a")), "audio/ogg");
    }

    #[tokio::test]
    async fn whisper_transcribes_file() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/audio/transcriptions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"text": "What's the weather"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let audio = write_audio(dir.path(), "abc.ogg");
        let stt = SpeechToText::new_whisper(key(), "whisper-1".to_string(), format!("{}/v1", server.uri())).unwrap();

        assert_eq!(stt.transcribe(&audio).await.unwrap(), "What's the weather");
    }

    #[tokio::test]
    async fn whisper_error_is_stt_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/transcriptions"))
            .respond_with(ResponseTemplate::new(400).set_body_string("unsupported format"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let audio = write_audio(dir.path(), "abc.ogg");
        let stt = SpeechToText::new_whisper(key(), "whisper-1".to_string(), server.uri()).unwrap();

        let err = stt.transcribe(&audio).await.unwrap_err();
        assert!(matches!(err, Error::Stt(msg) if msg.contains("unsupported format")));
    }

    #[tokio::test]
    async fn deepgram_reads_first_alternative() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/listen"))
            .and(query_param("model", "nova-2"))
            .and(header("authorization", "Token sk-test"))
            .and(header("content-type", "audio/ogg"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": {"channels": [{"alternatives": [{"transcript": "hello"}]}]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let audio = write_audio(dir.path(), "abc.ogg");
        let stt = SpeechToText::new_deepgram(key(), "nova-2".to_string(), server.uri()).unwrap();

        assert_eq!(stt.transcribe(&audio).await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn missing_file_is_stt_error() {
        let stt = SpeechToText::new_whisper(key(), "whisper-1".to_string(), "http://127.0.0.1:1".to_string()).unwrap();
        let err = stt.transcribe(Path::new("/nonexistent/voice.ogg")).await.unwrap_err();
        assert!(matches!(err, Error::Stt(_)));
    }
}
