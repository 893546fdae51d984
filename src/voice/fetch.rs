//! Voice file download from the chat transport

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;

use super::AudioSource;
use crate::artifact::{Artifact, WorkDir};
use crate::channels::Channel;
use crate::{Error, Result};

/// File extension for a transport MIME hint
///
/// Telegram voice notes are OGG/Opus, so that is the fallback.
#[must_use]
pub fn extension_for_mime(mime: Option<&str>) -> &'static str {
    match mime.map(str::to_lowercase).as_deref() {
        Some("audio/mpeg" | "audio/mp3") => "mp3",
        Some("audio/mp4" | "audio/m4a" | "audio/x-m4a") => "m4a",
        Some("audio/wav" | "audio/x-wav" | "audio/wave") => "wav",
        Some("audio/webm") => "webm",
        _ => "ogg",
    }
}

/// Downloads voice notes into the work directory
pub struct AudioFetcher {
    channel: Arc<dyn Channel>,
    client: reqwest::Client,
    work_dir: WorkDir,
}

impl AudioFetcher {
    /// Create a fetcher that resolves handles through `channel`
    #[must_use]
    pub fn new(channel: Arc<dyn Channel>, work_dir: WorkDir) -> Self {
        Self {
            channel,
            client: reqwest::Client::new(),
            work_dir,
        }
    }
}

#[async_trait]
impl AudioSource for AudioFetcher {
    async fn fetch(&self, handle: &str, mime_hint: Option<&str>) -> Result<Artifact> {
        let url = self
            .channel
            .file_url(handle)
            .await
            .map_err(|e| Error::Fetch(format!("could not resolve {handle}: {e}")))?;

        // The download URL embeds the bot token, keep it out of errors
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Fetch(format!("download failed: {}", e.without_url())))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Fetch(format!("download failed with status {status}")));
        }

        // Unique per flow: repeated handles (forwarded notes) must not share a file
        let (file, temp) = self
            .work_dir
            .create_file(handle, extension_for_mime(mime_hint))
            .map_err(|e| Error::Fetch(format!("could not create download file: {e}")))?;
        let mut file = tokio::fs::File::from_std(file);

        let mut written = 0usize;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::Fetch(format!("download interrupted: {}", e.without_url())))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| Error::Fetch(format!("write failed: {e}")))?;
            written += chunk.len();
        }
        file.flush()
            .await
            .map_err(|e| Error::Fetch(format!("write failed: {e}")))?;

        let artifact = self
            .work_dir
            .artifact(temp)
            .map_err(|e| Error::Fetch(format!("could not keep download: {e}")))?;

        tracing::debug!(handle, path = %artifact.path().display(), bytes = written, "voice file downloaded");
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    /// Channel that resolves every handle to a fixed URL
    struct StaticUrlChannel {
        url: Option<String>,
    }

    #[async_trait]
    impl Channel for StaticUrlChannel {
        fn name(&self) -> &'static str {
            "static"
        }

        async fn connect(&mut self) -> Result<()> {
            Ok(())
        }

        async fn send_text(&self, _chat_id: &str, _text: &str) -> Result<()> {
            Ok(())
        }

        async fn send_voice_file(&self, _chat_id: &str, _path: &Path, _name: &str) -> Result<()> {
            Ok(())
        }

        async fn file_url(&self, _handle: &str) -> Result<String> {
            self.url
                .clone()
                .ok_or_else(|| Error::Channel("no such file".to_string()))
        }
    }

    fn fetcher(url: Option<String>, work_dir: WorkDir) -> AudioFetcher {
        AudioFetcher::new(Arc::new(StaticUrlChannel { url }), work_dir)
    }

    #[test]
    fn maps_mime_to_extension() {
        assert_eq!(extension_for_mime(Some("audio/ogg")), "ogg");
        assert_eq!(extension_for_mime(Some("audio/MPEG")), "mp3");
        assert_eq!(extension_for_mime(None), "ogg");
    }

    #[tokio::test]
    async fn downloads_into_path_named_after_handle() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/file/voice.oga"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"OggS-data".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let work_dir = WorkDir::create(dir.path(), false).unwrap();
        let fetcher = fetcher(Some(format!("{}/file/voice.oga", server.uri())), work_dir);

        let artifact = fetcher.fetch("abc123", Some("audio/ogg")).await.unwrap();
        let name = artifact.file_name();
        assert!(name.starts_with("abc123-") && name.ends_with(".ogg"), "{name}");
        assert_eq!(artifact.path().parent(), Some(dir.path()));
        assert_eq!(std::fs::read(artifact.path()).unwrap(), b"OggS-data");

        let path = artifact.path().to_path_buf();
        drop(artifact);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn repeated_handle_gets_separate_files() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"OggS-data".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let work_dir = WorkDir::create(dir.path(), false).unwrap();
        let fetcher = fetcher(Some(server.uri()), work_dir);

        let (first, second) = tokio::join!(fetcher.fetch("abc123", None), fetcher.fetch("abc123", None));
        let (first, second) = (first.unwrap(), second.unwrap());
        assert_ne!(first.path(), second.path());

        // One flow finishing must not take the other's audio with it
        drop(first);
        assert!(second.path().exists());
        assert_eq!(std::fs::read(second.path()).unwrap(), b"OggS-data");
    }

    #[tokio::test]
    async fn kept_download_survives_drop() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"new".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let work_dir = WorkDir::create(dir.path(), true).unwrap();
        let fetcher = fetcher(Some(server.uri()), work_dir);

        let artifact = fetcher.fetch("abc123", None).await.unwrap();
        let path = artifact.path().to_path_buf();
        drop(artifact);

        assert_eq!(std::fs::read(path).unwrap(), b"new");
    }

    #[tokio::test]
    async fn http_error_is_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let work_dir = WorkDir::create(dir.path(), false).unwrap();
        let fetcher = fetcher(Some(server.uri()), work_dir);

        let err = fetcher.fetch("abc123", None).await.unwrap_err();
        assert!(matches!(err, Error::Fetch(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn unresolvable_handle_is_fetch_error() {
        let dir = tempfile::tempdir().unwrap();
        let work_dir = WorkDir::create(dir.path(), false).unwrap();
        let fetcher = fetcher(None, work_dir);

        let err = fetcher.fetch("missing", None).await.unwrap_err();
        assert!(matches!(err, Error::Fetch(msg) if msg.contains("missing")));
    }
}
