use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use std::time::{Duration, Instant};

use crate::models::speech::{CloneVoiceResponse, GenerateSpeechRequest};

/// Client for the speech generation backend (voice cloning and TTS).
pub struct SpeechBackendClient {
    http: Client,
    base_url: String,
}

impl SpeechBackendClient {
    pub fn new(base_url: &str) -> Result<Self, SpeechError> {
        // Generation can take a while; only bound the connect.
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Generate speech. The returned response streams `audio/mpeg` bytes.
    pub async fn generate(&self, request: &GenerateSpeechRequest) -> Result<Response, SpeechError> {
        let url = format!("{}/api/generate-elevenlabs-speech", self.base_url);
        tracing::info!(%url, voice_id = ?request.voice_id, "Forwarding speech generation request");

        let response = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(SpeechError::Unavailable)?;
        Self::check(response).await
    }

    /// Clone a voice from a recorded sample.
    pub async fn clone_voice(
        &self,
        sample: Vec<u8>,
        file_name: String,
        content_type: &str,
    ) -> Result<CloneVoiceResponse, SpeechError> {
        let url = format!("{}/api/clone-voice", self.base_url);
        let part = Part::bytes(sample)
            .file_name(file_name)
            .mime_str(content_type)?;
        let form = Form::new().part("audio_file", part);

        let response = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(SpeechError::Unavailable)?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    /// Round-trip latency to the backend, in milliseconds.
    pub async fn ping(&self) -> Result<u64, SpeechError> {
        let start = Instant::now();
        self.http
            .get(&self.base_url)
            .timeout(Duration::from_secs(3))
            .send()
            .await
            .map_err(SpeechError::Unavailable)?;
        Ok(start.elapsed().as_millis() as u64)
    }

    async fn check(response: Response) -> Result<Response, SpeechError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        tracing::error!(status = status.as_u16(), body = %body, "Speech backend returned an error");
        Err(SpeechError::Backend {
            status: status.as_u16(),
            body,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("Failed to connect to speech generation service: {0}")]
    Unavailable(reqwest::Error),

    #[error("Error from speech generation service: {body}")]
    Backend { status: u16, body: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}
