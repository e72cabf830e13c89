use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use std::time::Duration;

use crate::models::job::JobKind;
use crate::models::provider::{ErrorBody, StatusDetails, StatusEnvelope, SubmitResponse};

/// Binary payload handed to the provider. Validating format and size is the
/// caller's job.
#[derive(Debug, Clone)]
pub struct JobPayload {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub content_type: String,
    /// Extra form fields (scenario selection and the like).
    pub fields: Vec<(String, String)>,
}

impl JobPayload {
    pub fn new(
        bytes: Vec<u8>,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            bytes,
            file_name: file_name.into(),
            content_type: content_type.into(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }
}

/// The remote side of a tracked job: accepts submissions and answers status
/// checks.
#[async_trait]
pub trait JobProvider: Send + Sync {
    async fn submit(
        &self,
        kind: JobKind,
        payload: JobPayload,
    ) -> Result<SubmitResponse, ProviderError>;

    async fn status(&self, job_id: &str) -> Result<StatusDetails, ProviderError>;
}

/// Talks to the same-origin submission and status endpoints over HTTP.
pub struct HttpJobProvider {
    http: Client,
    base_url: String,
}

impl HttpJobProvider {
    pub fn new(base_url: &str) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn rejection(response: reqwest::Response) -> ProviderError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.message());
        ProviderError::Rejected { status, message }
    }
}

#[async_trait]
impl JobProvider for HttpJobProvider {
    async fn submit(
        &self,
        kind: JobKind,
        payload: JobPayload,
    ) -> Result<SubmitResponse, ProviderError> {
        let path = kind.submit_path().ok_or(ProviderError::UnsupportedKind(kind))?;
        let url = format!("{}{}", self.base_url, path);
        let size = payload.bytes.len();

        let part = Part::bytes(payload.bytes)
            .file_name(payload.file_name)
            .mime_str(&payload.content_type)?;
        let mut form = Form::new().part(kind.form_field(), part);
        for (name, value) in payload.fields {
            form = form.text(name, value);
        }

        tracing::debug!(%kind, %url, size, "Submitting job payload");

        let response = self.http.post(&url).multipart(form).send().await?;
        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(ProviderError::Malformed)
    }

    async fn status(&self, job_id: &str) -> Result<StatusDetails, ProviderError> {
        let url = format!(
            "{}/api/faceswap-status/{}",
            self.base_url,
            urlencoding::encode(job_id)
        );

        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        let body = response.text().await?;
        let envelope: StatusEnvelope =
            serde_json::from_str(&body).map_err(ProviderError::Malformed)?;
        Ok(envelope.status_details)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider rejected the request with status {status}")]
    Rejected { status: u16, message: Option<String> },

    #[error("Malformed provider response: {0}")]
    Malformed(serde_json::Error),

    #[error("No submission endpoint for {0} jobs")]
    UnsupportedKind(JobKind),
}

impl ProviderError {
    /// Provider-supplied message, when the response carried one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            ProviderError::Rejected { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}
