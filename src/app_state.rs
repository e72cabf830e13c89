use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::{
    akool::{AkoolClient, AkoolError},
    media_proxy::{MediaProxy, ProxyError},
    speech::{SpeechBackendClient, SpeechError},
    storage::{PhotoStore, StorageError},
};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub media_proxy: Arc<MediaProxy>,
    pub speech: Arc<SpeechBackendClient>,
    /// Absent when no provider API key is configured.
    pub akool: Option<Arc<AkoolClient>>,
    /// Absent when the upload bucket is not configured.
    pub photos: Option<Arc<PhotoStore>>,
}

impl AppState {
    pub fn new(
        media_proxy: MediaProxy,
        speech: SpeechBackendClient,
        akool: Option<AkoolClient>,
        photos: Option<PhotoStore>,
    ) -> Self {
        Self {
            media_proxy: Arc::new(media_proxy),
            speech: Arc::new(speech),
            akool: akool.map(Arc::new),
            photos: photos.map(Arc::new),
        }
    }

    /// Build every client from configuration. Optional integrations are left
    /// out, with a warning, when their settings are missing.
    pub fn from_config(config: &AppConfig) -> Result<Self, StateError> {
        let media_proxy = MediaProxy::new(config.media_proxy())?;
        let speech = SpeechBackendClient::new(&config.speech_backend_url)?;

        let akool = match config.akool_api_key.as_deref().filter(|k| !k.is_empty()) {
            Some(key) => Some(AkoolClient::new(
                key,
                &config.akool_api_base_url,
                &config.akool_detect_url,
                config.akool_webhook_url.as_deref(),
            )?),
            None => {
                tracing::warn!("AKOOL_API_KEY not set; face-swap endpoints are disabled");
                None
            }
        };

        let photos = match (
            config.s3_bucket_name.as_deref(),
            config.aws_access_key_id.as_deref(),
            config.aws_secret_access_key.as_deref(),
        ) {
            (Some(bucket), Some(access_key), Some(secret_key)) => Some(PhotoStore::new(
                bucket,
                &config.aws_region,
                config.s3_endpoint.as_deref(),
                access_key,
                secret_key,
            )?),
            _ => {
                tracing::warn!("S3 upload bucket not configured; photo uploads are disabled");
                None
            }
        };

        Ok(Self::new(media_proxy, speech, akool, photos))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error(transparent)]
    Proxy(#[from] ProxyError),

    #[error(transparent)]
    Speech(#[from] SpeechError),

    #[error(transparent)]
    Akool(#[from] AkoolError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
