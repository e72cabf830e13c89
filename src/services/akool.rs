use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::models::face_config::FaceTarget;
use crate::models::provider::{StatusDetails, SubmitResponse};

/// Body `code` the face-swap API uses for an accepted request.
const SUCCESS_CODE: i64 = 1000;

/// Client for the Akool face-swap and face-detection APIs.
pub struct AkoolClient {
    http: Client,
    api_key: String,
    api_base_url: String,
    detect_url: String,
    webhook_url: Option<String>,
}

#[derive(Serialize)]
struct FaceRef<'a> {
    path: &'a str,
    opts: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SwapRequest<'a> {
    source_image: Vec<FaceRef<'a>>,
    target_image: Vec<FaceRef<'a>>,
    #[serde(rename = "face_enhance")]
    face_enhance: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    modify_image: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    modify_video: Option<&'a str>,
    webhook_url: Option<&'a str>,
}

#[derive(Deserialize)]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    data: Option<T>,
}

#[derive(Deserialize)]
struct SwapData {
    #[serde(rename = "_id", default)]
    id: Option<Value>,
    #[serde(default)]
    job_id: Option<Value>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Deserialize)]
struct ResultList {
    #[serde(default)]
    result: Vec<StatusDetails>,
}

#[derive(Deserialize)]
struct DetectResponse {
    error_code: i64,
    #[serde(default)]
    error_msg: Option<String>,
    #[serde(default)]
    landmarks_str: Option<Value>,
}

impl AkoolClient {
    pub fn new(
        api_key: &str,
        api_base_url: &str,
        detect_url: &str,
        webhook_url: Option<&str>,
    ) -> Result<Self, AkoolError> {
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            http,
            api_key: api_key.to_string(),
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            detect_url: detect_url.to_string(),
            webhook_url: webhook_url.map(str::to_string),
        })
    }

    /// Detect the single face in `image_url` and return its landmark string.
    pub async fn detect_face(&self, image_url: &str) -> Result<String, AkoolError> {
        let body = serde_json::json!({
            "single_face": true,
            "image_url": image_url,
        });

        let response = self
            .http
            .post(&self.detect_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        let detected: DetectResponse = response.json().await?;

        if detected.error_code != 0 {
            let message = detected
                .error_msg
                .unwrap_or_else(|| format!("detection error code {}", detected.error_code));
            return Err(AkoolError::NoFace(message));
        }

        // Documented as an array, observed as a bare string.
        match detected.landmarks_str {
            Some(Value::String(s)) if !s.is_empty() => Ok(s),
            Some(Value::Array(items)) => items
                .into_iter()
                .find_map(|item| item.as_str().map(str::to_string))
                .ok_or_else(|| AkoolError::NoFace("empty landmark list".to_string())),
            _ => Err(AkoolError::NoFace(
                "response carried no landmarks".to_string(),
            )),
        }
    }

    /// Swap the user's face onto a still image.
    pub async fn swap_image(
        &self,
        source_url: &str,
        source_opts: &str,
        target: FaceTarget,
    ) -> Result<SubmitResponse, AkoolError> {
        let request = SwapRequest {
            source_image: vec![FaceRef {
                path: source_url,
                opts: source_opts,
            }],
            target_image: vec![FaceRef {
                path: target.path,
                opts: target.opts,
            }],
            face_enhance: 0,
            modify_image: Some(target.path),
            modify_video: None,
            webhook_url: self.webhook_url.as_deref(),
        };
        self.start_swap("faceswap/highquality/specifyimage", &request)
            .await
    }

    /// Swap the user's face onto every target face of a video.
    pub async fn swap_video(
        &self,
        source_url: &str,
        source_opts: &str,
        video_url: &str,
        faces: &[FaceTarget],
        face_enhance: bool,
    ) -> Result<SubmitResponse, AkoolError> {
        let request = SwapRequest {
            source_image: faces
                .iter()
                .map(|_| FaceRef {
                    path: source_url,
                    opts: source_opts,
                })
                .collect(),
            target_image: faces
                .iter()
                .map(|face| FaceRef {
                    path: face.path,
                    opts: face.opts,
                })
                .collect(),
            face_enhance: u8::from(face_enhance),
            modify_image: None,
            modify_video: Some(video_url),
            webhook_url: self.webhook_url.as_deref(),
        };
        self.start_swap("faceswap/highquality/specifyvideo", &request)
            .await
    }

    /// Current status of a swap task. An unknown or very new id yields a
    /// queued status rather than an error.
    pub async fn task_status(&self, task_id: &str) -> Result<StatusDetails, AkoolError> {
        let url = format!("{}/faceswap/result/listbyids", self.api_base_url);

        let response = self
            .http
            .get(&url)
            .query(&[("_ids", task_id)])
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        let envelope: Envelope<ResultList> = response.json().await?;

        if envelope.code != SUCCESS_CODE {
            return Err(AkoolError::Rejected {
                code: envelope.code,
                message: envelope.msg.unwrap_or_default(),
            });
        }

        let first = envelope
            .data
            .and_then(|data| data.result.into_iter().next());
        Ok(first.unwrap_or_else(|| StatusDetails {
            faceswap_status: 0,
            msg: Some("No results found for this task ID yet or ID is invalid.".to_string()),
            ..StatusDetails::default()
        }))
    }

    async fn start_swap(
        &self,
        path: &str,
        request: &SwapRequest<'_>,
    ) -> Result<SubmitResponse, AkoolError> {
        let url = format!("{}/{}", self.api_base_url, path);
        tracing::info!(%url, faces = request.target_image.len(), "Requesting face swap");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        let envelope: Envelope<SwapData> = response.json().await?;

        if envelope.code != SUCCESS_CODE {
            return Err(AkoolError::Rejected {
                code: envelope.code,
                message: envelope
                    .msg
                    .unwrap_or_else(|| "No specific error message provided".to_string()),
            });
        }

        let data = envelope.data.ok_or(AkoolError::MissingData)?;
        Ok(SubmitResponse {
            akool_task_id: data.id.as_ref().and_then(value_to_string),
            akool_job_id: data.job_id.as_ref().and_then(value_to_string),
            message: Some(
                envelope
                    .msg
                    .unwrap_or_else(|| "Faceswap generation started".to_string()),
            ),
            direct_url: data.url.filter(|u| !u.is_empty()),
        })
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, AkoolError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| {
                v.get("msg")
                    .or_else(|| v.get("error_msg"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| body.chars().take(200).collect());

        Err(AkoolError::HttpStatus {
            status: status.as_u16(),
            message,
        })
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AkoolError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Akool API request failed with status {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("Akool API error. Code: {code}. Message: {message}")]
    Rejected { code: i64, message: String },

    #[error("Akool response carried no data")]
    MissingData,

    #[error("No face detected: {0}")]
    NoFace(String),
}
