use axum::body::Bytes;
use axum::extract::{Multipart, Path, Query, State};
use axum::Json;
use image::ImageFormat;
use std::collections::HashMap;

use crate::app_state::AppState;
use crate::models::face_config::{self, FaceTarget, Gender, Scenario, Section, SwapTarget};
use crate::models::provider::{StatusEnvelope, SubmitResponse};
use crate::routes::error::ApiError;
use crate::services::akool::AkoolClient;
use crate::services::storage::PhotoStore;

/// Uploaded photo plus the text fields that came with it.
struct SwapForm {
    image: Bytes,
    format: ImageFormat,
    fields: HashMap<String, String>,
}

impl SwapForm {
    async fn read(
        mut multipart: Multipart,
        query: HashMap<String, String>,
    ) -> Result<Self, ApiError> {
        let mut image = None;
        let mut fields = query;

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            if name == "user_image" {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?;
                image = Some(data);
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Invalid field {}: {}", name, e)))?;
                fields.insert(name, value);
            }
        }

        let image = image
            .filter(|data| !data.is_empty())
            .ok_or_else(|| ApiError::BadRequest("user_image is required".to_string()))?;
        let format = image::guess_format(&image)
            .map_err(|_| ApiError::UnsupportedMedia("Invalid file type. Please upload an image.".to_string()))?;

        Ok(Self {
            image,
            format,
            fields,
        })
    }

    fn target(&self) -> Result<SwapTarget, ApiError> {
        let section: Section = self.required("section")?;
        let scenario: Scenario = self.required("scenario")?;
        let gender = match self.fields.get("gender").filter(|g| !g.is_empty()) {
            Some(raw) => raw
                .parse::<Gender>()
                .map_err(|_| ApiError::BadRequest(format!("Invalid gender: {}", raw)))?,
            None => Gender::Male,
        };

        face_config::lookup(section, scenario, gender).ok_or_else(|| {
            ApiError::BadRequest(format!(
                "No face configuration for {}/{}/{}",
                section, scenario, gender
            ))
        })
    }

    fn required<T: std::str::FromStr>(&self, name: &str) -> Result<T, ApiError> {
        let raw = self
            .fields
            .get(name)
            .ok_or_else(|| ApiError::BadRequest(format!("{} is required", name)))?;
        raw.parse()
            .map_err(|_| ApiError::BadRequest(format!("Invalid {}: {}", name, raw)))
    }

    fn flag(&self, name: &str) -> bool {
        matches!(
            self.fields.get(name).map(|v| v.trim().to_ascii_lowercase()).as_deref(),
            Some("true" | "1" | "yes")
        )
    }

    /// Upload the photo and detect the user's face in it.
    async fn upload_source(
        &self,
        akool: &AkoolClient,
        photos: &PhotoStore,
    ) -> Result<(String, String), ApiError> {
        let extension = self.format.extensions_str().first().copied().unwrap_or("png");
        let url = photos
            .upload(&self.image, extension, self.format.to_mime_type())
            .await?;
        let opts = akool.detect_face(&url).await?;
        Ok((url, opts))
    }
}

fn services(state: &AppState) -> Result<(&AkoolClient, &PhotoStore), ApiError> {
    let akool = state
        .akool
        .as_deref()
        .ok_or(ApiError::NotConfigured("Akool API key not configured"))?;
    let photos = state
        .photos
        .as_deref()
        .ok_or(ApiError::NotConfigured("S3 upload bucket not configured"))?;
    Ok((akool, photos))
}

async fn swap_image(
    form: &SwapForm,
    akool: &AkoolClient,
    photos: &PhotoStore,
    target: FaceTarget,
) -> Result<SubmitResponse, ApiError> {
    let (source_url, source_opts) = form.upload_source(akool, photos).await?;
    Ok(akool.swap_image(&source_url, &source_opts, target).await?)
}

async fn swap_video(
    form: &SwapForm,
    akool: &AkoolClient,
    photos: &PhotoStore,
    video_url: &str,
    faces: &[FaceTarget],
    face_enhance: bool,
) -> Result<SubmitResponse, ApiError> {
    let (source_url, source_opts) = form.upload_source(akool, photos).await?;
    Ok(akool
        .swap_video(&source_url, &source_opts, video_url, faces, face_enhance)
        .await?)
}

fn record(result: &Result<SubmitResponse, ApiError>, kind: &'static str) {
    match result {
        Ok(reply) => {
            metrics::counter!("faceswap_jobs_submitted_total", "kind" => kind).increment(1);
            tracing::info!(
                kind,
                task_id = ?reply.akool_task_id,
                direct = reply.direct_url.is_some(),
                "Face swap submitted"
            );
        }
        Err(_) => {
            metrics::counter!("faceswap_jobs_failed_total", "kind" => kind).increment(1);
        }
    }
}

/// POST /api/initiate-faceswap: swap the user's face onto a scenario image.
pub async fn initiate_faceswap(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    multipart: Multipart,
) -> Result<Json<SubmitResponse>, ApiError> {
    let form = SwapForm::read(multipart, query).await?;
    let SwapTarget::Image { target } = form.target()? else {
        return Err(ApiError::BadRequest(
            "This scenario uses a video swap; use /api/initiate-video-faceswap".to_string(),
        ));
    };
    let (akool, photos) = services(&state)?;

    let result = swap_image(&form, akool, photos, target).await;
    record(&result, "image");
    result.map(Json)
}

/// POST /api/initiate-video-faceswap: swap the user's face into a scenario video.
pub async fn initiate_video_faceswap(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    multipart: Multipart,
) -> Result<Json<SubmitResponse>, ApiError> {
    let form = SwapForm::read(multipart, query).await?;
    let SwapTarget::Video { video_url, faces } = form.target()? else {
        return Err(ApiError::BadRequest(
            "This scenario uses an image swap; use /api/initiate-faceswap".to_string(),
        ));
    };
    let face_enhance = form.flag("face_enhance");
    let (akool, photos) = services(&state)?;

    let result = swap_video(&form, akool, photos, video_url, faces, face_enhance).await;
    record(&result, "video");
    result.map(Json)
}

/// GET /api/faceswap-status/{task_id}: current provider status for a task.
pub async fn faceswap_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<StatusEnvelope>, ApiError> {
    let akool = state
        .akool
        .as_deref()
        .ok_or(ApiError::NotConfigured("Akool API key not configured"))?;

    let status_details = akool.task_status(&task_id).await?;
    tracing::debug!(%task_id, status = status_details.faceswap_status, "Fetched face swap status");

    Ok(Json(StatusEnvelope {
        task_id: Some(task_id),
        status_details,
    }))
}
