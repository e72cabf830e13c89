use axum::body::Body;
use axum::extract::{Multipart, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use garde::Validate;

use crate::app_state::AppState;
use crate::models::speech::GenerateSpeechRequest;
use crate::routes::error::ApiError;
use crate::services::speech::SpeechError;

/// POST /api/generate-speech: stream synthesized speech from the backend.
pub async fn generate_speech(
    State(state): State<AppState>,
    Json(request): Json<GenerateSpeechRequest>,
) -> Response {
    if let Err(report) = request.validate() {
        return ApiError::BadRequest(report.to_string()).into_response();
    }

    match state.speech.generate(&request).await {
        Ok(upstream) => {
            let mut response = Body::from_stream(upstream.bytes_stream()).into_response();
            let headers = response.headers_mut();
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("audio/mpeg"));
            headers.insert(
                header::CONTENT_DISPOSITION,
                HeaderValue::from_static("inline; filename=\"speech.mp3\""),
            );
            response
        }
        Err(e) => speech_error(e),
    }
}

/// POST /api/clone-voice: clone a voice from a recorded sample.
pub async fn clone_voice(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut sample = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return ApiError::BadRequest(format!("Invalid multipart body: {}", e))
                    .into_response()
            }
        };
        if field.name() != Some("audio_file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or("sample.webm").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        match field.bytes().await {
            Ok(data) if !data.is_empty() => {
                sample = Some((data.to_vec(), file_name, content_type));
            }
            Ok(_) => {}
            Err(e) => {
                return ApiError::BadRequest(format!("Failed to read upload: {}", e))
                    .into_response()
            }
        }
    }

    let Some((data, file_name, content_type)) = sample else {
        return ApiError::BadRequest("audio_file is required".to_string()).into_response();
    };

    tracing::info!(size = data.len(), %content_type, "Forwarding voice sample for cloning");

    match state
        .speech
        .clone_voice(data, file_name, &content_type)
        .await
    {
        Ok(reply) => Json(reply).into_response(),
        Err(e) => speech_error(e),
    }
}

fn speech_error(err: SpeechError) -> Response {
    match &err {
        SpeechError::Backend { status, .. } => {
            let status = StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY);
            (status, err.to_string()).into_response()
        }
        SpeechError::Unavailable(e) => {
            tracing::error!(error = %e, "Speech backend unreachable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Failed to connect to speech generation service. Is the backend running?",
            )
                .into_response()
        }
        SpeechError::Http(e) => {
            tracing::error!(error = %e, "Speech backend reply unreadable");
            ApiError::Upstream(format!("Invalid reply from speech generation service: {}", e))
                .into_response()
        }
    }
}
