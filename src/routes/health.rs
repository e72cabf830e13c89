use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub speech_backend: ComponentHealth,
    pub faceswap_provider: ComponentHealth,
    pub upload_bucket: ComponentHealth,
}

#[derive(Serialize)]
pub struct ComponentHealth {
    pub status: String,
    pub latency_ms: Option<u64>,
}

impl ComponentHealth {
    fn configured(present: bool) -> Self {
        Self {
            status: if present { "ok" } else { "unconfigured" }.to_string(),
            latency_ms: None,
        }
    }
}

/// GET /health: dependency status.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let speech_check = match state.speech.ping().await {
        Ok(latency) => ComponentHealth {
            status: "ok".to_string(),
            latency_ms: Some(latency),
        },
        Err(e) => {
            tracing::warn!(error = %e, backend = state.speech.base_url(), "Speech backend health check failed");
            ComponentHealth {
                status: "error".to_string(),
                latency_ms: None,
            }
        }
    };

    let faceswap_check = ComponentHealth::configured(state.akool.is_some());
    let bucket_check = ComponentHealth::configured(state.photos.is_some());

    let all_healthy = [&speech_check, &faceswap_check, &bucket_check]
        .iter()
        .all(|c| c.status == "ok");
    let status_code = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if all_healthy {
            "ok".to_string()
        } else {
            "degraded".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks {
            speech_backend: speech_check,
            faceswap_provider: faceswap_check,
            upload_bucket: bucket_check,
        },
    };

    (status_code, Json(response))
}
