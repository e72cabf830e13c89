pub mod error;
pub mod faceswap;
pub mod health;
pub mod metrics;
pub mod speech;
pub mod stream_video;

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;
use crate::config::AppConfig;
use crate::services::media_proxy::STREAM_PATH;

/// Application routes. The media relay sits outside the CORS and compression
/// layers: it sets its own CORS headers and streams bytes untouched.
pub fn router(state: AppState, config: &AppConfig) -> Router {
    let api = Router::new()
        .route("/health", get(health::health_check))
        .route("/api/initiate-faceswap", post(faceswap::initiate_faceswap))
        .route(
            "/api/initiate-video-faceswap",
            post(faceswap::initiate_video_faceswap),
        )
        .route(
            "/api/faceswap-status/{task_id}",
            get(faceswap::faceswap_status),
        )
        .route("/api/generate-speech", post(speech::generate_speech))
        .route("/api/clone-voice", post(speech::clone_voice))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(RequestBodyLimitLayer::new(config.max_upload_bytes))
        .layer(CompressionLayer::new())
        .layer(cors_layer(config));

    let media = Router::new().route(
        STREAM_PATH,
        get(stream_video::stream_video).options(stream_video::stream_video_preflight),
    );

    api.merge(media)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins()
        .into_iter()
        .filter_map(|origin| match HeaderValue::from_str(&origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}
