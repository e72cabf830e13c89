use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;
use crate::models::failure::FailureKind;
use crate::services::media_proxy::{forwarded_headers, MediaProxy, ProxyError};

#[derive(Debug, Deserialize)]
pub struct StreamParams {
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StreamErrorBody {
    pub error: String,
    pub details: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<FailureKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_status: Option<u16>,
}

/// GET /api/stream-video?url=...: relay remote media from this origin.
pub async fn stream_video(
    State(state): State<AppState>,
    Query(params): Query<StreamParams>,
    request_headers: HeaderMap,
) -> Response {
    metrics::counter!("media_proxy_requests_total").increment(1);

    let Some(raw) = params.url.filter(|u| !u.trim().is_empty()) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Missing url parameter",
            "the url query parameter is required".to_string(),
            None,
        );
    };

    let remote = match MediaProxy::parse_remote(&raw) {
        Ok(url) => url,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "Invalid url parameter",
                e.to_string(),
                None,
            )
        }
    };

    let range = request_headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok());

    tracing::info!(host = ?remote.host_str(), range = ?range, "Streaming media");

    let upstream = match state.media_proxy.fetch(&remote, range).await {
        Ok(response) => response,
        Err(e) => {
            metrics::counter!("media_proxy_upstream_errors_total").increment(1);
            tracing::error!(url = %remote, error = %e, "Media relay failed");
            let upstream_status = match &e {
                ProxyError::Upstream { status, .. } => Some(*status),
                _ => None,
            };
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error streaming video",
                e.to_string(),
                upstream_status,
            );
        }
    };

    let status = if upstream.status() == StatusCode::PARTIAL_CONTENT {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };
    let headers = forwarded_headers(upstream.headers());
    let body = Body::from_stream(upstream.bytes_stream());

    let mut response = (status, headers, body).into_response();
    apply_cors(response.headers_mut());
    response
}

/// OPTIONS /api/stream-video: CORS preflight.
pub async fn stream_video_preflight() -> Response {
    let mut response = StatusCode::OK.into_response();
    let headers = response.headers_mut();
    apply_cors(headers);
    headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("86400"));
    response
}

fn apply_cors(headers: &mut HeaderMap) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization, Range"),
    );
    headers.insert(
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static("Content-Length, Content-Range, Accept-Ranges"),
    );
}

fn error_response(
    status: StatusCode,
    error: &str,
    details: String,
    upstream_status: Option<u16>,
) -> Response {
    let kind = status
        .is_server_error()
        .then_some(FailureKind::ProxyUpstreamError);
    let body = StreamErrorBody {
        error: error.to_string(),
        details,
        kind,
        upstream_status,
    };
    let mut response = (status, Json(body)).into_response();
    apply_cors(response.headers_mut());
    response
}
