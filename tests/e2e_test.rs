//! End-to-end: submit a photo through the HTTP provider, track it to
//! completion against a mocked face-swap API, then play the result back
//! through the media relay.

mod helpers;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use deepfake_awareness::config::AppConfig;
use deepfake_awareness::models::failure::FailureKind;
use deepfake_awareness::models::job::{JobKind, JobStatus};
use deepfake_awareness::services::poller::{JobPoller, PollerConfig};
use deepfake_awareness::services::provider::{HttpJobProvider, JobPayload};
use serde_json::{json, Value};
use std::collections::HashMap;
use tokio_test::assert_ok;

use helpers::{app, bind, serve, spawn_upstream, test_config, PNG_BYTES};

const MEDIA_BYTES: &[u8] = b"\x00\x00\x00\x18ftypmp42generated-video";

#[derive(Clone, Default)]
struct Upstream {
    base_url: String,
    status_calls: Arc<AtomicU32>,
    uploads: Arc<Mutex<Vec<String>>>,
    swap_requests: Arc<Mutex<Vec<Value>>>,
    /// Status code reported on every check when set.
    fixed_status: Option<i64>,
}

/// One server standing in for the face-swap API, the photo bucket and the CDN.
fn upstream(state: Upstream) -> Router {
    Router::new()
        .route(
            "/detect",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["single_face"], true);
                Json(json!({ "error_code": 0, "landmarks_str": ["10,10:20,10:15,20:15,30"] }))
            }),
        )
        .route(
            "/faceswap/highquality/specifyimage",
            post(
                |State(state): State<Upstream>, Json(body): Json<Value>| async move {
                    state.swap_requests.lock().unwrap().push(body);
                    // The provider names the output location up front.
                    let output = format!("{}/cdn/out.mp4", state.base_url);
                    Json(json!({
                        "code": 1000,
                        "msg": "OK",
                        "data": { "_id": "T1", "job_id": 77, "url": output }
                    }))
                },
            ),
        )
        .route(
            "/faceswap/result/listbyids",
            get(
                |State(state): State<Upstream>, Query(params): Query<HashMap<String, String>>| async move {
                    let call = state.status_calls.fetch_add(1, Ordering::SeqCst) + 1;
                    let id = params.get("_ids").cloned().unwrap_or_default();
                    let media = format!("{}/cdn/out.mp4", state.base_url);
                    let record = match (state.fixed_status, call) {
                        (Some(code), _) => json!({ "_id": id, "faceswap_status": code }),
                        (None, 1) => json!({ "_id": id, "faceswap_status": 1 }),
                        (None, _) => json!({ "_id": id, "faceswap_status": 2, "url": media }),
                    };
                    Json(json!({ "code": 1000, "data": { "result": [record] } }))
                },
            ),
        )
        .route(
            "/photos/{*key}",
            put(
                |State(state): State<Upstream>, Path(key): Path<String>| async move {
                    state.uploads.lock().unwrap().push(key);
                    (StatusCode::OK, [(header::ETAG, "\"etag\"")])
                },
            ),
        )
        .route(
            "/cdn/out.mp4",
            get(|headers: HeaderMap| async move {
                match headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
                    Some("Bearer cdn-token") => {
                        ([(header::CONTENT_TYPE, "video/mp4")], MEDIA_BYTES).into_response()
                    }
                    _ => StatusCode::FORBIDDEN.into_response(),
                }
            }),
        )
        .with_state(state)
}

fn server_config(upstream_url: &str) -> AppConfig {
    AppConfig {
        akool_api_key: Some("akool-key".to_string()),
        akool_api_base_url: upstream_url.to_string(),
        akool_detect_url: format!("{}/detect", upstream_url),
        s3_bucket_name: Some("photos".to_string()),
        s3_endpoint: Some(upstream_url.to_string()),
        aws_access_key_id: Some("access".to_string()),
        aws_secret_access_key: Some("secret".to_string()),
        cdn_bearer_token: Some("cdn-token".to_string()),
        cdn_auth_hosts: "127.0.0.1".to_string(),
        ..test_config()
    }
}

async fn start(fixed_status: Option<i64>) -> (String, Upstream, Vec<tokio::sync::oneshot::Sender<()>>) {
    let (listener, upstream_url) = bind().await;
    let state = Upstream {
        base_url: upstream_url.clone(),
        fixed_status,
        ..Upstream::default()
    };
    let upstream_shutdown = serve(listener, upstream(state.clone()));

    let config = server_config(&upstream_url);
    let (server_url, server_shutdown) = spawn_upstream(app(&config)).await;

    (server_url, state, vec![upstream_shutdown, server_shutdown])
}

fn photo_payload() -> JobPayload {
    JobPayload::new(PNG_BYTES.to_vec(), "me.png", "image/png")
        .with_field("section", "FAKE_NEWS")
        .with_field("scenario", "SCENARIO1")
        .with_field("gender", "female")
}

fn fast(max_attempts: u32) -> PollerConfig {
    PollerConfig {
        interval: Duration::from_millis(10),
        max_attempts,
        ..PollerConfig::default()
    }
}

#[tokio::test]
async fn test_image_swap_tracked_to_playable_result() {
    let (server_url, upstream, _shutdown) = start(None).await;
    let provider = assert_ok!(HttpJobProvider::new(&server_url));
    let poller = JobPoller::new(Arc::new(provider), fast(60));

    let job = poller.submit(JobKind::FaceSwapImage, photo_payload()).await;
    assert_eq!(job.status(), JobStatus::Submitted);
    assert_eq!(job.job_id(), Some("T1"));
    assert_eq!(job.poll_attempt(), 0);

    // The photo went to the bucket and its landmarks into the swap request.
    let uploads = upstream.uploads.lock().unwrap().clone();
    assert_eq!(uploads.len(), 1);
    assert!(uploads[0].starts_with("user_uploads/") && uploads[0].ends_with(".png"));
    let swap = upstream.swap_requests.lock().unwrap()[0].clone();
    assert_eq!(swap["sourceImage"][0]["opts"], "10,10:20,10:15,20:15,30");
    assert!(swap["sourceImage"][0]["path"]
        .as_str()
        .unwrap()
        .ends_with(&uploads[0]));
    assert!(swap["targetImage"][0]["path"]
        .as_str()
        .unwrap()
        .ends_with("deepfake_scenario1_female.png"));

    // Running, then status 2 with a URL twice: trusted on the third check.
    let finished = poller.track(job).wait().await;
    assert_eq!(finished.status(), JobStatus::Succeeded);
    assert_eq!(finished.poll_attempt(), 3);
    assert_eq!(upstream.status_calls.load(Ordering::SeqCst), 3);

    let gateway = finished.gateway_url().unwrap();
    assert!(gateway.starts_with("/api/stream-video?url="));

    let response = reqwest::get(format!("{}{}", server_url, gateway))
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "video/mp4");
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
    assert_eq!(response.bytes().await.unwrap().as_ref(), MEDIA_BYTES);
}

#[tokio::test]
async fn test_provider_failure_code_ends_tracking() {
    let (server_url, upstream, _shutdown) = start(Some(4)).await;
    let provider = assert_ok!(HttpJobProvider::new(&server_url));
    let poller = JobPoller::new(Arc::new(provider), fast(60));

    let job = poller.submit(JobKind::FaceSwapImage, photo_payload()).await;
    let finished = poller.track(job).wait().await;

    assert_eq!(finished.status(), JobStatus::Failed);
    assert_eq!(finished.failure_kind(), Some(FailureKind::ProviderReportedFailure));
    assert_eq!(finished.poll_attempt(), 1);
    assert_eq!(upstream.status_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_stalled_job_times_out_at_attempt_budget() {
    let (server_url, upstream, _shutdown) = start(Some(1)).await;
    let provider = assert_ok!(HttpJobProvider::new(&server_url));
    let poller = JobPoller::new(Arc::new(provider), fast(5));

    let job = poller.submit(JobKind::FaceSwapImage, photo_payload()).await;
    let finished = poller.track(job).wait().await;

    assert_eq!(finished.status(), JobStatus::TimedOut);
    assert_eq!(finished.poll_attempt(), 5);
    assert_eq!(upstream.status_calls.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_rejected_submission_carries_server_detail() {
    let (server_url, _upstream, _shutdown) = start(None).await;
    let provider = assert_ok!(HttpJobProvider::new(&server_url));
    let poller = JobPoller::new(Arc::new(provider), fast(60));

    let payload = JobPayload::new(b"not an image".to_vec(), "notes.txt", "text/plain")
        .with_field("section", "FAKE_NEWS")
        .with_field("scenario", "SCENARIO1");
    let job = poller.submit(JobKind::FaceSwapImage, payload).await;

    assert_eq!(job.status(), JobStatus::Failed);
    assert_eq!(job.failure_kind(), Some(FailureKind::SubmissionRejected));
    assert!(job.failure_reason().unwrap().contains("upload an image"));
    assert!(job.job_id().is_none());
}
