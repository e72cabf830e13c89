//! Test helper utilities: throwaway upstream servers and request builders.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::Router;
use deepfake_awareness::{app_state::AppState, config::AppConfig, routes};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Smallest byte prefix `image::guess_format` recognizes as PNG.
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

const BOUNDARY: &str = "XTESTBOUNDARYX";

/// Bind a local port for a mock upstream. Returns the listener and its base URL.
pub async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, format!("http://127.0.0.1:{}", addr.port()))
}

/// Serve `app` on `listener` until the returned sender is dropped or fired.
pub fn serve(listener: TcpListener, app: Router) -> oneshot::Sender<()> {
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
            .unwrap();
    });

    shutdown_tx
}

/// Bind and serve in one step.
pub async fn spawn_upstream(app: Router) -> (String, oneshot::Sender<()>) {
    let (listener, base_url) = bind().await;
    (base_url, serve(listener, app))
}

/// Base URL of a port nothing listens on.
pub async fn closed_port() -> String {
    let (listener, base_url) = bind().await;
    drop(listener);
    base_url
}

/// Config with every outbound integration pointed at unreachable defaults.
pub fn test_config() -> AppConfig {
    AppConfig {
        speech_backend_url: "http://127.0.0.1:9".to_string(),
        ..AppConfig::default()
    }
}

/// Application router built the way `main` builds it.
pub fn app(config: &AppConfig) -> Router {
    let state = AppState::from_config(config).unwrap();
    routes::router(state, config)
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

/// Relay URL for `remote`, as the browser would request it.
pub fn stream_uri(remote: &str) -> String {
    format!("/api/stream-video?url={}", urlencoding::encode(remote))
}

/// One multipart part: field name, optional file name, content.
pub struct FormPart<'a> {
    pub name: &'a str,
    pub file_name: Option<&'a str>,
    pub data: &'a [u8],
}

impl<'a> FormPart<'a> {
    pub fn text(name: &'a str, value: &'a str) -> Self {
        Self {
            name,
            file_name: None,
            data: value.as_bytes(),
        }
    }

    pub fn file(name: &'a str, file_name: &'a str, data: &'a [u8]) -> Self {
        Self {
            name,
            file_name: Some(file_name),
            data,
        }
    }
}

/// POST `uri` with a hand-built multipart body.
pub fn multipart_request(uri: &str, parts: &[FormPart<'_>]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part.file_name {
            Some(file_name) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                        part.name, file_name
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
            }
            None => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", part.name)
                        .as_bytes(),
                );
            }
        }
        body.extend_from_slice(part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}
