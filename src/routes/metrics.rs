use axum::extract::State;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Prometheus scrape endpoint, text exposition format.
pub async fn prometheus_metrics(State(handle): State<Arc<PrometheusHandle>>) -> impl IntoResponse {
    handle.render()
}

/// Register descriptions for the metrics recorded across the crate.
pub fn describe() {
    metrics::describe_counter!(
        "media_proxy_requests_total",
        "Media relay requests received"
    );
    metrics::describe_counter!(
        "media_proxy_upstream_errors_total",
        "Media relay requests whose upstream fetch failed"
    );
    metrics::describe_histogram!(
        "media_proxy_upstream_seconds",
        "Time until the upstream media host answered"
    );
    metrics::describe_counter!(
        "faceswap_jobs_submitted_total",
        "Face-swap jobs accepted by the provider"
    );
    metrics::describe_counter!(
        "faceswap_jobs_failed_total",
        "Face-swap submissions that failed"
    );
    metrics::describe_counter!(
        "tracked_jobs_terminal_total",
        "Tracked jobs reaching a terminal status"
    );
}
