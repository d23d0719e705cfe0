use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// GET /metrics: poll and session counters in Prometheus text format.
pub async fn prometheus_metrics(State(handle): State<Arc<PrometheusHandle>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    )
}

/// Register descriptions for every metric the service emits.
pub fn describe() {
    ::metrics::describe_counter!("scan_polls_total", "Status poll ticks issued");
    ::metrics::describe_counter!(
        "scan_poll_fallbacks_total",
        "Ticks where the progress endpoint failed and the status endpoint was used"
    );
    ::metrics::describe_counter!(
        "scan_status_unrecognized_total",
        "Status strings that did not map to a known scan state"
    );
    ::metrics::describe_counter!(
        "scan_sessions_completed_total",
        "Poll sessions that observed a completed scan"
    );
    ::metrics::describe_counter!(
        "scan_sessions_failed_total",
        "Poll sessions that ended on a failed scan, transport error, or deadline"
    );
    ::metrics::describe_gauge!("scan_in_progress", "1 while the dashboard tracks a running scan");
}
