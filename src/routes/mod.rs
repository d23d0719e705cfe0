use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

use crate::app_state::AppState;
use crate::models::job::JobIdError;
use crate::models::requests::ErrorResponse;
use crate::services::polling::StartError;
use crate::services::scan_api::FetchError;

pub mod health;
pub mod metrics;
pub mod scan;

/// Dashboard API routes. `/metrics` is only mounted when a recorder handle is given.
pub fn router(state: AppState, prometheus: Option<Arc<PrometheusHandle>>) -> Router {
    let app = Router::new()
        .route("/health", get(health::health_check))
        .route(
            "/api/v1/scan",
            get(scan::get_scan).post(scan::start_scan).delete(scan::clear_scan),
        )
        .route("/api/v1/scan/repository", post(scan::submit_repository))
        .route("/api/v1/scan/restart", post(scan::restart_scan))
        .route("/api/v1/scan/error", delete(scan::reset_error))
        .with_state(state);

    match prometheus {
        Some(handle) => app.route(
            "/metrics",
            get(metrics::prometheus_metrics).with_state(handle),
        ),
        None => app,
    }
}

/// Errors surfaced by dashboard handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    Validation(#[from] garde::Report),

    #[error("invalid job id: {0}")]
    JobId(#[from] JobIdError),

    #[error("could not start polling: {0}")]
    Start(#[from] StartError),

    #[error("scan service error: {0}")]
    Upstream(#[from] FetchError),

    #[error("no scan is being tracked")]
    NotTracking,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Validation(_) | Self::JobId(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Upstream(FetchError::Rejected(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Start(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotTracking => StatusCode::NOT_FOUND,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
