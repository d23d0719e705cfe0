use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use garde::Validate;

use crate::app_state::AppState;
use crate::models::job::JobId;
use crate::models::requests::{StartScanRequest, SubmitRepositoryRequest};
use crate::routes::ApiError;
use crate::services::coordinator::ScanSnapshot;

/// GET /api/v1/scan: current job, status, and error as one snapshot.
pub async fn get_scan(State(state): State<AppState>) -> Json<ScanSnapshot> {
    Json(state.coordinator.snapshot())
}

/// POST /api/v1/scan: start tracking an existing job.
pub async fn start_scan(
    State(state): State<AppState>,
    Json(request): Json<StartScanRequest>,
) -> Result<(StatusCode, Json<ScanSnapshot>), ApiError> {
    request.validate()?;
    let job_id = JobId::new(request.job_id)?;

    state.coordinator.start_scan(job_id)?;

    Ok((StatusCode::ACCEPTED, Json(state.coordinator.snapshot())))
}

/// POST /api/v1/scan/repository: submit a repository and track the new job.
pub async fn submit_repository(
    State(state): State<AppState>,
    Json(request): Json<SubmitRepositoryRequest>,
) -> Result<(StatusCode, Json<ScanSnapshot>), ApiError> {
    request.validate()?;

    let job_id = state
        .scan_api
        .submit_repository(request.repository_url.trim())
        .await?;
    tracing::info!(job_id = %job_id, "Repository submitted for scanning");

    state.coordinator.start_scan(job_id)?;

    Ok((StatusCode::ACCEPTED, Json(state.coordinator.snapshot())))
}

/// POST /api/v1/scan/restart: poll the tracked job again from scratch.
pub async fn restart_scan(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<ScanSnapshot>), ApiError> {
    if !state.coordinator.restart_scan()? {
        return Err(ApiError::NotTracking);
    }
    Ok((StatusCode::ACCEPTED, Json(state.coordinator.snapshot())))
}

/// DELETE /api/v1/scan: stop tracking the current job.
pub async fn clear_scan(State(state): State<AppState>) -> Json<ScanSnapshot> {
    state.coordinator.clear_scan();
    Json(state.coordinator.snapshot())
}

/// DELETE /api/v1/scan/error: dismiss the error banner.
pub async fn reset_error(State(state): State<AppState>) -> Json<ScanSnapshot> {
    state.coordinator.reset_error();
    Json(state.coordinator.snapshot())
}
