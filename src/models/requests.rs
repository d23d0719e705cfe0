use garde::Validate;
use serde::{Deserialize, Serialize};

/// Request to start tracking an already-issued scan job.
#[derive(Debug, Deserialize, Validate)]
pub struct StartScanRequest {
    #[garde(length(min = 1, max = 256))]
    pub job_id: String,
}

/// Request to submit a repository URL for scanning.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitRepositoryRequest {
    #[garde(length(min = 1, max = 2048), custom(not_blank))]
    pub repository_url: String,
}

fn not_blank(value: &str, _context: &()) -> garde::Result {
    if value.trim().is_empty() {
        return Err(garde::Error::new("must not be blank"));
    }
    Ok(())
}

/// Body for `POST /scans` on the backend.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitScanBody<'a> {
    pub repository_url: &'a str,
}

/// Error body returned by dashboard endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
