//! Wire shapes returned by the backend scan service.
//!
//! Both status endpoints wrap their payload in the same `{ success, data }`
//! envelope but disagree on the payload itself. [`ParsedReport::from_slice`]
//! decides which schema a body carries instead of guessing from whichever
//! optional fields happen to be present.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Response envelope shared by every backend endpoint.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub message: Option<String>,
}

impl<T> Envelope<T> {
    /// Failure text carried by an unsuccessful envelope, if any.
    pub fn failure_text(&self) -> Option<&str> {
        self.error
            .as_deref()
            .or(self.message.as_deref())
            .filter(|text| !text.trim().is_empty())
    }
}

/// Rich payload from `GET /scans/progress/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressData {
    pub scan_id: Option<String>,
    pub stage: String,
    pub percentage: Option<f64>,
    pub total_files: Option<u64>,
    pub processed_files: Option<u64>,
    pub findings_count: Option<u64>,
    pub current_file: Option<String>,
    pub elapsed: Option<f64>,
    pub estimated_time_remaining: Option<f64>,
    pub error: Option<String>,
}

/// Coarse payload from `GET /scans/status/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusData {
    pub id: Option<String>,
    pub status: String,
    pub progress: Option<f64>,
    pub error: Option<String>,
    pub file_count: Option<u64>,
    pub processed_files: Option<u64>,
    pub current_file: Option<String>,
    pub findings_count: Option<u64>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// A successfully parsed status payload, tagged by schema.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusReport {
    Progress(ProgressData),
    Status(StatusData),
}

/// Outcome of parsing one response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedReport {
    Report(StatusReport),
    /// The backend answered `success: false`.
    Rejected(String),
    /// The body matched neither schema.
    Malformed(String),
}

impl ParsedReport {
    /// Parse a response body: rich progress schema first, then coarse status
    /// schema, then an explicit failure variant.
    pub fn from_slice(body: &[u8]) -> Self {
        let envelope: Envelope<serde_json::Value> = match serde_json::from_slice(body) {
            Ok(envelope) => envelope,
            Err(e) => return Self::Malformed(format!("invalid response envelope: {e}")),
        };

        if !envelope.success {
            let text = envelope
                .failure_text()
                .unwrap_or("scan service reported an unsuccessful request");
            return Self::Rejected(text.to_string());
        }

        let Some(data) = envelope.data else {
            return Self::Malformed("response carried no data".to_string());
        };

        if let Ok(progress) = ProgressData::deserialize(&data) {
            return Self::Report(StatusReport::Progress(progress));
        }

        match StatusData::deserialize(&data) {
            Ok(status) => Self::Report(StatusReport::Status(status)),
            Err(e) => Self::Malformed(format!(
                "payload matches neither the progress nor the status schema: {e}"
            )),
        }
    }
}

/// `data` of a successful `POST /scans`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedScan {
    pub scan_id: String,
}
