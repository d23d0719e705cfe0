use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum::{Display, EnumString};

/// Opaque identifier of a backend scan job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobId(String);

impl JobId {
    /// Build a job id, rejecting empty or whitespace-only input.
    pub fn new(raw: impl Into<String>) -> Result<Self, JobIdError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(JobIdError::Empty);
        }
        if trimmed.len() == raw.len() {
            Ok(Self(raw))
        } else {
            Ok(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for JobId {
    type Err = JobIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for JobId {
    type Error = JobIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<JobId> for String {
    fn from(id: JobId) -> Self {
        id.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobIdError {
    #[error("job id must not be empty")]
    Empty,
}

/// Canonical lifecycle state of a scan job.
///
/// Parsing is case-insensitive and accepts the aliases the backend has been
/// seen to emit (`processing`, `queued`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(ascii_case_insensitive)]
pub enum ScanState {
    #[strum(to_string = "pending", serialize = "queued")]
    Pending,
    #[strum(to_string = "running", serialize = "processing", serialize = "in_progress")]
    Running,
    #[strum(to_string = "completed", serialize = "complete")]
    Completed,
    #[strum(to_string = "failed", serialize = "error")]
    Failed,
}

impl ScanState {
    /// `Completed` or `Failed`; nothing follows a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// States during which the job is still considered in flight.
    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }
}

/// Which backend endpoint produced a status snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusSource {
    Progress,
    Status,
}

/// Normalized snapshot of a scan job's progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanStatus {
    pub id: JobId,
    pub state: ScanState,
    /// Percentage 0-100. A UI hint only.
    pub progress: u8,
    pub files_total: u64,
    pub files_processed: u64,
    pub findings_count: u64,
    pub current_file: Option<String>,
    pub elapsed_seconds: Option<f64>,
    pub estimated_remaining_seconds: Option<f64>,
    /// Only ever set when `state` is `Failed`.
    pub error_message: Option<String>,
    /// Raw stage or status label reported by the backend.
    pub stage: Option<String>,
    pub source: StatusSource,
}
