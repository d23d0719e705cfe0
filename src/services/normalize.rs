//! Maps either backend payload onto the single [`ScanStatus`] shape.

use chrono::{DateTime, Utc};

use crate::models::job::{JobId, ScanState, ScanStatus, StatusSource};
use crate::models::payload::{ProgressData, StatusData, StatusReport};

/// Normalize a parsed report for `job_id`. `now` closes the elapsed-time
/// window for jobs that report a start time but no finish time.
pub fn normalize(job_id: &JobId, report: StatusReport, now: DateTime<Utc>) -> ScanStatus {
    match report {
        StatusReport::Progress(data) => from_progress(job_id, data),
        StatusReport::Status(data) => from_status(job_id, data, now),
    }
}

fn from_progress(job_id: &JobId, data: ProgressData) -> ScanStatus {
    // Any stage other than the known states is a running phase ("analyzing", "parsing", ...).
    let state = data.stage.parse::<ScanState>().unwrap_or(ScanState::Running);
    let error_message = failure_text(state, data.error);

    ScanStatus {
        id: job_id.clone(),
        state,
        progress: percentage(state, data.percentage),
        files_total: data.total_files.unwrap_or(0),
        files_processed: data.processed_files.unwrap_or(0),
        findings_count: data.findings_count.unwrap_or(0),
        current_file: data.current_file,
        elapsed_seconds: non_negative(data.elapsed),
        estimated_remaining_seconds: non_negative(data.estimated_time_remaining),
        error_message,
        stage: Some(data.stage),
        source: StatusSource::Progress,
    }
}

fn from_status(job_id: &JobId, data: StatusData, now: DateTime<Utc>) -> ScanStatus {
    let state = match data.status.parse::<ScanState>() {
        Ok(state) => state,
        Err(_) => {
            tracing::warn!(
                job_id = %job_id,
                status = %data.status,
                "Unrecognized scan status, treating job as running"
            );
            metrics::counter!("scan_status_unrecognized_total").increment(1);
            ScanState::Running
        }
    };

    let elapsed_seconds = data.started_at.map(|started| {
        let end = data.finished_at.unwrap_or(now);
        (end - started).num_milliseconds().max(0) as f64 / 1000.0
    });

    ScanStatus {
        id: job_id.clone(),
        state,
        progress: percentage(state, data.progress),
        files_total: data.file_count.unwrap_or(0),
        files_processed: data.processed_files.unwrap_or(0),
        findings_count: data.findings_count.unwrap_or(0),
        current_file: data.current_file,
        elapsed_seconds,
        estimated_remaining_seconds: None,
        error_message: failure_text(state, data.error),
        stage: Some(data.status),
        source: StatusSource::Status,
    }
}

fn percentage(state: ScanState, reported: Option<f64>) -> u8 {
    match reported {
        Some(value) if value.is_finite() => value.clamp(0.0, 100.0).round() as u8,
        _ if state == ScanState::Completed => 100,
        _ => 0,
    }
}

fn non_negative(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v >= 0.0)
}

fn failure_text(state: ScanState, error: Option<String>) -> Option<String> {
    if state != ScanState::Failed {
        return None;
    }
    error.filter(|text| !text.trim().is_empty())
}
