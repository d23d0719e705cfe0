//! Watch a single scan job until it finishes.
//!
//! Usage: `scan-watch <job-id>`
//!
//! Exits 0 when the scan completes, 1 when it fails or cannot be polled,
//! and 2 on bad usage.

use scan_dashboard::{
    config::AppConfig,
    models::job::{JobId, ScanStatus},
    services::{
        polling::{PollError, PollObserver, PollingEngine},
        scan_api::ScanApiClient,
    },
};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

enum Outcome {
    Completed(ScanStatus),
    Failed(PollError),
}

/// Forwards terminal events to `main`; ticks are only logged.
struct TerminalReporter {
    done: mpsc::UnboundedSender<Outcome>,
}

impl PollObserver for TerminalReporter {
    fn on_tick(&self, status: &ScanStatus) {
        tracing::info!(
            job_id = %status.id,
            state = %status.state,
            progress = status.progress,
            files_processed = status.files_processed,
            files_total = status.files_total,
            findings = status.findings_count,
            current_file = status.current_file.as_deref().unwrap_or("-"),
            "Scan in progress"
        );
    }

    fn on_complete(&self, status: &ScanStatus) {
        let _ = self.done.send(Outcome::Completed(status.clone()));
    }

    fn on_error(&self, error: &PollError) {
        let _ = self.done.send(Outcome::Failed(error.clone()));
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let job_id = match std::env::args().nth(1).map(JobId::new) {
        Some(Ok(job_id)) => job_id,
        Some(Err(e)) => {
            tracing::error!(error = %e, "Invalid job id");
            return ExitCode::from(2);
        }
        None => {
            tracing::error!("Usage: scan-watch <job-id>");
            return ExitCode::from(2);
        }
    };

    let config = AppConfig::from_env().expect("Failed to load configuration");
    let scan_api = ScanApiClient::new(
        &config.scan_api_base_url,
        config.scan_api_token.clone(),
        config.request_timeout(),
    )
    .expect("Failed to initialize scan service client");

    let engine = PollingEngine::new(Arc::new(scan_api), config.poll_policy());
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    let handle = engine
        .start(job_id.clone(), Arc::new(TerminalReporter { done: done_tx }))
        .expect("Failed to start polling");

    tracing::info!(job_id = %job_id, session_id = %handle.session_id(), "Watching scan");

    let outcome = tokio::select! {
        outcome = done_rx.recv() => outcome,
        _ = tokio::signal::ctrl_c() => {
            handle.stop();
            tracing::info!(job_id = %job_id, "Interrupted, stopped watching");
            return ExitCode::from(1);
        }
    };

    match outcome {
        Some(Outcome::Completed(status)) => {
            tracing::info!(
                job_id = %status.id,
                findings = status.findings_count,
                files = status.files_total,
                elapsed_secs = status.elapsed_seconds,
                "Scan completed"
            );
            ExitCode::SUCCESS
        }
        Some(Outcome::Failed(error)) => {
            tracing::error!(job_id = %job_id, error = %error, "{}", error.user_message());
            ExitCode::from(1)
        }
        None => ExitCode::from(1),
    }
}
