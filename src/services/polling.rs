//! Polling engine for a single scan job.
//!
//! Each session is one tokio task. It polls immediately, then sleeps
//! `interval` between ticks, and ends itself on the first terminal status,
//! on a failed tier-2 fetch, on its deadline, or when its handle is stopped.
//! Every suspension point is raced against the session's cancellation token,
//! so a stopped session never delivers a late result.

use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::models::job::{JobId, ScanState, ScanStatus};
use crate::services::normalize::normalize;
use crate::services::scan_api::ScanStatusSource;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);
pub const DEFAULT_MAX_POLL_DURATION: Duration = Duration::from_secs(30 * 60);

/// Reported when a failed scan carries no message of its own.
pub const DEFAULT_FAILURE_MESSAGE: &str = "Scan failed";

/// Shown to users instead of raw transport errors.
pub const CONNECTIVITY_MESSAGE: &str =
    "Unable to reach the scan service. Check your connection and try again.";

/// Timing rules for polling sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// Upper bound on a session's lifetime. `None` polls until a terminal state.
    pub max_duration: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_duration: Some(DEFAULT_MAX_POLL_DURATION),
        }
    }
}

/// Callbacks for one polling session.
///
/// `on_complete` and `on_error` are mutually exclusive and each fires at most
/// once; after either, the session is over.
pub trait PollObserver: Send + Sync + 'static {
    fn on_tick(&self, status: &ScanStatus);
    fn on_complete(&self, status: &ScanStatus);
    fn on_error(&self, error: &PollError);
}

/// Why a session ended without completing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PollError {
    /// The backend reported `Failed`. `status` is the final normalized status.
    #[error("scan failed: {message}")]
    ScanFailed {
        message: String,
        status: Box<ScanStatus>,
    },

    #[error("status request failed: {0}")]
    Transport(String),

    #[error("scan did not finish within {}s", .0.as_secs())]
    TimedOut(Duration),
}

impl PollError {
    /// Message suitable for an error banner.
    pub fn user_message(&self) -> String {
        match self {
            Self::ScanFailed { message, .. } => message.clone(),
            Self::Transport(_) => CONNECTIVITY_MESSAGE.to_string(),
            Self::TimedOut(limit) => format!(
                "The scan did not finish within {} seconds; stopped watching it.",
                limit.as_secs()
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StartError {
    #[error("poll interval must be greater than zero")]
    ZeroInterval,
}

/// Handle to a running (or finished) polling session.
pub struct PollHandle {
    job_id: JobId,
    session_id: Uuid,
    interval: Duration,
    cancel: CancellationToken,
    observer: Arc<dyn PollObserver>,
}

impl PollHandle {
    /// Stop the session. Idempotent, and safe after the session ended on its own.
    pub fn stop(&self) {
        if !self.cancel.is_cancelled() {
            tracing::debug!(job_id = %self.job_id, session_id = %self.session_id, "Stopping poll session");
        }
        self.cancel.cancel();
    }

    /// False once stopped or once the session reached a terminal condition.
    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl fmt::Debug for PollHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollHandle")
            .field("job_id", &self.job_id)
            .field("session_id", &self.session_id)
            .field("interval", &self.interval)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Starts polling sessions against a [`ScanStatusSource`].
#[derive(Clone)]
pub struct PollingEngine {
    source: Arc<dyn ScanStatusSource>,
    policy: PollPolicy,
}

impl PollingEngine {
    pub fn new(source: Arc<dyn ScanStatusSource>, policy: PollPolicy) -> Self {
        Self { source, policy }
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    /// Start polling `job_id` at the engine's default interval.
    ///
    /// Must be called from within a tokio runtime. The first poll runs
    /// immediately; later polls follow `interval` after the previous tick's
    /// callback returned.
    pub fn start(
        &self,
        job_id: JobId,
        observer: Arc<dyn PollObserver>,
    ) -> Result<PollHandle, StartError> {
        self.start_with_interval(job_id, self.policy.interval, observer)
    }

    pub fn start_with_interval(
        &self,
        job_id: JobId,
        interval: Duration,
        observer: Arc<dyn PollObserver>,
    ) -> Result<PollHandle, StartError> {
        if interval.is_zero() {
            return Err(StartError::ZeroInterval);
        }

        let handle = PollHandle {
            job_id: job_id.clone(),
            session_id: Uuid::new_v4(),
            interval,
            cancel: CancellationToken::new(),
            observer: Arc::clone(&observer),
        };

        tracing::info!(
            job_id = %job_id,
            session_id = %handle.session_id,
            interval_ms = interval.as_millis() as u64,
            "Starting poll session"
        );

        let session = PollSession {
            source: Arc::clone(&self.source),
            job_id,
            session_id: handle.session_id,
            interval,
            max_duration: self.policy.max_duration,
            cancel: handle.cancel.clone(),
            observer,
        };
        tokio::spawn(session.run());

        Ok(handle)
    }

    /// Stop `handle` and immediately poll the same job again with the same
    /// observer and interval.
    pub fn restart(&self, handle: &PollHandle) -> Result<PollHandle, StartError> {
        handle.stop();
        self.start_with_interval(
            handle.job_id.clone(),
            handle.interval,
            Arc::clone(&handle.observer),
        )
    }
}

impl fmt::Debug for PollingEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollingEngine")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

struct PollSession {
    source: Arc<dyn ScanStatusSource>,
    job_id: JobId,
    session_id: Uuid,
    interval: Duration,
    max_duration: Option<Duration>,
    cancel: CancellationToken,
    observer: Arc<dyn PollObserver>,
}

impl PollSession {
    async fn run(self) {
        // A limit too large to represent as an instant means no deadline.
        let deadline = self
            .max_duration
            .and_then(|limit| Instant::now().checked_add(limit));
        let mut ticks: u64 = 0;

        loop {
            let outcome = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::debug!(job_id = %self.job_id, session_id = %self.session_id, "Poll session cancelled mid-request");
                    return;
                }
                outcome = self.poll_once() => outcome,
            };

            if self.cancel.is_cancelled() {
                return;
            }
            ticks += 1;

            let status = match outcome {
                Ok(status) => status,
                Err(error) => {
                    self.cancel.cancel();
                    tracing::warn!(
                        job_id = %self.job_id,
                        session_id = %self.session_id,
                        ticks,
                        error = %error,
                        "Poll session ended on transport failure"
                    );
                    metrics::counter!("scan_sessions_failed_total").increment(1);
                    self.observer.on_error(&error);
                    return;
                }
            };

            match status.state {
                ScanState::Completed => {
                    self.cancel.cancel();
                    tracing::info!(
                        job_id = %self.job_id,
                        session_id = %self.session_id,
                        ticks,
                        findings = status.findings_count,
                        "Scan completed"
                    );
                    metrics::counter!("scan_sessions_completed_total").increment(1);
                    self.observer.on_complete(&status);
                    return;
                }
                ScanState::Failed => {
                    self.cancel.cancel();
                    let message = status
                        .error_message
                        .clone()
                        .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string());
                    tracing::info!(
                        job_id = %self.job_id,
                        session_id = %self.session_id,
                        ticks,
                        error = %message,
                        "Scan failed"
                    );
                    metrics::counter!("scan_sessions_failed_total").increment(1);
                    self.observer.on_error(&PollError::ScanFailed {
                        message,
                        status: Box::new(status),
                    });
                    return;
                }
                ScanState::Pending | ScanState::Running => {
                    tracing::debug!(
                        job_id = %self.job_id,
                        session_id = %self.session_id,
                        state = %status.state,
                        progress = status.progress,
                        "Scan progress"
                    );
                    self.observer.on_tick(&status);
                }
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return,
                _ = sleep(self.interval) => {}
            }

            if let (Some(deadline), Some(limit)) = (deadline, self.max_duration) {
                if Instant::now() >= deadline {
                    self.cancel.cancel();
                    tracing::warn!(
                        job_id = %self.job_id,
                        session_id = %self.session_id,
                        ticks,
                        limit_secs = limit.as_secs(),
                        "Scan did not reach a terminal state in time, giving up"
                    );
                    metrics::counter!("scan_sessions_failed_total").increment(1);
                    self.observer.on_error(&PollError::TimedOut(limit));
                    return;
                }
            }
        }
    }

    /// One tick: tier 1, falling back to tier 2 on any tier-1 failure.
    async fn poll_once(&self) -> Result<ScanStatus, PollError> {
        metrics::counter!("scan_polls_total").increment(1);

        let report = match self.source.fetch_progress(&self.job_id).await {
            Ok(report) => report,
            Err(tier1) => {
                tracing::debug!(
                    job_id = %self.job_id,
                    error = %tier1,
                    "Progress endpoint unavailable, falling back to status endpoint"
                );
                metrics::counter!("scan_poll_fallbacks_total").increment(1);
                self.source
                    .fetch_status(&self.job_id)
                    .await
                    .map_err(|tier2| PollError::Transport(tier2.to_string()))?
            }
        };

        Ok(normalize(&self.job_id, report, Utc::now()))
    }
}
