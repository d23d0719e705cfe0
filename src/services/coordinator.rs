//! Tracks the one scan job the dashboard is currently watching.
//!
//! A single [`ScanCoordinator`] is owned by the application and shared with
//! every view that shows scan progress. It runs at most one polling session
//! and fans each status out through a `watch` channel, so all subscribers see
//! the same `Arc<ScanStatus>` for a given tick.

use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::watch;

use crate::models::job::{JobId, ScanStatus};
use crate::services::polling::{PollError, PollHandle, PollObserver, PollingEngine, StartError};

/// What presentation code observes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanSnapshot {
    pub current_job_id: Option<JobId>,
    pub scan_status: Option<Arc<ScanStatus>>,
    pub is_scanning: bool,
    pub scan_error: Option<String>,
}

pub struct ScanCoordinator {
    engine: PollingEngine,
    shared: Arc<Shared>,
}

struct Shared {
    inner: Mutex<Inner>,
    snapshot: watch::Sender<ScanSnapshot>,
}

#[derive(Default)]
struct Inner {
    /// Bumped whenever the tracked session changes; older observers go stale.
    generation: u64,
    session: Option<PollHandle>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_in_progress(&self) {
        let scanning = self.snapshot.borrow().is_scanning;
        metrics::gauge!("scan_in_progress").set(if scanning { 1.0 } else { 0.0 });
    }
}

impl ScanCoordinator {
    pub fn new(engine: PollingEngine) -> Self {
        let (snapshot, _) = watch::channel(ScanSnapshot::default());
        Self {
            engine,
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner::default()),
                snapshot,
            }),
        }
    }

    /// Start tracking `job_id`, superseding any other tracked job.
    ///
    /// Re-starting the job that is already being polled keeps its session and
    /// only clears the error.
    pub fn start_scan(&self, job_id: JobId) -> Result<(), StartError> {
        let mut inner = self.shared.lock();

        let already_polling = inner
            .session
            .as_ref()
            .is_some_and(|session| session.job_id() == &job_id && session.is_active());
        if already_polling {
            self.shared.snapshot.send_modify(|snapshot| {
                snapshot.is_scanning = true;
                snapshot.scan_error = None;
            });
            return Ok(());
        }

        if let Some(previous) = inner.session.take() {
            tracing::info!(
                previous_job_id = %previous.job_id(),
                job_id = %job_id,
                "Superseding tracked scan"
            );
            previous.stop();
        }

        inner.generation += 1;
        let observer = Arc::new(SessionObserver {
            generation: inner.generation,
            shared: Arc::downgrade(&self.shared),
        });

        let session = match self.engine.start(job_id.clone(), observer) {
            Ok(session) => session,
            Err(e) => {
                self.shared.snapshot.send_replace(ScanSnapshot::default());
                self.shared.record_in_progress();
                return Err(e);
            }
        };
        inner.session = Some(session);

        self.shared.snapshot.send_replace(ScanSnapshot {
            current_job_id: Some(job_id),
            scan_status: None,
            is_scanning: true,
            scan_error: None,
        });
        self.shared.record_in_progress();
        Ok(())
    }

    /// Forget the tracked job and stop its session.
    pub fn clear_scan(&self) {
        let mut inner = self.shared.lock();
        inner.generation += 1;
        if let Some(session) = inner.session.take() {
            session.stop();
        }
        self.shared.snapshot.send_replace(ScanSnapshot::default());
        self.shared.record_in_progress();
    }

    /// Dismiss the current error without touching job tracking.
    pub fn reset_error(&self) {
        let _inner = self.shared.lock();
        self.shared.snapshot.send_if_modified(|snapshot| snapshot.scan_error.take().is_some());
    }

    /// Poll the tracked job again from scratch, keeping the job association.
    /// Returns `Ok(false)` when no job is tracked.
    pub fn restart_scan(&self) -> Result<bool, StartError> {
        let mut inner = self.shared.lock();
        let Some(job_id) = self.shared.snapshot.borrow().current_job_id.clone() else {
            return Ok(false);
        };

        if let Some(previous) = inner.session.take() {
            previous.stop();
        }
        inner.generation += 1;
        let observer = Arc::new(SessionObserver {
            generation: inner.generation,
            shared: Arc::downgrade(&self.shared),
        });
        let session = self.engine.start(job_id.clone(), observer)?;
        inner.session = Some(session);

        tracing::info!(job_id = %job_id, "Restarted polling for tracked scan");
        self.shared.snapshot.send_modify(|snapshot| {
            snapshot.is_scanning = true;
            snapshot.scan_error = None;
        });
        self.shared.record_in_progress();
        Ok(true)
    }

    pub fn snapshot(&self) -> ScanSnapshot {
        self.shared.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ScanSnapshot> {
        self.shared.snapshot.subscribe()
    }

    pub fn is_scanning(&self) -> bool {
        self.shared.snapshot.borrow().is_scanning
    }

    /// Whether a polling session is currently live.
    pub fn has_active_session(&self) -> bool {
        self.shared
            .lock()
            .session
            .as_ref()
            .is_some_and(PollHandle::is_active)
    }
}

impl Drop for ScanCoordinator {
    fn drop(&mut self) {
        let mut inner = self.shared.lock();
        inner.generation += 1;
        if let Some(session) = inner.session.take() {
            session.stop();
        }
    }
}

impl fmt::Debug for ScanCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanCoordinator")
            .field("engine", &self.engine)
            .field("snapshot", &*self.shared.snapshot.borrow())
            .finish()
    }
}

/// Engine callbacks for one coordinator generation.
struct SessionObserver {
    generation: u64,
    shared: Weak<Shared>,
}

impl SessionObserver {
    fn publish(&self, terminal: bool, update: impl FnOnce(&mut ScanSnapshot)) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let mut inner = shared.lock();
        if inner.generation != self.generation {
            tracing::debug!(
                generation = self.generation,
                current = inner.generation,
                "Discarding update from superseded poll session"
            );
            return;
        }
        if terminal {
            inner.session = None;
        }
        shared.snapshot.send_modify(update);
        shared.record_in_progress();
    }
}

impl PollObserver for SessionObserver {
    fn on_tick(&self, status: &ScanStatus) {
        let status = Arc::new(status.clone());
        self.publish(false, |snapshot| {
            snapshot.is_scanning = status.state.is_active();
            snapshot.scan_status = Some(status);
        });
    }

    fn on_complete(&self, status: &ScanStatus) {
        let status = Arc::new(status.clone());
        self.publish(true, |snapshot| {
            snapshot.is_scanning = status.state.is_active();
            snapshot.scan_status = Some(status);
        });
    }

    fn on_error(&self, error: &PollError) {
        let message = error.user_message();
        let final_status = match error {
            PollError::ScanFailed { status, .. } => Some(Arc::new(ScanStatus::clone(status))),
            PollError::Transport(_) | PollError::TimedOut(_) => None,
        };
        self.publish(true, |snapshot| {
            snapshot.is_scanning = false;
            if let Some(status) = final_status {
                snapshot.scan_status = Some(status);
            }
            snapshot.scan_error = Some(message);
        });
    }
}
