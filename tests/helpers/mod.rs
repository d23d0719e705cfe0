//! Test helpers: a scripted in-memory scan service and a recording observer.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

use scan_dashboard::models::job::{JobId, ScanStatus};
use scan_dashboard::models::payload::{ProgressData, StatusData, StatusReport};
use scan_dashboard::services::polling::{PollError, PollObserver};
use scan_dashboard::services::scan_api::{FetchError, ScanStatusSource};

/// One scripted response.
#[derive(Clone)]
pub enum Step {
    Report(StatusReport),
    /// Non-2xx answer.
    Http(u16),
    /// `success: false`.
    Rejected(String),
    /// Body matching neither schema.
    Malformed,
    /// Wait for the notify before answering with the inner step.
    Gated(Arc<Notify>, Box<Step>),
}

#[derive(Default)]
struct Script {
    steps: VecDeque<Step>,
    calls: AtomicUsize,
}

impl Script {
    /// Pop the next step; the last one repeats forever.
    fn next(&mut self) -> Option<Step> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.steps.len() > 1 {
            self.steps.pop_front()
        } else {
            self.steps.front().cloned()
        }
    }
}

/// Tier 1 / tier 2 responses scripted per job id.
#[derive(Default)]
pub struct ScriptedSource {
    progress: Mutex<HashMap<String, Script>>,
    status: Mutex<HashMap<String, Script>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_progress(self, job: &str, steps: Vec<Step>) -> Self {
        self.progress.lock().unwrap().insert(
            job.to_string(),
            Script {
                steps: steps.into(),
                calls: AtomicUsize::new(0),
            },
        );
        self
    }

    pub fn with_status(self, job: &str, steps: Vec<Step>) -> Self {
        self.status.lock().unwrap().insert(
            job.to_string(),
            Script {
                steps: steps.into(),
                calls: AtomicUsize::new(0),
            },
        );
        self
    }

    pub fn progress_calls(&self, job: &str) -> usize {
        calls(&self.progress, job)
    }

    pub fn status_calls(&self, job: &str) -> usize {
        calls(&self.status, job)
    }

    pub fn total_calls(&self, job: &str) -> usize {
        self.progress_calls(job) + self.status_calls(job)
    }
}

fn calls(scripts: &Mutex<HashMap<String, Script>>, job: &str) -> usize {
    scripts
        .lock()
        .unwrap()
        .get(job)
        .map(|s| s.calls.load(Ordering::SeqCst))
        .unwrap_or(0)
}

fn next_step(scripts: &Mutex<HashMap<String, Script>>, job: &JobId) -> Option<Step> {
    let mut scripts = scripts.lock().unwrap();
    let script = scripts.entry(job.to_string()).or_default();
    script.next()
}

async fn play(step: Option<Step>) -> Result<StatusReport, FetchError> {
    let mut step = step;
    loop {
        match step {
            None => {
                return Err(FetchError::Http {
                    status: 404,
                    message: None,
                })
            }
            Some(Step::Report(report)) => return Ok(report),
            Some(Step::Http(status)) => {
                return Err(FetchError::Http {
                    status,
                    message: None,
                })
            }
            Some(Step::Rejected(text)) => return Err(FetchError::Rejected(text)),
            Some(Step::Malformed) => {
                return Err(FetchError::Malformed("unexpected body".to_string()))
            }
            Some(Step::Gated(gate, inner)) => {
                gate.notified().await;
                step = Some(*inner);
            }
        }
    }
}

#[async_trait]
impl ScanStatusSource for ScriptedSource {
    async fn fetch_progress(&self, job_id: &JobId) -> Result<StatusReport, FetchError> {
        let step = next_step(&self.progress, job_id);
        play(step).await
    }

    async fn fetch_status(&self, job_id: &JobId) -> Result<StatusReport, FetchError> {
        let step = next_step(&self.status, job_id);
        play(step).await
    }
}

/// Rich progress payload.
pub fn progress(stage: &str, percentage: f64, findings: u64) -> Step {
    Step::Report(StatusReport::Progress(ProgressData {
        scan_id: None,
        stage: stage.to_string(),
        percentage: Some(percentage),
        total_files: Some(20),
        processed_files: Some((percentage / 5.0) as u64),
        findings_count: Some(findings),
        current_file: Some("src/app.js".to_string()),
        elapsed: Some(1.0),
        estimated_time_remaining: Some(10.0),
        error: None,
    }))
}

/// Coarse status payload.
pub fn status(raw: &str, error: Option<&str>) -> Step {
    Step::Report(StatusReport::Status(StatusData {
        id: None,
        status: raw.to_string(),
        progress: None,
        error: error.map(str::to_string),
        file_count: Some(8),
        processed_files: None,
        current_file: None,
        findings_count: Some(0),
        started_at: None,
        finished_at: None,
    }))
}

pub fn gated(gate: &Arc<Notify>, step: Step) -> Step {
    Step::Gated(Arc::clone(gate), Box::new(step))
}

pub fn job(id: &str) -> JobId {
    JobId::new(id).unwrap()
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Tick(ScanStatus),
    Complete(ScanStatus),
    Error(PollError),
}

/// Records every callback in order.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<Event>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn ticks(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Tick(_)))
            .count()
    }

    pub fn terminal_events(&self) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| !matches!(e, Event::Tick(_)))
            .collect()
    }
}

impl PollObserver for RecordingObserver {
    fn on_tick(&self, status: &ScanStatus) {
        self.events.lock().unwrap().push(Event::Tick(status.clone()));
    }

    fn on_complete(&self, status: &ScanStatus) {
        self.events
            .lock()
            .unwrap()
            .push(Event::Complete(status.clone()));
    }

    fn on_error(&self, error: &PollError) {
        self.events.lock().unwrap().push(Event::Error(error.clone()));
    }
}

/// Let spawned sessions run without reaching the next poll interval.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
