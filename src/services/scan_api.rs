use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use std::time::Duration;

use crate::models::job::{JobId, JobIdError};
use crate::models::payload::{Envelope, ParsedReport, StatusReport, SubmittedScan};
use crate::models::requests::SubmitScanBody;

/// Source of raw status reports for a scan job.
///
/// The polling engine only talks to the backend through this seam, so tests
/// can script responses without a network.
#[async_trait]
pub trait ScanStatusSource: Send + Sync + 'static {
    /// Tier 1: detailed progress endpoint.
    async fn fetch_progress(&self, job_id: &JobId) -> Result<StatusReport, FetchError>;

    /// Tier 2: coarse status endpoint.
    async fn fetch_status(&self, job_id: &JobId) -> Result<StatusReport, FetchError>;
}

/// HTTP client for the backend scan service.
pub struct ScanApiClient {
    http: Client,
    base_url: Url,
    api_token: Option<String>,
}

impl ScanApiClient {
    pub fn new(
        base_url: &str,
        api_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let base_url =
            Url::parse(base_url).map_err(|e| FetchError::BaseUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(FetchError::BaseUrl(base_url.to_string()));
        }

        let http = Client::builder()
            .user_agent(concat!("scan-dashboard/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            base_url,
            api_token,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Submit a repository URL for scanning and return the issued job id.
    pub async fn submit_repository(&self, repository_url: &str) -> Result<JobId, FetchError> {
        let url = self.endpoint(&["scans"])?;
        let response = self
            .authorize(self.http.post(url))
            .json(&SubmitScanBody { repository_url })
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            return Err(http_error(status.as_u16(), &body));
        }

        let envelope: Envelope<SubmittedScan> = serde_json::from_slice(&body)
            .map_err(|e| FetchError::Malformed(format!("invalid submit response: {e}")))?;
        if !envelope.success {
            let text = envelope.failure_text().unwrap_or("scan submission was rejected");
            return Err(FetchError::Rejected(text.to_string()));
        }
        let submitted = envelope
            .data
            .ok_or_else(|| FetchError::Malformed("submit response carried no data".to_string()))?;

        JobId::new(submitted.scan_id).map_err(FetchError::JobId)
    }

    /// Check backend reachability (for health checks).
    pub async fn health_check(&self) -> Result<(), FetchError> {
        let url = self.endpoint(&["health"])?;
        let response = self.authorize(self.http.get(url)).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(FetchError::Http {
                status: status.as_u16(),
                message: None,
            })
        }
    }

    async fn get_report(&self, url: Url) -> Result<StatusReport, FetchError> {
        let response = self.authorize(self.http.get(url)).send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        report_from_response(status, &body)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Join path segments onto the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, FetchError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::BaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl ScanStatusSource for ScanApiClient {
    async fn fetch_progress(&self, job_id: &JobId) -> Result<StatusReport, FetchError> {
        let url = self.endpoint(&["scans", "progress", job_id.as_str()])?;
        self.get_report(url).await
    }

    async fn fetch_status(&self, job_id: &JobId) -> Result<StatusReport, FetchError> {
        let url = self.endpoint(&["scans", "status", job_id.as_str()])?;
        self.get_report(url).await
    }
}

/// Non-2xx is an HTTP error; a 2xx body is parsed into a report, and
/// `success:false` or an unparseable body become distinct errors.
fn report_from_response(status: StatusCode, body: &[u8]) -> Result<StatusReport, FetchError> {
    if !status.is_success() {
        return Err(http_error(status.as_u16(), body));
    }

    match ParsedReport::from_slice(body) {
        ParsedReport::Report(report) => Ok(report),
        ParsedReport::Rejected(text) => Err(FetchError::Rejected(text)),
        ParsedReport::Malformed(reason) => Err(FetchError::Malformed(reason)),
    }
}

/// Build an HTTP error, keeping the backend's failure text when the body has one.
fn http_error(status: u16, body: &[u8]) -> FetchError {
    let message = match ParsedReport::from_slice(body) {
        ParsedReport::Rejected(text) => Some(text),
        _ => None,
    };
    FetchError::Http { status, message }
}

fn detail(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|m| format!(": {m}"))
        .unwrap_or_default()
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("scan service returned HTTP {status}{}", detail(.message))]
    Http { status: u16, message: Option<String> },

    #[error("scan service rejected the request: {0}")]
    Rejected(String),

    #[error("unexpected response from scan service: {0}")]
    Malformed(String),

    #[error("invalid scan service base URL: {0}")]
    BaseUrl(String),

    #[error("scan service issued an invalid job id: {0}")]
    JobId(#[from] JobIdError),
}
