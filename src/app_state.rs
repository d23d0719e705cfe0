use std::sync::Arc;

use crate::services::{coordinator::ScanCoordinator, scan_api::ScanApiClient};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<ScanCoordinator>,
    pub scan_api: Arc<ScanApiClient>,
}

impl AppState {
    pub fn new(coordinator: ScanCoordinator, scan_api: Arc<ScanApiClient>) -> Self {
        Self {
            coordinator: Arc::new(coordinator),
            scan_api,
        }
    }
}
