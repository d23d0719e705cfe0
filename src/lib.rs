//! Scan progress tracking for the code-security dashboard
//!
//! This library polls the backend scan service for the progress of a scan
//! job, normalizes the two status payload shapes it serves, and publishes a
//! single "what is being scanned right now" view to every part of the
//! dashboard through [`services::coordinator::ScanCoordinator`].

pub mod app_state;
pub mod config;
pub mod models;
pub mod routes;
pub mod services;
