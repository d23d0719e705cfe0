use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use scan_dashboard::{
    app_state::AppState,
    config::AppConfig,
    routes,
    services::{coordinator::ScanCoordinator, polling::PollingEngine, scan_api::ScanApiClient},
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing scan-dashboard server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);
    routes::metrics::describe();

    // Initialize scan service client
    tracing::info!(base_url = %config.scan_api_base_url, "Initializing scan service client");
    let scan_api = ScanApiClient::new(
        &config.scan_api_base_url,
        config.scan_api_token.clone(),
        config.request_timeout(),
    )
    .expect("Failed to initialize scan service client");
    let scan_api = Arc::new(scan_api);

    // One coordinator for the whole dashboard; every view observes it
    let policy = config.poll_policy();
    tracing::info!(
        interval_ms = policy.interval.as_millis() as u64,
        max_poll_secs = policy.max_duration.map(|d| d.as_secs()),
        "Configuring scan polling"
    );
    let engine = PollingEngine::new(scan_api.clone(), policy);
    let state = AppState::new(ScanCoordinator::new(engine), scan_api);

    let app = routes::router(state, Some(prometheus_handle))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(64 * 1024));

    tracing::info!("Starting scan-dashboard on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
