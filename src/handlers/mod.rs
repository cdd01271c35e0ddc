pub mod health;
pub mod metrics_handler;

use crate::error::AppError;
use crate::logging::Logger;
use axum::extract::FromRef;
use axum::http::Uri;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Shared state for all routes
#[derive(Clone, FromRef)]
pub struct AppState {
    pub logger: Logger,
    pub metrics: Arc<PrometheusHandle>,
}

/// Fallback for unknown routes
pub async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(uri.path().to_string())
}
