use crate::logging::Logger;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;

/// Health check endpoint
/// Returns 200 OK if the service is running
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({
        "status": "healthy",
        "service": "readbook",
        "version": env!("CARGO_PKG_VERSION"),
    })))
}

/// Readiness check endpoint
/// Returns 503 once the log streams stop accepting records
pub async fn readiness_check(State(logger): State<Logger>) -> impl IntoResponse {
    let app = logger.app_stream();
    let access = logger.access_stream();
    let ready = app.is_accepting() && access.is_accepting();

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(json!({
        "status": if ready { "ready" } else { "draining" },
        "service": "readbook",
        "logging": {
            "application": {
                "threshold": app.threshold().to_string(),
                "dropped": app.stats().dropped,
                "write_errors": app.stats().write_errors,
            },
            "access": {
                "threshold": access.threshold().to_string(),
                "dropped": access.stats().dropped,
                "write_errors": access.stats().write_errors,
            },
        },
    })))
}
