use crate::logging::Reported;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Application error types
#[derive(Debug)]
pub enum AppError {
    /// Route or resource not found
    NotFound(String),
    /// Internal server error, not yet logged
    InternalError(String),
    /// Failure already written to the application log
    Reported(Reported),
}

/// Response extension marking an error the boundary still has to log
#[derive(Debug, Clone)]
pub struct UnloggedError(pub String);

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(msg) => write!(f, "Not found: {}", msg),
            Self::InternalError(msg) => write!(f, "Internal error: {}", msg),
            Self::Reported(r) => write!(f, "Internal error: {}", r),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::InternalError(_) | Self::Reported(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "message": error_message,
                "type": error_type_name(&self),
            }
        }));

        let mut response = (status, body).into_response();
        if let Self::InternalError(msg) = self {
            response.extensions_mut().insert(UnloggedError(msg));
        }
        response
    }
}

fn error_type_name(error: &AppError) -> &'static str {
    match error {
        AppError::NotFound(_) => "not_found",
        AppError::InternalError(_) | AppError::Reported(_) => "internal_error",
    }
}

impl From<Reported> for AppError {
    fn from(err: Reported) -> Self {
        Self::Reported(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::InternalError(err.to_string())
    }
}
