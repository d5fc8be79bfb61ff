//! Error types for authgate
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Application-wide error type
///
/// Every failure is terminal for the request that produced it; the
/// browser has to restart the login flow. Nothing here is retried.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or invalid configuration (500, fatal at startup)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unknown `{provider}` path segment (404)
    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// State mismatch, exchange failure or upstream timeout (401)
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// A health dependency is down (503 when returned directly)
    #[error("Dependency unhealthy: {0}")]
    DependencyUnhealthy(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl AppError {
    /// HTTP status and metric label for this error
    pub fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config"),
            AppError::UnsupportedProvider(_) => (StatusCode::NOT_FOUND, "unsupported_provider"),
            AppError::AuthenticationFailed(_) => {
                (StatusCode::UNAUTHORIZED, "authentication_failed")
            }
            AppError::DependencyUnhealthy(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "dependency_unhealthy")
            }
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Maps each error variant to appropriate HTTP status code
    /// and JSON error body. Internal details stay in the logs.
    fn into_response(self) -> Response {
        use axum::Json;

        let (status, error_type) = self.classify();
        let error_message = match &self {
            AppError::UnsupportedProvider(_) => self.to_string(),
            AppError::AuthenticationFailed(_) => "Authentication failed".to_string(),
            AppError::DependencyUnhealthy(_) => self.to_string(),
            AppError::Config(_) => "Server configuration error".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, error_type, "Request failed");
        } else {
            tracing::warn!(error = %self, error_type, "Request rejected");
        }

        crate::metrics::ERRORS_TOTAL
            .with_label_values(&[error_type])
            .inc();

        let body = Json(serde_json::json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
