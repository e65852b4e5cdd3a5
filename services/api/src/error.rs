//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service, and how core
//! port errors are presented to HTTP clients.

use crate::config::ConfigError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use study_aid_core::ports::PortError;
use tracing::error;
use utoipa::ToSchema;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

/// The JSON body of every error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    /// Machine-readable code, set for errors clients branch on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Machine-readable code sent with the daily-limit 403.
pub const LIMIT_EXCEEDED_CODE: &str = "LIMIT_EXCEEDED";

/// Wrapper that renders a `PortError` as an HTTP response.
#[derive(Debug)]
pub struct HttpError(pub PortError);

impl From<PortError> for HttpError {
    fn from(e: PortError) -> Self {
        Self(e)
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let plain = |status: StatusCode, error: &str| {
            (
                status,
                Json(ErrorBody {
                    error: error.to_string(),
                    code: None,
                    message: None,
                }),
            )
                .into_response()
        };

        match self.0 {
            PortError::LimitExceeded => (
                StatusCode::FORBIDDEN,
                Json(ErrorBody {
                    error: "Daily limit reached".to_string(),
                    code: Some(LIMIT_EXCEEDED_CODE.to_string()),
                    message: Some(format!(
                        "You've used all {} free explanations today. Upgrade to Premium for unlimited access!",
                        study_aid_core::DAILY_LIMIT
                    )),
                }),
            )
                .into_response(),
            PortError::RateLimited(_) => plain(
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests. Please try again in a moment.",
            ),
            PortError::PaymentRequired(_) => plain(
                StatusCode::PAYMENT_REQUIRED,
                "Service temporarily unavailable. Please try again later.",
            ),
            PortError::Transient(detail) => {
                error!("Upstream service unavailable: {}", detail);
                plain(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Service temporarily unavailable. Please try again later.",
                )
            }
            PortError::InvalidInput(detail) => plain(StatusCode::BAD_REQUEST, &detail),
            PortError::NotFound(detail) => plain(StatusCode::NOT_FOUND, &detail),
            PortError::Unauthorized => plain(StatusCode::UNAUTHORIZED, "Unauthorized"),
            PortError::MalformedOutput(detail) | PortError::Unexpected(detail) => {
                error!("Request failed: {}", detail);
                plain(StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong. Please try again.")
            }
        }
    }
}
