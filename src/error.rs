use axum::{http::StatusCode, response::IntoResponse, Json};
use thiserror::Error;

use crate::challenge::ChallengeType;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Scrape(#[from] ScrapeError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Timed out: {0}")]
    Timeout(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Failures surfaced by `scrape(url)`. Validation variants are never retried.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),

    #[error("Only HTTP and HTTPS URLs are supported (got {0})")]
    UnsupportedProtocol(String),

    #[error("Domain {0} is not supported. Please contact support to add this website.")]
    UnsupportedDomain(String),

    #[error("Fetch failed after {attempts} attempt(s): {reason}")]
    FetchFailed { attempts: u32, reason: String },

    #[error("Blocked by {kind} challenge after {attempts} attempt(s)")]
    ChallengeBlocked { kind: ChallengeType, attempts: u32 },
}

impl ScrapeError {
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ScrapeError::InvalidUrl(_)
                | ScrapeError::UnsupportedProtocol(_)
                | ScrapeError::UnsupportedDomain(_)
        )
    }

    fn status(&self) -> StatusCode {
        match self {
            ScrapeError::InvalidUrl(_)
            | ScrapeError::UnsupportedProtocol(_)
            | ScrapeError::UnsupportedDomain(_) => StatusCode::BAD_REQUEST,
            ScrapeError::FetchFailed { .. } => StatusCode::BAD_GATEWAY,
            ScrapeError::ChallengeBlocked { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::Scrape(e) => e.status(),
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) | AppError::Json(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Database(_) | AppError::Migration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
