use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::models::EntryId;

/// SQLSTATE for a unique constraint violation
const UNIQUE_VIOLATION: &str = "23505";

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Invalid category: {0}")]
    InvalidCategory(String),

    #[error("Movie already exists: {subject} for user: {owner}")]
    DuplicateEntry { owner: String, subject: String },

    #[error("Movie not found: {0}")]
    NotFound(EntryId),

    #[error("A movie cannot be compared with itself")]
    SelfComparison,

    #[error("Movies belong to different users: {0} and {1}")]
    CrossOwnerComparison(String, String),

    #[error("Rating {0} out of range (must be 0-5000)")]
    OutOfRange(f64),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Rating store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether the failure came from the store rather than the caller
    pub fn is_store_failure(&self) -> bool {
        matches!(self, AppError::StoreUnavailable(_))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::StoreUnavailable(err.to_string())
    }
}

/// Returns true when a sqlx error is a unique constraint violation
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(e) if e.code().as_deref() == Some(UNIQUE_VIOLATION)
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::DuplicateEntry { .. } => StatusCode::CONFLICT,
            AppError::InvalidCategory(_)
            | AppError::SelfComparison
            | AppError::CrossOwnerComparison(..)
            | AppError::OutOfRange(_)
            | AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
