use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database Pool Error: {0}")]
    DbPool(#[from] r2d2::Error),

    #[error("Database Error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Json Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Initialization Failed: {0}")]
    Init(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Forbidden - Admin access required")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(String),

    #[error("Selection limit of {limit} photos reached")]
    QuotaExceeded { limit: usize },

    #[error("Selection has already been finalized")]
    Finalized,

    #[error("Select at least one photo before finalizing")]
    NothingSelected,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Rejected(String),
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::Unauthorized | Error::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Error::Forbidden => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::QuotaExceeded { .. } | Error::Finalized | Error::NothingSelected => {
                StatusCode::CONFLICT
            }
            Error::Validation(_) | Error::Rejected(_) => StatusCode::BAD_REQUEST,
            Error::Io(_)
            | Error::DbPool(_)
            | Error::Database(_)
            | Error::Json(_)
            | Error::Init(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// True when SQLite refused a write because of a UNIQUE/CHECK/FK constraint.
pub fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("Request failed: {self}");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
