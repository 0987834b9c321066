//! Request-level errors and the JSON error envelope

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::db::RepositoryError;

/// Common result type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised before a request reaches a domain service: caller identity,
/// body decoding, and storage failures outside any domain.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Authentication(_) => StatusCode::UNAUTHORIZED,
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
            Error::Repository(RepositoryError::AlreadyExists) => StatusCode::CONFLICT,
            Error::Repository(_) | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Authentication(_) => "AUTHENTICATION_ERROR",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::Repository(RepositoryError::NotFound) => "NOT_FOUND",
            Error::Repository(RepositoryError::AlreadyExists) => "CONFLICT",
            Error::Repository(_) => "STORAGE_ERROR",
            Error::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to show a client; storage details stay in the logs
    fn public_message(&self) -> String {
        match self.status_code() {
            StatusCode::INTERNAL_SERVER_ERROR => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Build the JSON error envelope shared by every Parley endpoint.
///
/// Domain crates with their own error enums render through this so clients
/// see one shape: `{"error": {"code": ..., "message": ...}}`.
pub fn error_response(status: StatusCode, code: &str, message: String) -> Response {
    let body = Json(json!({
        "error": {
            "code": code,
            "message": message,
        }
    }));

    (status, body).into_response()
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "Request failed");
        }

        error_response(status, self.error_code(), self.public_message())
    }
}
