use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

use crate::auth::{
    dto::ApiResponse,
    repo::StoreError,
    tokens::IssueError,
    validation::{FieldErrors, EMAIL_TAKEN},
};

/// Status used for rejected input. Kept at 403 for compatibility with
/// existing clients even though 422 is the usual choice.
pub const VALIDATION_STATUS: StatusCode = StatusCode::FORBIDDEN;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Validation Error!")]
    Validation(FieldErrors),

    /// Email claimed between validation and insert.
    #[error("email already registered")]
    Conflict,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Unauthenticated.")]
    Unauthenticated,

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => AuthError::Conflict,
            StoreError::Database(e) => AuthError::Internal(e.into()),
        }
    }
}

impl From<IssueError> for AuthError {
    fn from(err: IssueError) -> Self {
        match err {
            IssueError::Store(e) => e.into(),
            IssueError::Random(e) => AuthError::Internal(e),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AuthError::Validation(errors) => (
                VALIDATION_STATUS,
                ApiResponse::failed("Validation Error!", Some(errors)),
            ),
            AuthError::Conflict => {
                let errors = FieldErrors::from([("email".to_string(), vec![EMAIL_TAKEN.to_string()])]);
                (
                    VALIDATION_STATUS,
                    ApiResponse::failed("Validation Error!", Some(errors)),
                )
            }
            AuthError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                ApiResponse::failed("Invalid credentials", None),
            ),
            AuthError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                ApiResponse::failed("Unauthenticated.", None),
            ),
            AuthError::Internal(e) => {
                error!(error = ?e, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiResponse::failed("Server Error", None),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}
