use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::{debug, error};

use crate::{
    auth::jwt::TokenError, response::ApiResponse, slips::repo_types::SlipStatus,
    store::StoreError,
};

/// Every failure a handler can return. Messages are what the client sees.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} already exists")]
    DuplicateKey(&'static str),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("{0}")]
    Unauthenticated(&'static str),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Slip is already {0}")]
    InvalidTransition(SlipStatus),

    #[error("You cannot change your own role")]
    SelfDemotionForbidden,

    #[error("You cannot delete your own account")]
    SelfDeletionForbidden,

    #[error("You cannot deactivate your own account")]
    SelfDeactivationForbidden,

    #[error("unavailable: {0:#}")]
    Unavailable(anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::DuplicateKey(_) | AppError::InvalidTransition(_) => StatusCode::CONFLICT,
            AppError::InvalidCredentials | AppError::Unauthenticated(_) => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Forbidden(_)
            | AppError::SelfDemotionForbidden
            | AppError::SelfDeletionForbidden
            | AppError::SelfDeactivationForbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    /// Store error mapper that names the missing entity on `NotFound`.
    pub fn store(entity: &'static str) -> impl FnOnce(StoreError) -> AppError {
        move |err| match err {
            StoreError::NotFound => AppError::NotFound(entity),
            other => other.into(),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateKey(field) => AppError::DuplicateKey(field),
            StoreError::NotFound => AppError::NotFound("Record"),
            StoreError::InvalidTransition(current) => AppError::InvalidTransition(current),
            StoreError::Unavailable(e) => AppError::Unavailable(e.into()),
            StoreError::Internal(e) => AppError::Unavailable(e),
        }
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Invalid => AppError::Unauthenticated("Invalid token"),
            TokenError::Expired => AppError::Unauthenticated("Token expired"),
            TokenError::Signing(e) => AppError::Unavailable(e.into()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        debug!(status = %rejection.status(), "json body rejected");
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        debug!(status = %rejection.status(), "path rejected");
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            AppError::Unavailable(e) => {
                error!(error = ?e, "request failed");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(ApiResponse::<()>::error(message))).into_response()
    }
}
