use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::search::QueryError;
use common::upload::UploadError;
use sea_orm::DbErr;
use serde::Serialize;

use crate::auth::{CredentialError, TokenError};
use crate::coordinator::CoordinatorError;
use crate::indexer::SearchError;
use crate::tracks::RepositoryError;

/// Structured error response returned by all endpoints on failure.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Machine-readable error code. One of: `VALIDATION_ERROR`, `TOKEN_MISSING`,
    /// `TOKEN_INVALID`, `INVALID_CREDENTIALS`, `PERMISSION_DENIED`, `NOT_FOUND`,
    /// `CONFLICT`, `UPSTREAM_FAILURE`, `UPSTREAM_TIMEOUT`, `INTERNAL_ERROR`.
    #[schema(example = "VALIDATION_ERROR")]
    pub code: &'static str,
    /// Human-readable error description.
    #[schema(example = "Title must be 1-256 characters")]
    pub message: String,
}

/// Application-level error type.
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    TokenMissing,
    TokenInvalid,
    InvalidCredentials,
    PermissionDenied,
    NotFound(String),
    Conflict(String),
    /// A backing store, the upload engine or the search index failed.
    Upstream(String),
    UpstreamTimeout(String),
    Internal(String),
}

impl AppError {
    fn status_and_body(self) -> (StatusCode, ErrorBody) {
        match self {
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "VALIDATION_ERROR",
                    message: msg,
                },
            ),
            AppError::TokenMissing => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    code: "TOKEN_MISSING",
                    message: "Authentication required".into(),
                },
            ),
            AppError::TokenInvalid => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    code: "TOKEN_INVALID",
                    message: "Invalid or expired token".into(),
                },
            ),
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    code: "INVALID_CREDENTIALS",
                    message: "Invalid name or password".into(),
                },
            ),
            AppError::PermissionDenied => (
                StatusCode::FORBIDDEN,
                ErrorBody {
                    code: "PERMISSION_DENIED",
                    message: "Only the owner may modify this track".into(),
                },
            ),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    code: "NOT_FOUND",
                    message: msg,
                },
            ),
            AppError::Conflict(msg) => (
                StatusCode::CONFLICT,
                ErrorBody {
                    code: "CONFLICT",
                    message: msg,
                },
            ),
            AppError::Upstream(detail) => {
                tracing::error!("Upstream failure: {}", detail);
                (
                    StatusCode::BAD_GATEWAY,
                    ErrorBody {
                        code: "UPSTREAM_FAILURE",
                        message: detail,
                    },
                )
            }
            AppError::UpstreamTimeout(detail) => {
                tracing::error!("Upstream timeout: {}", detail);
                (
                    StatusCode::GATEWAY_TIMEOUT,
                    ErrorBody {
                        code: "UPSTREAM_TIMEOUT",
                        message: detail,
                    },
                )
            }
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        code: "INTERNAL_ERROR",
                        message: "An unexpected error occurred".into(),
                    },
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        (status, Json(body)).into_response()
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        AppError::Upstream(format!("database error: {err}"))
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Signing(detail) => AppError::Internal(detail),
            TokenError::Invalid(_) => AppError::TokenInvalid,
        }
    }
}

impl From<CredentialError> for AppError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::Validation(msg) => AppError::Validation(msg),
            CredentialError::Conflict(_) => AppError::Conflict(err.to_string()),
            CredentialError::Unauthorized => AppError::InvalidCredentials,
            CredentialError::NotFound(id) => AppError::NotFound(format!("User {id} not found")),
            CredentialError::Hash(detail) => AppError::Internal(detail),
            CredentialError::Db(e) => AppError::from(e),
        }
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(id) => AppError::NotFound(format!("Track {id} not found")),
            RepositoryError::Conflict(msg) => AppError::Conflict(msg),
            RepositoryError::Store(_) | RepositoryError::PartialDelete { .. } => {
                AppError::Upstream(err.to_string())
            }
        }
    }
}

impl From<QueryError> for AppError {
    fn from(err: QueryError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<SearchError> for AppError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::Query(e) => AppError::from(e),
            other => AppError::Upstream(other.to_string()),
        }
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::NotFound(_) | UploadError::InvalidId(_) => {
                AppError::NotFound(err.to_string())
            }
            UploadError::SizeLimitExceeded { .. } | UploadError::LengthExceeded { .. } => {
                AppError::Validation(err.to_string())
            }
            UploadError::OffsetMismatch { .. } | UploadError::Incomplete { .. } => {
                AppError::Conflict(err.to_string())
            }
            UploadError::Io(_) => AppError::Upstream(err.to_string()),
        }
    }
}

impl From<CoordinatorError> for AppError {
    fn from(err: CoordinatorError) -> Self {
        match err {
            CoordinatorError::Transfer(e) => AppError::from(e),
            CoordinatorError::Metadata(e) => AppError::from(e),
            CoordinatorError::Timeout(_) => AppError::UpstreamTimeout(err.to_string()),
        }
    }
}
