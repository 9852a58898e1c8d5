use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::policy::DenyReason;
use crate::store::StoreError;

/// Every expected, recoverable-per-request failure in the service. Store
/// connectivity faults surface as opaque 500s; nothing here is process-fatal.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("{}", .0.message())]
    Permission(DenyReason),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("incorrect password")]
    IncorrectPassword,

    #[error("new password cannot be the same as the current one")]
    SamePassword,

    // Expired and malformed tokens are surfaced identically so the response
    // never tells an attacker which.
    #[error("could not validate credentials")]
    InvalidToken,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        ApiError::Conflict(msg.into())
    }
}

impl From<DenyReason> for ApiError {
    fn from(reason: DenyReason) -> Self {
        ApiError::Permission(reason)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            ApiError::Permission(reason) => (StatusCode::FORBIDDEN, reason.message().to_string()),
            ApiError::InvalidCredentials => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::IncorrectPassword | ApiError::SamePassword => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            ApiError::InvalidToken => (StatusCode::UNAUTHORIZED, self.to_string()),
            // Uniqueness races that slip past the lifecycle check surface as
            // the same conflict the check itself would have produced.
            ApiError::Store(StoreError::UniqueViolation { .. }) => {
                (StatusCode::CONFLICT, "value already exists".to_string())
            }
            ApiError::Store(e) => {
                error!(error = %e, "store fault");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
            ApiError::Internal(e) => {
                error!(error = %e, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_follows_taxonomy() {
        let cases = [
            (ApiError::validation("bad email"), StatusCode::BAD_REQUEST),
            (ApiError::NotFound("user"), StatusCode::NOT_FOUND),
            (ApiError::conflict("email taken"), StatusCode::CONFLICT),
            (
                ApiError::Permission(DenyReason::NotOwner),
                StatusCode::FORBIDDEN,
            ),
            (ApiError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (ApiError::IncorrectPassword, StatusCode::BAD_REQUEST),
            (ApiError::SamePassword, StatusCode::BAD_REQUEST),
            (ApiError::InvalidToken, StatusCode::UNAUTHORIZED),
            (
                ApiError::Store(StoreError::UniqueViolation {
                    collection: "users",
                    field: "email",
                }),
                StatusCode::CONFLICT,
            ),
            (
                ApiError::Internal(anyhow::anyhow!("boom")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
