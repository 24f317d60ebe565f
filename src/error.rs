use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// API error taxonomy surfaced to clients as 4xx responses with a stable
/// machine-readable kind.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Email already registered")]
    EmailTaken,
    #[error("Incorrect email or password")]
    InvalidCredentials,
    #[error("Invalid or expired token")]
    InvalidOrExpiredToken,
    #[error("User not found")]
    UserNotFound,
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::EmailTaken => "email_taken",
            ApiError::InvalidCredentials => "invalid_credentials",
            ApiError::InvalidOrExpiredToken => "invalid_or_expired_token",
            ApiError::UserNotFound => "user_not_found",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::NotFound(_) => "not_found",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::EmailTaken | ApiError::InvalidOrExpiredToken | ApiError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::InvalidCredentials | ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::UserNotFound | ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let message = match &self {
            ApiError::Internal(e) => {
                error!(error = %e, "internal server error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        let body = ErrorBody {
            error: self.kind(),
            message,
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Wrap any lower-level failure as an internal error.
pub fn internal<E: Into<anyhow::Error>>(e: E) -> ApiError {
    ApiError::Internal(e.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        assert_eq!(ApiError::EmailTaken.kind(), "email_taken");
        assert_eq!(ApiError::InvalidCredentials.kind(), "invalid_credentials");
        assert_eq!(
            ApiError::InvalidOrExpiredToken.kind(),
            "invalid_or_expired_token"
        );
        assert_eq!(ApiError::UserNotFound.kind(), "user_not_found");
    }

    #[test]
    fn statuses_match_contract() {
        assert_eq!(ApiError::EmailTaken.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::InvalidCredentials.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::InvalidOrExpiredToken.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::UserNotFound.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn unknown_email_and_bad_password_share_one_error() {
        // Both login failure paths fold into the same opaque kind
        let a = ApiError::InvalidCredentials;
        let b = ApiError::InvalidCredentials;
        assert_eq!(a.kind(), b.kind());
        assert_eq!(a.to_string(), b.to_string());
    }

    #[test]
    fn error_body_serializes_kind_and_message() {
        let body = ErrorBody {
            error: ApiError::EmailTaken.kind(),
            message: ApiError::EmailTaken.to_string(),
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("email_taken"));
        assert!(json.contains("Email already registered"));
    }
}
