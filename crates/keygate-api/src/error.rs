//! API error handling
//!
//! Author: hephaex@gmail.com

use crate::auth::{AuthError, PasswordError, TokenError};
use axum::{
    extract::rejection::JsonRejection,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use keygate_core::DirectoryError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// API error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn unauthorized() -> Self {
        Self::new("UNAUTHORIZED", "Authentication required")
    }

    pub fn forbidden() -> Self {
        Self::new("FORBIDDEN", "Access denied")
    }

    pub fn internal_error() -> Self {
        Self::new("INTERNAL_ERROR", "Internal server error")
    }
}

/// Application error type
///
/// Every failure a handler can produce. The rendered body never carries
/// token sub-causes, directory internals or anything that tells an unknown
/// username apart from a wrong password.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Access denied")]
    Forbidden,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("User already exists")]
    AlreadyExists,

    #[error("User not found")]
    NotFound,

    #[error("{0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::AlreadyExists => StatusCode::CONFLICT,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> ApiError {
        match self {
            AppError::Unauthenticated => ApiError::unauthorized(),
            AppError::Forbidden => ApiError::forbidden(),
            AppError::InvalidCredentials => ApiError::new("INVALID_CREDENTIALS", self.to_string()),
            AppError::AlreadyExists => ApiError::new("ALREADY_EXISTS", self.to_string()),
            AppError::NotFound => ApiError::new("NOT_FOUND", self.to_string()),
            AppError::BadRequest(msg) => ApiError::new("BAD_REQUEST", msg.clone()),
            AppError::Internal(_) => ApiError::internal_error(),
            AppError::Database(_) => ApiError::new("DATABASE_ERROR", "Database operation failed"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Internal(details) | AppError::Database(details) = &self {
            tracing::error!(error = %details, "{}", self.body().message);
        }

        let status = self.status();
        let mut response = (status, Json(self.body())).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }

        response
    }
}

impl From<DirectoryError> for AppError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::AlreadyExists(_) => AppError::AlreadyExists,
            DirectoryError::NotFound => AppError::NotFound,
            DirectoryError::Database(msg) => AppError::Database(msg),
            DirectoryError::CorruptRecord(msg) => AppError::Internal(msg),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Unauthenticated(_) => AppError::Unauthenticated,
            AuthError::Forbidden { .. } => AppError::Forbidden,
        }
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Encoding(msg) => AppError::Internal(msg),
            TokenError::Malformed | TokenError::Expired | TokenError::InvalidSignature => {
                AppError::Unauthenticated
            }
        }
    }
}

impl From<PasswordError> for AppError {
    fn from(err: PasswordError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::BadRequest(format!("Validation failed: {err}"))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::UnauthenticatedReason;

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::InvalidCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::AlreadyExists.status(), StatusCode::CONFLICT);
        assert_eq!(AppError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::BadRequest("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Database("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_details_not_echoed() {
        let body = AppError::Database("relation \"accounts\" does not exist".into()).body();
        assert_eq!(body.message, "Database operation failed");
        assert!(body.details.is_none());

        let body = AppError::Internal("argon2 exploded".into()).body();
        assert_eq!(body.message, "Internal server error");
    }

    #[test]
    fn test_token_errors_collapse() {
        for err in [
            TokenError::Malformed,
            TokenError::Expired,
            TokenError::InvalidSignature,
        ] {
            assert!(matches!(AppError::from(err), AppError::Unauthenticated));
        }
    }

    #[test]
    fn test_directory_error_mapping() {
        assert!(matches!(
            AppError::from(DirectoryError::AlreadyExists("alice".into())),
            AppError::AlreadyExists
        ));
        assert!(matches!(
            AppError::from(DirectoryError::NotFound),
            AppError::NotFound
        ));
        assert!(matches!(
            AppError::from(DirectoryError::CorruptRecord("x".into())),
            AppError::Internal(_)
        ));
    }

    #[test]
    fn test_unauthorized_carries_challenge() {
        let response = AppError::from(AuthError::Unauthenticated(
            UnauthenticatedReason::MissingCredentials,
        ))
        .into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );
    }
}
