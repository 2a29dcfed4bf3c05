/**
 * Errors
 * Backend, auth and HTTP error types
 */
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::carousel::CarouselError;
use crate::content::ValidationError;

/// Failures of the content backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("{0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("backend call timed out")]
    Timeout,
}

/// Failures while resolving who is signed in and what they may do.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid or expired token")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("authorization lookup failed: {0}")]
    Lookup(#[from] StoreError),

    #[error("session resolution timed out")]
    Timeout,
}

/// Failures of the image store.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("unknown bucket '{0}'")]
    UnknownBucket(String),

    #[error("Unsupported file type. Allowed: JPEG, PNG, WebP, GIF.")]
    UnsupportedType,

    #[error("File too large. Maximum size is 5MB.")]
    TooLarge,

    #[error("Empty file")]
    Empty,

    #[error("Invalid filename")]
    InvalidFilename,

    #[error("File not found")]
    NotFound,

    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
}

/// Errors returned by route handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Authorization required")]
    Unauthorized { redirect: &'static str },

    #[error("{0}")]
    InvalidCredentials(String),

    #[error("Account is disabled.")]
    Forbidden,

    #[error("Not found")]
    NotFound,

    #[error("Too many requests. Please try again later.")]
    TooManyRequests,

    #[error("{0}")]
    Internal(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Media(#[from] MediaError),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized { .. } | Self::InvalidCredentials(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Store(StoreError::NotFound) => StatusCode::NOT_FOUND,
            Self::Store(StoreError::Conflict(_)) => StatusCode::CONFLICT,
            Self::Store(StoreError::Timeout) => StatusCode::GATEWAY_TIMEOUT,
            Self::Store(StoreError::Database(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Media(MediaError::NotFound) => StatusCode::NOT_FOUND,
            Self::Media(MediaError::Io(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Media(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::BadRequest(err.0)
    }
}

impl From<CarouselError> for ApiError {
    fn from(err: CarouselError) -> Self {
        match err {
            CarouselError::OutOfRange { .. } => Self::BadRequest(err.to_string()),
            CarouselError::Unmounted => Self::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Internal details stay in the logs.
        let error = match &self {
            Self::Store(StoreError::Database(e)) => {
                tracing::error!(error = %e, "database error");
                "Database error".to_string()
            }
            Self::Media(MediaError::Io(e)) => {
                tracing::error!(error = %e, "image storage error");
                "Storage error".to_string()
            }
            Self::Internal(message) => {
                tracing::error!(error = %message, "internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let redirect = match &self {
            Self::Unauthorized { redirect } => Some(redirect.to_string()),
            _ => None,
        };

        (
            status,
            Json(ErrorResponse { error, redirect }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_map_to_http_status() {
        assert_eq!(ApiError::from(StoreError::NotFound).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::from(StoreError::Conflict("Slug already exists".into())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(MediaError::TooLarge).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn test_unauthorized_carries_redirect() {
        let response = ApiError::Unauthorized {
            redirect: "/admin/login",
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.redirect.as_deref(), Some("/admin/login"));
    }
}
