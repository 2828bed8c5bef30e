//! Blog Error Types
//!
//! Blog-specific error variants that integrate with the unified
//! `kernel::error::AppError` system.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use kernel::id::{ArticleId, CommentId};
use platform::kv::StoreError;
use std::borrow::Cow;
use thiserror::Error;

/// Blog-specific result type alias
pub type BlogResult<T> = Result<T, BlogError>;

#[derive(Debug, Error)]
pub enum BlogError {
    #[error("Article {0} not found")]
    ArticleNotFound(ArticleId),

    #[error("Comment {0} not found")]
    CommentNotFound(CommentId),

    /// Page number or page size below 1
    #[error("Page and size must both be at least 1")]
    InvalidPage,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Article {0} is not locked")]
    ArticleNotLocked(ArticleId),

    #[error("Wrong article password")]
    WrongArticlePassword,

    /// Carries the per-operation message shown to the caller
    #[error("{0}")]
    RateLimitExceeded(Cow<'static, str>),

    #[error("Access from this address is blocked")]
    IpBanned,

    /// Write operation without an identifiable client
    #[error("Client address could not be determined")]
    ClientIpUnresolved,

    #[error("Cache unavailable: {0}")]
    CacheUnavailable(#[from] StoreError),

    /// Cached value could not be decoded; the entry has been dropped
    #[error("Corrupted cache entry `{0}`")]
    CacheCorrupted(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BlogError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.kind().status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            BlogError::ArticleNotFound(_) | BlogError::CommentNotFound(_) => ErrorKind::NotFound,
            BlogError::InvalidPage
            | BlogError::InvalidInput(_)
            | BlogError::ArticleNotLocked(_)
            | BlogError::ClientIpUnresolved => ErrorKind::BadRequest,
            BlogError::RateLimitExceeded(_) => ErrorKind::TooManyRequests,
            BlogError::IpBanned | BlogError::WrongArticlePassword => ErrorKind::Forbidden,
            BlogError::CacheUnavailable(_) | BlogError::CacheCorrupted(_) => {
                ErrorKind::ServiceUnavailable
            }
            BlogError::Database(_) | BlogError::Serialization(_) | BlogError::Internal(_) => {
                ErrorKind::InternalServerError
            }
        }
    }

    /// Log the error with appropriate level
    fn log(&self) {
        match self {
            BlogError::Database(e) => {
                tracing::error!(error = %e, "Blog database error");
            }
            BlogError::CacheUnavailable(e) => {
                tracing::error!(error = %e, "Blog cache error");
            }
            BlogError::CacheCorrupted(key) => {
                tracing::error!(key = %key, "Blog cache entry corrupted");
            }
            BlogError::Serialization(e) => {
                tracing::error!(error = %e, "Blog serialization error");
            }
            BlogError::Internal(msg) => {
                tracing::error!(message = %msg, "Blog internal error");
            }
            BlogError::RateLimitExceeded(_)
            | BlogError::IpBanned
            | BlogError::WrongArticlePassword => {
                tracing::warn!(error = %self, "Blog request refused");
            }
            _ => {
                tracing::debug!(error = %self, "Blog error");
            }
        }
    }
}

impl From<BlogError> for AppError {
    fn from(err: BlogError) -> Self {
        match err {
            // Reuse the kernel's SQLSTATE classification
            BlogError::Database(e) => AppError::from(e),
            BlogError::RateLimitExceeded(message) => AppError::too_many_requests(message)
                .with_action("Wait for the current window to pass and retry"),
            BlogError::IpBanned => AppError::forbidden("Access from this address is blocked"),
            BlogError::WrongArticlePassword => AppError::forbidden("Wrong article password")
                .with_action("Check the password and retry"),
            BlogError::CacheUnavailable(e) => {
                AppError::service_unavailable("Cache unavailable").with_source(e)
            }
            BlogError::CacheCorrupted(_) => AppError::service_unavailable("Cache entry rebuilding")
                .with_action("Retry the request"),
            BlogError::Serialization(e) => AppError::internal("Serialization error").with_source(e),
            BlogError::Internal(_) => AppError::internal("Internal error"),
            other => AppError::new(other.kind(), other.to_string()),
        }
    }
}

impl IntoResponse for BlogError {
    fn into_response(self) -> Response {
        self.log();
        AppError::from(self).into_response()
    }
}
