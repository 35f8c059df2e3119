//! Crate-wide error type. Leaf errors are `thiserror` variants; `main` and
//! background workers use `anyhow` at the edges, the way the teacher's
//! `main` returns `Result<(), Box<dyn std::error::Error>>`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("ephemeral store error: {0}")]
    Kv(#[from] redis::RedisError),

    #[error("authenticity check failed: {0}")]
    Authenticity(AuthenticityFailure),

    #[error("malformed request: {0}")]
    Malformed(String),

    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("forbidden")]
    Forbidden,

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("optimistic lock conflict")]
    Conflict,

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthenticityFailure {
    MissingSignature,
    StaleTimestamp,
    NonceReplay,
    BadSignature,
}

impl std::fmt::Display for AuthenticityFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            AuthenticityFailure::MissingSignature => "missing or empty signature header",
            AuthenticityFailure::StaleTimestamp => "timestamp outside freshness window",
            AuthenticityFailure::NonceReplay => "nonce already used",
            AuthenticityFailure::BadSignature => "signature mismatch",
        };
        f.write_str(msg)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Authenticity(reason) => (StatusCode::UNAUTHORIZED, reason.to_string()),
            AppError::Malformed(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unauthenticated(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "forbidden".to_string()),
            AppError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded".to_string()),
            AppError::Conflict => (StatusCode::CONFLICT, "version conflict".to_string()),
            AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            AppError::Db(e) => {
                tracing::error!(error = %e, "database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
            AppError::Kv(e) => {
                tracing::error!(error = %e, "ephemeral store error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
            AppError::Internal(e) => {
                tracing::error!(error = %e, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
