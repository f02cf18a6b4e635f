use axum::{
    extract::rejection::JsonRejection,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Origin not allowed")]
    ForbiddenOrigin,

    #[error("CSRF token verification failed")]
    InvalidCsrf,

    #[error("Missing webhook signature")]
    MissingSignature,

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Rate limit exceeded")]
    RateLimited { retry_after_secs: u64 },

    #[error("Duplicate submission: {0}")]
    Duplicate(String),

    #[error("Gateway error ({code}): {message}")]
    Gateway {
        status: StatusCode,
        code: String,
        message: String,
    },

    #[error("Server misconfigured: {0}")]
    Misconfigured(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone())),
            AppError::ForbiddenOrigin => (StatusCode::FORBIDDEN, "forbidden_origin", None),
            AppError::InvalidCsrf => (StatusCode::FORBIDDEN, "invalid_csrf", None),
            AppError::MissingSignature => (StatusCode::BAD_REQUEST, "missing_signature", None),
            AppError::InvalidSignature => (StatusCode::BAD_REQUEST, "invalid_signature", None),
            AppError::RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, "rate_limited", None),
            AppError::Duplicate(id) => {
                tracing::warn!("Duplicate initiation rejected: {}", id);
                (StatusCode::CONFLICT, "duplicate_click", None)
            }
            AppError::Gateway {
                status,
                code,
                message,
            } => (*status, code.as_str(), Some(message.clone())),
            AppError::Misconfigured(msg) => {
                tracing::error!("Server misconfigured: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "server_misconfigured", None)
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
            AppError::Json(e) => {
                tracing::error!("JSON error: {}", e);
                (StatusCode::BAD_REQUEST, "bad_request", Some(e.to_string()))
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        let mut response = (status, Json(body)).into_response();
        if let AppError::RateLimited { retry_after_secs } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, retry_after_secs.into());
        }
        response
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
