use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Errors a generation action can end in. These never escape the generator;
/// they are rendered as inline banners on the page.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("Please enter a topic")]
    EmptyTopic,
    #[error("Too many requests. Please wait a few seconds before generating another post.")]
    RateLimited,
    #[error("Input flagged as inappropriate.")]
    ContentFlagged,
    #[error("Please generate a post before generating an image.")]
    MissingPost,
    #[error("{0}")]
    UpstreamFailure(String),
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        GenerationError::UpstreamFailure(err.to_string())
    }
}

/// Errors surfaced at the HTTP boundary.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Catalog unavailable: {0}")]
    CatalogUnavailable(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(err.to_string())
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub code: u16,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str, code: u16) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
            code,
        }
    }

    pub fn from_api_error(err: &ApiError) -> Self {
        match err {
            ApiError::SessionNotFound(id) => Self::new("not_found", &format!("Unknown session {}", id), 404),
            ApiError::ValidationError(msg) => Self::new("validation_error", msg, 422),
            ApiError::CatalogUnavailable(msg) => Self::new("service_unavailable", msg, 503),
            ApiError::ConfigurationError(msg) => Self::new("configuration_error", msg, 500),
            ApiError::InternalServerError(msg) => Self::new("internal_error", msg, 500),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse::from_api_error(&self);
        let status = StatusCode::from_u16(body.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        (status, Json(body)).into_response()
    }
}
