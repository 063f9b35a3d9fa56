use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Backend timeout: {0}")]
    BackendTimeout(String),

    #[error("Image decode error: {0}")]
    ImageDecode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl BridgeError {
    /// Transient failures: the message is dropped, a later message may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Backend(_) | Self::BackendTimeout(_)
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Backend(_) => "backend",
            Self::BackendTimeout(_) => "backend_timeout",
            Self::ImageDecode(_) => "image_decode",
            Self::Io(_) => "io",
            Self::Configuration(_) => "configuration",
            Self::Unauthorized(_) => "unauthorized",
            Self::BadRequest(_) => "bad_request",
        }
    }
}

impl From<config::ConfigError> for BridgeError {
    fn from(err: config::ConfigError) -> Self {
        BridgeError::Configuration(err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        let status = match &self {
            BridgeError::Unauthorized(msg) => {
                tracing::warn!("Unauthorized: {}", msg);
                StatusCode::UNAUTHORIZED
            }
            BridgeError::BadRequest(msg) => {
                tracing::warn!("Bad request: {}", msg);
                StatusCode::BAD_REQUEST
            }
            BridgeError::Backend(_) | BridgeError::BackendTimeout(_) => {
                tracing::error!("{}", self);
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => {
                tracing::error!("{}", self);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(ErrorResponse {
            error: self.kind().to_string(),
            message: self.to_string(),
        });

        (status, body).into_response()
    }
}
