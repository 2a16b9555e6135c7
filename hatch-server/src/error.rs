//! HTTP error responses

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::{error, warn};

/// Result type for handlers
pub type ServerResult<T> = Result<T, ServerError>;

/// Anything a handler can fail with
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Core(#[from] hatch_core::Error),

    #[error("Cannot read landing page {path}: {source}")]
    Index {
        path: String,
        source: std::io::Error,
    },
}

impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::Core(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!("Rejected request: {}", self);
        }

        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response()
    }
}
