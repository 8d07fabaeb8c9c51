//! HTTP error responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Error type for request handlers
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// Unknown path, invalid recording name, or missing file
    #[error("not found: {0}")]
    NotFound(String),

    /// Valid name that may not be served (raw segments)
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Filesystem failure while serving
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HttpError {
    /// Status code sent for this error
    pub fn status(&self) -> StatusCode {
        match self {
            HttpError::NotFound(_) => StatusCode::NOT_FOUND,
            HttpError::Forbidden(_) => StatusCode::FORBIDDEN,
            HttpError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            HttpError::Io(e) => {
                tracing::error!(error = %e, "Request failed");
                "Internal error".to_string()
            }
            other => {
                tracing::warn!(status = status.as_u16(), "{}", other);
                status
                    .canonical_reason()
                    .unwrap_or("Error")
                    .to_string()
            }
        };

        (status, message).into_response()
    }
}
