//! HTTP error mapping
//!
//! Every failure leaves the server as a non-2xx status with a plain-text
//! message body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use ossim_core::SimError;

/// Errors a handler can return.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Engine rejected the command.
    #[error(transparent)]
    Sim(#[from] SimError),
}

impl ApiError {
    /// Status code for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Sim(e) => match e {
                SimError::Validation(_) | SimError::InvalidConfiguration(_) => {
                    StatusCode::BAD_REQUEST
                }
                SimError::NotFound(_) => StatusCode::NOT_FOUND,
                SimError::InvalidProcessTransition { .. }
                | SimError::InvalidControllerTransition { .. }
                | SimError::AlreadyInitialized(_)
                | SimError::NotConfigured(_) => StatusCode::CONFLICT,
                SimError::OutOfMemory { .. } => StatusCode::INSUFFICIENT_STORAGE,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::debug!(%status, error = %self, "request failed");
        (status, self.to_string()).into_response()
    }
}

/// Handler result alias.
pub type ApiResult<T> = Result<T, ApiError>;
