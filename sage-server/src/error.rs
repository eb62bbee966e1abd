//! Server error types and the HTTP mapping for kernel errors

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use sage_core::EngineError;

/// Errors that can occur while running the sage server
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to the specified address
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Internal server error
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error body returned by every failing endpoint
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Kernel error wrapped for use as an axum response
///
/// Validation failures, completed sessions and duplicate answers all map to
/// 400 on the wire; missing entities map to 404; numeric degeneracies and
/// repository failures map to 500.
#[derive(Debug)]
pub struct ApiError(pub EngineError);

impl From<EngineError> for ApiError {
    fn from(error: EngineError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            EngineError::InvalidArgument(_) | EngineError::Conflict(_) => StatusCode::BAD_REQUEST,
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::Numeric(_) | EngineError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        (
            status,
            Json(ErrorBody {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_for(error: EngineError) -> StatusCode {
        ApiError(error).into_response().status()
    }

    #[test]
    fn invalid_argument_maps_to_400() {
        let status = status_for(EngineError::InvalidArgument("bad condition".into()));
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn conflict_maps_to_400() {
        let status = status_for(EngineError::Conflict("duplicate answer".into()));
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn not_found_maps_to_404() {
        let status = status_for(EngineError::not_found("session", "s-1"));
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn numeric_and_internal_map_to_500() {
        assert_eq!(
            status_for(EngineError::Numeric("degenerate".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_for(EngineError::Internal("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
