//! HTTP error handling.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::functions::DispatchError;

/// Errors surfaced by the HTTP layer.
///
/// Handler-level failures never reach this type: the dispatcher folds them
/// into a failed envelope with a `200 OK`.
#[derive(Debug, Error)]
pub enum AppError {
    /// The requested function does not exist.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            Self::Dispatch(e) => (StatusCode::NOT_FOUND, Json(e.to_envelope())).into_response(),
            Self::BadRequest(_) => {
                tracing::debug!(error = %self, "Rejected request");
                (StatusCode::BAD_REQUEST, self.to_string()).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::BadRequest("expected JSON".to_string());
        assert_eq!(err.to_string(), "Bad request: expected JSON");

        let err = AppError::from(DispatchError::FunctionNotFound("checkout".into()));
        assert_eq!(err.to_string(), "function not found: checkout");
    }

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            err.into_response().status()
        }

        assert_eq!(
            get_status(AppError::Dispatch(DispatchError::FunctionNotFound("x".into()))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
    }
}
