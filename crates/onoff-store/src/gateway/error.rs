//! Every handler returns `Result<T, ApiError>`; errors become a JSON body
//! `{"error": "..."}` with a matching status code.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::{error, warn};

use crate::error::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Integration not ready")]
    NotReady,

    #[error("Missing params")]
    MissingParams,

    /// Body missing, not JSON, or the wrong shape.
    #[error("{}", .0.body_text())]
    Body(#[from] JsonRejection),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::MissingParams => StatusCode::BAD_REQUEST,
            ApiError::Body(rejection) => rejection.status(),
            ApiError::Store(e) => match e {
                StoreError::InvalidPackageSpec(_) => StatusCode::BAD_REQUEST,
                StoreError::AmbiguousAsset(_) => StatusCode::UNPROCESSABLE_ENTITY,
                StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
                StoreError::Auth { .. } => StatusCode::UNAUTHORIZED,
                StoreError::Connectivity(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, %status, "request failed");
        } else {
            warn!(error = %self, %status, "request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
