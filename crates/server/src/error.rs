//! The JSON error shape every non-streaming handler returns on failure,
//! grounded on `control-plane-api`'s `ApiError` but sized to this gateway's
//! smaller set of failure modes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use gw_dispatch::DispatchError;
use gw_memory::MemoryError;
use serde_json::json;

#[derive(Debug)]
pub enum ApiError {
    MissingOrgHeader,
    InvalidRequest(String),
    NotImplemented(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::MissingOrgHeader => (StatusCode::UNAUTHORIZED, "Missing x-org-id header".to_string()),
            ApiError::InvalidRequest(detail) => (StatusCode::BAD_REQUEST, detail),
            ApiError::NotImplemented(detail) => (StatusCode::NOT_IMPLEMENTED, detail),
            ApiError::Internal(detail) => (StatusCode::INTERNAL_SERVER_ERROR, detail),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        ApiError::InvalidRequest(err.to_string())
    }
}

impl From<MemoryError> for ApiError {
    fn from(err: MemoryError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
