//! Tenant-header extraction and the error-to-status mapping (§7) that every
//! handler in `routes.rs` funnels its `Result<_, ApiError>` through.

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::error::GatewayError;

/// Header carrying the daughter database name; absent or set to `"primary"`
/// routes to the primary (§6 "A tenant header selects the daughter
/// database (default = primary)").
pub const TENANT_HEADER: &str = "x-tenant-database";

pub fn tenant_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get(TENANT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Newtype so `GatewayError` can implement `IntoResponse` without the core
/// crate depending on axum for its error type directly.
pub struct ApiError(pub GatewayError);

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        Self(err)
    }
}

impl From<crate::db::DbError> for ApiError {
    fn from(err: crate::db::DbError) -> Self {
        Self(GatewayError::from(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(json!({ "error": self.0.public_message() }))).into_response()
    }
}
