// SPDX-License-Identifier: Apache-2.0

use agripulse_api::ApiError;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

/// Failure envelope: `success: false` plus a stable code and a
/// human-readable message; status from the central taxonomy.
#[must_use]
pub(crate) fn failure(err: &ApiError) -> Response {
    let body = Json(json!({
        "success": false,
        "code": err.code.as_str(),
        "message": err.message,
    }));
    (err.code.status(), body).into_response()
}

/// Code-check variant of the failure envelope: that route reports with a
/// `valid` flag instead of `success`.
#[must_use]
pub(crate) fn invalid(err: &ApiError) -> Response {
    let body = Json(json!({
        "valid": false,
        "code": err.code.as_str(),
        "message": err.message,
    }));
    (err.code.status(), body).into_response()
}

#[must_use]
pub(crate) fn json_ok<T: Serialize>(body: &T) -> Response {
    Json(body).into_response()
}
