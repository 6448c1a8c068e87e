/**
 * Error Conversion
 *
 * Turns a `BackendError` into the JSON failure envelope shared by every
 * endpoint:
 *
 * ```json
 * { "success": false, "error": "Card is being edited by someone else",
 *   "code": "CONTENDED", "retriable": true }
 * ```
 */

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use crate::backend::error::types::BackendError;
use crate::shared::model::ApiResponse;

impl IntoResponse for BackendError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Request failed: {:?}", self);
        } else {
            tracing::debug!("Request rejected ({}): {}", status.as_u16(), self);
        }
        let body: ApiResponse<()> = ApiResponse::failure(self.code(), self.message(), self.retriable());
        (status, Json(body)).into_response()
    }
}
