use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

/// `{"message": ...}` body with the given status.
pub fn json_message(status: StatusCode, message: impl Into<String>) -> axum::response::Response {
    (status, Json(json!({ "message": message.into() }))).into_response()
}
