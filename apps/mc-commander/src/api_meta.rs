use axum::Json;
use serde_json::{json, Value};

/// `GET /healthz`
pub(crate) async fn healthz() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "commander",
        "message": "Service is healthy",
    }))
}
