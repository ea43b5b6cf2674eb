use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use mc_core::DispatchError;
use serde::Deserialize;
use serde_json::json;

use crate::responses::json_message;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub(crate) struct CreateMission {
    #[serde(default)]
    order: String,
}

/// `POST /missions`
pub(crate) async fn create_mission(
    State(state): State<AppState>,
    payload: Result<Json<CreateMission>, JsonRejection>,
) -> Response {
    let Ok(Json(req)) = payload else {
        return json_message(StatusCode::BAD_REQUEST, "Invalid request");
    };
    match state.dispatcher().submit(&req.order).await {
        Ok(mission) => (
            StatusCode::ACCEPTED,
            Json(json!({ "mission_id": mission.id, "status": mission.status })),
        )
            .into_response(),
        Err(DispatchError::EmptyOrder) => json_message(StatusCode::BAD_REQUEST, "Require order"),
        Err(DispatchError::Publish { .. }) => {
            json_message(StatusCode::INTERNAL_SERVER_ERROR, "Failed to publish mission")
        }
        Err(err @ DispatchError::Ledger(_)) => {
            tracing::error!(target: "mc::http", error = %err, "mission not recorded");
            json_message(StatusCode::INTERNAL_SERVER_ERROR, "Failed to record mission")
        }
    }
}

/// `GET /missions/{id}`
pub(crate) async fn get_mission(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.dispatcher().get(&id).await {
        Some(mission) => Json(mission).into_response(),
        None => json_message(StatusCode::NOT_FOUND, "Mission not found"),
    }
}
