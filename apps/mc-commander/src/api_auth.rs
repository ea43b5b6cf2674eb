use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use mc_auth::wire::{LoginRequest, RefreshRequest, TokenResponse};
use mc_auth::{ExchangeError, Role};
use tracing::{info, warn};

use crate::responses::json_message;
use crate::AppState;

/// `POST /login`: trade a role's api key for a credential pair.
pub(crate) async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Response {
    let Ok(Json(req)) = payload else {
        return json_message(StatusCode::BAD_REQUEST, "Invalid JSON");
    };
    if req.user.is_empty() || req.api_key.is_empty() {
        return json_message(
            StatusCode::BAD_REQUEST,
            "Bad request. Required api_key and user",
        );
    }
    let Some(role) = Role::parse(&req.user) else {
        return json_message(StatusCode::BAD_REQUEST, "Bad request. Invalid user");
    };
    match state.issuer().login(role, &req.api_key) {
        Ok(token) => {
            info!(target: "mc::http", %role, "login succeeded");
            Json(TokenResponse { token }).into_response()
        }
        Err(ExchangeError::InvalidApiKey | ExchangeError::RoleDisabled(_)) => json_message(
            StatusCode::UNAUTHORIZED,
            "Unauthorized request. Invalid API_KEY",
        ),
        Err(err) => {
            warn!(target: "mc::http", error = %err, "token issuance failed");
            json_message(StatusCode::INTERNAL_SERVER_ERROR, "Failed to generate token")
        }
    }
}

/// `POST /refresh`: trade a live refresh token for a new pair.
pub(crate) async fn refresh(
    State(state): State<AppState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Response {
    let Ok(Json(req)) = payload else {
        return json_message(StatusCode::BAD_REQUEST, "Invalid JSON");
    };
    if req.refresh_token.is_empty() {
        return json_message(StatusCode::BAD_REQUEST, "Bad request. Required refresh_token");
    }
    match state.issuer().refresh(&req.refresh_token) {
        Ok(token) => Json(TokenResponse { token }).into_response(),
        Err(err) => {
            info!(target: "mc::http", error = %err, "refresh refused");
            json_message(StatusCode::UNAUTHORIZED, err.to_string())
        }
    }
}
