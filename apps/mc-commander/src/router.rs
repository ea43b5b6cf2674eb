use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::{api_auth, api_meta, api_missions, security, AppState};

pub(crate) mod paths {
    pub const LOGIN: &str = "/login";
    pub const REFRESH: &str = "/refresh";
    pub const MISSIONS: &str = "/missions";
    pub const MISSION: &str = "/missions/{id}";
    pub const HEALTHZ: &str = "/healthz";
}

pub(crate) fn build(state: AppState) -> Router {
    let protected = Router::new()
        .route(paths::MISSIONS, post(api_missions::create_mission))
        .route(paths::MISSION, get(api_missions::get_mission))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            security::require_commander,
        ));
    Router::new()
        .route(paths::LOGIN, post(api_auth::login))
        .route(paths::REFRESH, post(api_auth::refresh))
        .route(paths::HEALTHZ, get(api_meta::healthz))
        .merge(protected)
        .with_state(state)
}
