use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use mc_auth::wire::{LoginRequest, RefreshRequest, TokenResponse};
use mc_auth::{is_expired, AuthExchange, CredentialEngine, CredentialIssuer, ExchangeError, Role};
use mc_core::{RotationPolicy, TokenLifecycleManager};
use mc_soldier::HttpExchange;
use serde_json::json;

async fn login(
    State(issuer): State<Arc<CredentialIssuer>>,
    Json(req): Json<LoginRequest>,
) -> Response {
    let Some(role) = Role::parse(&req.user) else {
        return (StatusCode::BAD_REQUEST, Json(json!({"message": "Bad request. Invalid user"})))
            .into_response();
    };
    match issuer.login(role, &req.api_key) {
        Ok(token) => Json(TokenResponse { token }).into_response(),
        Err(_) => (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "Unauthorized request. Invalid API_KEY"})),
        )
            .into_response(),
    }
}

async fn refresh(
    State(issuer): State<Arc<CredentialIssuer>>,
    Json(req): Json<RefreshRequest>,
) -> Response {
    match issuer.refresh(&req.refresh_token) {
        Ok(token) => Json(TokenResponse { token }).into_response(),
        Err(err) => {
            (StatusCode::UNAUTHORIZED, Json(json!({"message": err.to_string()}))).into_response()
        }
    }
}

async fn unavailable() -> StatusCode {
    StatusCode::SERVICE_UNAVAILABLE
}

/// Serve a minimal commander on an ephemeral port; returns its base URL.
async fn mock_commander() -> String {
    let issuer = Arc::new(
        CredentialIssuer::new(Arc::new(CredentialEngine::new(b"mock-secret")))
            .with_api_key(Role::Soldier, "soldier-key"),
    );
    let app = Router::new()
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .with_state(issuer);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn broken_commander() -> String {
    let app = Router::new()
        .route("/login", post(unavailable))
        .route("/refresh", post(unavailable));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn login_and_refresh_over_http() {
    let base = mock_commander().await;
    let exchange = HttpExchange::new(&base, Role::Soldier, "soldier-key").unwrap();

    let pair = exchange.login().await.unwrap();
    assert!(!is_expired(&pair.access_token));

    let renewed = exchange.refresh(&pair.refresh_token).await.unwrap();
    assert_ne!(renewed, pair);
}

#[tokio::test]
async fn wrong_key_maps_to_invalid_api_key() {
    let base = mock_commander().await;
    let exchange = HttpExchange::new(&base, Role::Soldier, "wrong").unwrap();
    assert!(matches!(
        exchange.login().await,
        Err(ExchangeError::InvalidApiKey)
    ));
}

#[tokio::test]
async fn refused_refresh_maps_to_rejection() {
    let base = mock_commander().await;
    let exchange = HttpExchange::new(&base, Role::Soldier, "soldier-key").unwrap();
    let pair = exchange.login().await.unwrap();
    let err = exchange.refresh(&pair.access_token).await.unwrap_err();
    assert!(matches!(err, ExchangeError::Rejected(_)), "{err:?}");
}

#[tokio::test]
async fn server_errors_are_retryable() {
    let base = broken_commander().await;
    let exchange = HttpExchange::new(&base, Role::Soldier, "soldier-key").unwrap();
    let err = exchange.login().await.unwrap_err();
    assert!(err.is_retryable(), "{err:?}");
}

#[tokio::test]
async fn startup_login_retries_then_gives_up_against_unreachable_commander() {
    // nothing listens on this port once the listener is dropped
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let exchange = HttpExchange::new(format!("http://{addr}"), Role::Soldier, "soldier-key").unwrap();
    let manager = TokenLifecycleManager::new(
        Arc::new(exchange),
        RotationPolicy {
            login_attempts: 2,
            login_backoff: Duration::from_millis(10),
            ..RotationPolicy::default()
        },
    );
    assert!(manager.login_with_retry().await.is_err());
    assert!(manager.current().await.is_none());
}
