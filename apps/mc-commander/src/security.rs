use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use mc_auth::{extract_bearer, AuthError, CredentialEngine, Role};
use tracing::debug;

use crate::responses::json_message;
use crate::AppState;

/// Admit only live commander access tokens; verified claims ride along in the
/// request extensions.
pub(crate) async fn require_commander(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(token) = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(extract_bearer)
    else {
        return json_message(
            StatusCode::UNAUTHORIZED,
            "Missing or invalid Authorization header",
        );
    };
    let claims = match state.engine().verify_access(token) {
        Ok(claims) => claims,
        Err(err) => return reject(err),
    };
    if let Err(err) =
        CredentialEngine::authorize(&claims, Role::Commander, Role::Commander.scope())
    {
        return reject(err);
    }
    req.extensions_mut().insert(claims);
    next.run(req).await
}

fn reject(err: AuthError) -> Response {
    debug!(target: "mc::http", error = %err, "bearer token refused");
    match err {
        AuthError::Expired => json_message(StatusCode::UNAUTHORIZED, "Token expired"),
        AuthError::WrongKind { .. } => {
            json_message(StatusCode::FORBIDDEN, "Access token required")
        }
        AuthError::RoleMismatch { .. } => json_message(
            StatusCode::FORBIDDEN,
            "Only commander can perform this action",
        ),
        AuthError::ScopeMismatch { .. } => json_message(
            StatusCode::FORBIDDEN,
            "You do not have enough privileges to perform this action",
        ),
        AuthError::InvalidSignature | AuthError::Malformed(_) | AuthError::Signing(_) => {
            json_message(StatusCode::UNAUTHORIZED, "Invalid token")
        }
    }
}
