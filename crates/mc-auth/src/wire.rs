//! JSON bodies of the login and refresh exchanges.

use serde::{Deserialize, Serialize};

use crate::claims::CredentialPair;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub api_key: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: String,
}

/// Both exchanges answer `{"token": {"access_token": .., "refresh_token": ..}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: CredentialPair,
}

/// Parse an `Authorization` header of the form `Bearer <token>`.
pub fn extract_bearer(header: &str) -> Option<&str> {
    let mut parts = header.split_whitespace();
    let scheme = parts.next()?;
    let token = parts.next()?;
    if parts.next().is_some() || !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token)
}
