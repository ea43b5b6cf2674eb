use std::time::Duration;

use async_trait::async_trait;
use mc_auth::wire::{LoginRequest, RefreshRequest, TokenResponse};
use mc_auth::{AuthError, AuthExchange, CredentialPair, ExchangeError, Role};
use reqwest::StatusCode;
use serde::Serialize;
use tracing::debug;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Login and refresh exchanges against the commander's HTTP API.
pub struct HttpExchange {
    client: reqwest::Client,
    base_url: String,
    role: Role,
    api_key: String,
}

impl HttpExchange {
    pub fn new(
        base_url: impl Into<String>,
        role: Role,
        api_key: impl Into<String>,
    ) -> Result<Self, ExchangeError> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            role,
            api_key: api_key.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn exchange<B: Serialize>(&self, path: &str, body: &B) -> Result<TokenResponse, Failure> {
        let resp = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| Failure::Other(ExchangeError::Transport(e.to_string())))?;
        let status = resp.status();
        if status.is_success() {
            return resp
                .json::<TokenResponse>()
                .await
                .map_err(|e| Failure::Other(ExchangeError::Protocol(e.to_string())));
        }
        let message = resp
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
            .unwrap_or_else(|| status.to_string());
        debug!(target: "mc::auth", path, %status, %message, "exchange refused");
        match status {
            StatusCode::UNAUTHORIZED => Err(Failure::Unauthorized(message)),
            s if s.is_server_error() => Err(Failure::Other(ExchangeError::Transport(format!(
                "{status}: {message}"
            )))),
            _ => Err(Failure::Other(ExchangeError::Protocol(format!(
                "{status}: {message}"
            )))),
        }
    }
}

enum Failure {
    Unauthorized(String),
    Other(ExchangeError),
}

#[async_trait]
impl AuthExchange for HttpExchange {
    async fn login(&self) -> Result<CredentialPair, ExchangeError> {
        let body = LoginRequest {
            user: self.role.as_str().to_string(),
            api_key: self.api_key.clone(),
        };
        match self.exchange("login", &body).await {
            Ok(resp) => Ok(resp.token),
            Err(Failure::Unauthorized(_)) => Err(ExchangeError::InvalidApiKey),
            Err(Failure::Other(err)) => Err(err),
        }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<CredentialPair, ExchangeError> {
        let body = RefreshRequest {
            refresh_token: refresh_token.to_string(),
        };
        match self.exchange("refresh", &body).await {
            Ok(resp) => Ok(resp.token),
            Err(Failure::Unauthorized(message)) => {
                Err(ExchangeError::Rejected(AuthError::Malformed(message)))
            }
            Err(Failure::Other(err)) => Err(err),
        }
    }
}
