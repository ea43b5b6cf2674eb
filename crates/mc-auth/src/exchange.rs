use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::claims::{CredentialPair, Role};
use crate::engine::{AuthError, CredentialEngine};

#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error("invalid api key")]
    InvalidApiKey,
    #[error("role {0} has no configured api key")]
    RoleDisabled(Role),
    #[error("credential rejected: {0}")]
    Rejected(#[from] AuthError),
    #[error("exchange transport failed: {0}")]
    Transport(String),
    #[error("unexpected exchange response: {0}")]
    Protocol(String),
}

impl ExchangeError {
    /// Transport and protocol failures are worth another try; rejections are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExchangeError::Transport(_) | ExchangeError::Protocol(_))
    }
}

/// Issuing side of the login and refresh exchanges.
pub struct CredentialIssuer {
    engine: Arc<CredentialEngine>,
    api_keys: HashMap<Role, String>,
}

impl CredentialIssuer {
    pub fn new(engine: Arc<CredentialEngine>) -> Self {
        Self {
            engine,
            api_keys: HashMap::new(),
        }
    }

    /// Register the api key a role must present to log in. Empty keys leave
    /// the role disabled.
    pub fn with_api_key(mut self, role: Role, key: impl Into<String>) -> Self {
        let key = key.into();
        if key.is_empty() {
            self.api_keys.remove(&role);
        } else {
            self.api_keys.insert(role, key);
        }
        self
    }

    pub fn engine(&self) -> &Arc<CredentialEngine> {
        &self.engine
    }

    pub fn login(&self, role: Role, api_key: &str) -> Result<CredentialPair, ExchangeError> {
        let Some(expected) = self.api_keys.get(&role) else {
            warn!(target: "mc::auth", %role, "login attempted for role without configured api key");
            return Err(ExchangeError::RoleDisabled(role));
        };
        if !constant_time_eq(expected.as_bytes(), api_key.as_bytes()) {
            warn!(target: "mc::auth", %role, "login rejected: api key mismatch");
            return Err(ExchangeError::InvalidApiKey);
        }
        let pair = self.engine.issue_for(role)?;
        debug!(target: "mc::auth", %role, "issued credential pair");
        Ok(pair)
    }

    pub fn refresh(&self, refresh_token: &str) -> Result<CredentialPair, ExchangeError> {
        Ok(self.engine.refresh(refresh_token)?)
    }
}

fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    let mut diff = 0u8;
    for (a, b) in left.iter().zip(right.iter()) {
        diff |= a ^ b;
    }
    diff == 0
}

/// Client side of the credential exchanges as seen by an executor.
#[async_trait::async_trait]
pub trait AuthExchange: Send + Sync {
    /// Present the configured role and api key for a first pair.
    async fn login(&self) -> Result<CredentialPair, ExchangeError>;
    /// Trade a refresh token for a new pair.
    async fn refresh(&self, refresh_token: &str) -> Result<CredentialPair, ExchangeError>;
}

/// In-process exchange talking straight to a [`CredentialIssuer`].
pub struct LocalExchange {
    issuer: Arc<CredentialIssuer>,
    role: Role,
    api_key: String,
}

impl LocalExchange {
    pub fn new(issuer: Arc<CredentialIssuer>, role: Role, api_key: impl Into<String>) -> Self {
        Self {
            issuer,
            role,
            api_key: api_key.into(),
        }
    }
}

#[async_trait::async_trait]
impl AuthExchange for LocalExchange {
    async fn login(&self) -> Result<CredentialPair, ExchangeError> {
        self.issuer.login(self.role, &self.api_key)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<CredentialPair, ExchangeError> {
        self.issuer.refresh(refresh_token)
    }
}
