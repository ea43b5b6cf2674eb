use std::sync::Arc;

use mc_auth::{CredentialEngine, CredentialIssuer};
use mc_core::Dispatcher;

#[derive(Clone)]
pub(crate) struct AppState {
    issuer: Arc<CredentialIssuer>,
    dispatcher: Dispatcher,
}

impl AppState {
    pub fn new(issuer: Arc<CredentialIssuer>, dispatcher: Dispatcher) -> Self {
        Self { issuer, dispatcher }
    }

    pub fn issuer(&self) -> &CredentialIssuer {
        &self.issuer
    }

    pub fn engine(&self) -> &CredentialEngine {
        self.issuer.engine()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}
