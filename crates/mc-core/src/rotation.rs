use std::sync::Arc;
use std::time::Duration;

use mc_auth::{is_expired, remaining_validity, AuthExchange, CredentialPair, ExchangeError};
use thiserror::Error;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Authenticated,
    Rotating,
}

impl AuthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthState::Unauthenticated => "unauthenticated",
            AuthState::Authenticated => "authenticated",
            AuthState::Rotating => "rotating",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationPolicy {
    /// How often the background timer looks at the current pair.
    pub check_interval: Duration,
    /// Rotate once remaining access validity is at or below this. Keep it
    /// larger than `check_interval` so a tick always lands inside the window.
    pub margin: Duration,
    pub login_attempts: u32,
    pub login_backoff: Duration,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(10),
            margin: Duration::from_secs(15),
            login_attempts: 5,
            login_backoff: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Error)]
pub enum RotationError {
    #[error("no credential held")]
    NotAuthenticated,
    #[error("access token still expired after refresh")]
    StillExpired,
    #[error("login failed after {attempts} attempts: {last}")]
    LoginExhausted { attempts: u32, last: ExchangeError },
    #[error(transparent)]
    Exchange(#[from] ExchangeError),
}

/// Holds exactly one current pair; replaced wholesale.
#[derive(Debug, Default)]
pub struct CredentialStore {
    current: RwLock<Option<CredentialPair>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self) -> Option<CredentialPair> {
        self.current.read().await.clone()
    }

    pub async fn replace(&self, pair: CredentialPair) {
        *self.current.write().await = Some(pair);
    }
}

/// Executor-side owner of the credential: login, timed rotation, and on-demand
/// refresh when a task finds the access token expired.
pub struct TokenLifecycleManager {
    exchange: Arc<dyn AuthExchange>,
    store: Arc<CredentialStore>,
    policy: RotationPolicy,
    state: watch::Sender<AuthState>,
    rotate_lock: Mutex<()>,
}

impl TokenLifecycleManager {
    pub fn new(exchange: Arc<dyn AuthExchange>, policy: RotationPolicy) -> Self {
        Self::with_store(exchange, Arc::new(CredentialStore::new()), policy)
    }

    pub fn with_store(
        exchange: Arc<dyn AuthExchange>,
        store: Arc<CredentialStore>,
        policy: RotationPolicy,
    ) -> Self {
        let (state, _) = watch::channel(AuthState::Unauthenticated);
        Self {
            exchange,
            store,
            policy,
            state,
            rotate_lock: Mutex::new(()),
        }
    }

    pub fn policy(&self) -> RotationPolicy {
        self.policy
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub fn state(&self) -> AuthState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub async fn current(&self) -> Option<CredentialPair> {
        self.store.get().await
    }

    /// Single login exchange.
    pub async fn login(&self) -> Result<(), RotationError> {
        let pair = self.exchange.login().await?;
        self.store.replace(pair).await;
        self.state.send_replace(AuthState::Authenticated);
        tracing::info!(target: "mc::rotation", "authenticated");
        Ok(())
    }

    /// Login with the policy's bounded attempts and fixed backoff.
    /// Rejections other than transport trouble end the attempts early.
    pub async fn login_with_retry(&self) -> Result<(), RotationError> {
        let attempts = self.policy.login_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.exchange.login().await {
                Ok(pair) => {
                    self.store.replace(pair).await;
                    self.state.send_replace(AuthState::Authenticated);
                    tracing::info!(target: "mc::rotation", attempt, "authenticated");
                    return Ok(());
                }
                Err(err) if err.is_retryable() && attempt < attempts => {
                    tracing::warn!(
                        target: "mc::rotation",
                        attempt,
                        backoff_ms = self.policy.login_backoff.as_millis() as u64,
                        error = %err,
                        "login failed; retrying"
                    );
                    tokio::time::sleep(self.policy.login_backoff).await;
                }
                Err(err) => {
                    tracing::error!(target: "mc::rotation", attempt, error = %err, "login failed");
                    return Err(RotationError::LoginExhausted {
                        attempts: attempt,
                        last: err,
                    });
                }
            }
        }
    }

    /// Rotate when the access token is within the safety margin of expiry.
    /// Returns whether a rotation took place.
    pub async fn rotate_if_needed(&self) -> Result<bool, RotationError> {
        let current = self.store.get().await.ok_or(RotationError::NotAuthenticated)?;
        let left = remaining_validity(&current.access_token);
        let due = left.map_or(true, |left| left <= self.policy.margin);
        if !due {
            return Ok(false);
        }
        tracing::debug!(target: "mc::rotation", remaining_s = left.map(|d| d.as_secs()), "credential due for rotation");
        self.rotate_from(&current).await?;
        Ok(true)
    }

    /// Rotate unconditionally.
    pub async fn rotate_now(&self) -> Result<(), RotationError> {
        let current = self.store.get().await.ok_or(RotationError::NotAuthenticated)?;
        self.rotate_from(&current).await
    }

    // Rotates away from `observed`; a pair already replaced by a concurrent
    // rotation is left alone.
    async fn rotate_from(&self, observed: &CredentialPair) -> Result<(), RotationError> {
        let _guard = self.rotate_lock.lock().await;
        if self.store.get().await.as_ref() != Some(observed) {
            return Ok(());
        }
        let prior = self.state.send_replace(AuthState::Rotating);
        let renewed = match self.exchange.refresh(&observed.refresh_token).await {
            Ok(pair) => Ok(pair),
            Err(ExchangeError::Rejected(reason)) => {
                tracing::warn!(target: "mc::rotation", %reason, "refresh token rejected; logging in again");
                self.exchange.login().await
            }
            Err(err) => Err(err),
        };
        match renewed {
            Ok(pair) => {
                self.store.replace(pair).await;
                self.state.send_replace(AuthState::Authenticated);
                tracing::info!(target: "mc::rotation", "credential rotated");
                Ok(())
            }
            Err(err) => {
                self.state.send_replace(prior);
                tracing::warn!(target: "mc::rotation", error = %err, "rotation failed; keeping current credential");
                Err(err.into())
            }
        }
    }

    /// Current access token, refreshing once synchronously if it has expired.
    pub async fn access_token(&self) -> Result<String, RotationError> {
        let current = self.store.get().await.ok_or(RotationError::NotAuthenticated)?;
        if !is_expired(&current.access_token) {
            return Ok(current.access_token);
        }
        tracing::debug!(target: "mc::rotation", "access token expired; refreshing inline");
        self.rotate_from(&current).await?;
        let renewed = self.store.get().await.ok_or(RotationError::NotAuthenticated)?;
        if is_expired(&renewed.access_token) {
            return Err(RotationError::StillExpired);
        }
        Ok(renewed.access_token)
    }

    /// Start the rotation timer; it stops when `cancel` fires.
    pub fn spawn(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move { manager.run(cancel).await })
    }

    async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.policy.check_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // the first tick completes immediately
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!(target: "mc::rotation", "rotation timer cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(err) = self.rotate_if_needed().await {
                        tracing::warn!(target: "mc::rotation", error = %err, "scheduled rotation failed");
                    }
                }
            }
        }
    }
}
