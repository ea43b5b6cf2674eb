use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use mc_auth::{CredentialEngine, Role};
use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::mission::{Mission, MissionStatus, StatusUpdate};
use crate::publisher::ReliablePublisher;
use crate::rotation::TokenLifecycleManager;
use crate::transport::Transport;

/// The work a soldier performs for one mission.
#[async_trait::async_trait]
pub trait MissionBody: Send + Sync {
    async fn run(&self, mission: &Mission) -> anyhow::Result<()>;
}

/// Stand-in workload: sleeps a random interval, then fails at a fixed rate.
#[derive(Debug, Clone)]
pub struct SimulatedBody {
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub failure_rate: f64,
}

impl Default for SimulatedBody {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            failure_rate: 0.1,
        }
    }
}

#[async_trait::async_trait]
impl MissionBody for SimulatedBody {
    async fn run(&self, mission: &Mission) -> anyhow::Result<()> {
        let (delay, fail) = {
            let mut rng = rand::rng();
            let lo = self.min_delay.as_millis() as u64;
            let hi = (self.max_delay.as_millis() as u64).max(lo);
            (
                Duration::from_millis(rng.random_range(lo..=hi)),
                rng.random::<f64>() < self.failure_rate,
            )
        };
        tracing::debug!(target: "mc::executor", mission_id = %mission.id, delay_ms = delay.as_millis() as u64, "executing order");
        tokio::time::sleep(delay).await;
        if fail {
            anyhow::bail!("mission {} failed in the field", mission.id);
        }
        Ok(())
    }
}

/// Consumes the `orders` channel and runs each mission in its own task.
#[derive(Clone)]
pub struct Executor {
    transport: Arc<dyn Transport>,
    publisher: ReliablePublisher,
    credentials: Arc<TokenLifecycleManager>,
    engine: Arc<CredentialEngine>,
    body: Arc<dyn MissionBody>,
}

impl Executor {
    pub fn new(
        transport: Arc<dyn Transport>,
        publisher: ReliablePublisher,
        credentials: Arc<TokenLifecycleManager>,
        engine: Arc<CredentialEngine>,
        body: Arc<dyn MissionBody>,
    ) -> Self {
        Self {
            transport,
            publisher,
            credentials,
            engine,
            body,
        }
    }

    /// Consume until the channel closes or `cancel` fires. Missions already
    /// handed to their tasks keep running.
    pub async fn run(&self, cancel: CancellationToken) -> anyhow::Result<()> {
        tracing::info!(target: "mc::executor", "awaiting orders");
        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => break,
                next = self.transport.receive(mc_topics::CHANNEL_ORDERS, mc_topics::GROUP_SOLDIERS) => next,
            };
            let delivery = match next {
                Ok(Some(delivery)) => delivery,
                Ok(None) => {
                    tracing::info!(target: "mc::executor", "orders channel closed");
                    break;
                }
                Err(err) => {
                    tracing::warn!(target: "mc::executor", error = %err, "order receive failed");
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    continue;
                }
            };
            let decoded = serde_json::from_slice::<Mission>(&delivery.payload);
            if let Err(err) = self.transport.ack(delivery.lease).await {
                tracing::warn!(target: "mc::executor", error = %err, "order ack failed");
            }
            match decoded {
                Ok(mission) if !mission.id.is_empty() => {
                    self.spawn_unit(mission);
                }
                Ok(_) => tracing::warn!(target: "mc::executor", "order without mission id discarded"),
                Err(err) => {
                    tracing::warn!(target: "mc::executor", error = %err, "malformed order discarded")
                }
            }
        }
        tracing::info!(target: "mc::executor", "executor stopped");
        Ok(())
    }

    /// Run one mission in an isolated task; a panic inside it is contained.
    pub fn spawn_unit(&self, mission: Mission) -> tokio::task::JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let mission_id = mission.id.clone();
            let started = Arc::new(AtomicBool::new(false));
            let result = std::panic::AssertUnwindSafe(this.execute(mission, started.clone()))
                .catch_unwind()
                .await;
            if result.is_err() {
                tracing::error!(target: "mc::executor", mission_id = %mission_id, "mission task panicked");
                if started.load(Ordering::SeqCst) {
                    this.report(&mission_id, MissionStatus::Failed).await;
                }
            }
        })
    }

    async fn execute(&self, mission: Mission, started: Arc<AtomicBool>) {
        if let Err(reason) = self.authorize().await {
            tracing::warn!(target: "mc::executor", mission_id = %mission.id, %reason, "mission rejected");
            self.report(&mission.id, MissionStatus::Rejected).await;
            return;
        }
        self.report(&mission.id, MissionStatus::InProgress).await;
        started.store(true, Ordering::SeqCst);
        let outcome = match self.body.run(&mission).await {
            Ok(()) => MissionStatus::Completed,
            Err(err) => {
                tracing::warn!(target: "mc::executor", mission_id = %mission.id, error = %err, "mission failed");
                MissionStatus::Failed
            }
        };
        self.report(&mission.id, outcome).await;
    }

    async fn authorize(&self) -> Result<(), String> {
        let token = self
            .credentials
            .access_token()
            .await
            .map_err(|err| err.to_string())?;
        let claims = self
            .engine
            .verify_access(&token)
            .map_err(|err| err.to_string())?;
        CredentialEngine::authorize(&claims, Role::Soldier, Role::Soldier.scope())
            .map_err(|err| err.to_string())
    }

    async fn report(&self, mission_id: &str, status: MissionStatus) {
        let update = StatusUpdate::new(mission_id, status);
        match self
            .publisher
            .publish_json(mc_topics::CHANNEL_STATUS, &update)
            .await
        {
            Ok(()) => tracing::info!(target: "mc::executor", mission_id, %status, "status reported"),
            Err(err) => {
                tracing::error!(target: "mc::executor", mission_id, %status, error = %err, "status lost")
            }
        }
    }
}
