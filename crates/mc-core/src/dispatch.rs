use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::ledger::{LedgerError, MissionLedger};
use crate::mission::{Mission, StatusUpdate};
use crate::publisher::{PublishError, ReliablePublisher};
use crate::transport::Transport;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("order must not be empty")]
    EmptyOrder,
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    /// The mission is in the ledger as `QUEUED` but never reached the queue.
    #[error("mission {mission_id} was recorded but not published: {source}")]
    Publish {
        mission_id: String,
        #[source]
        source: PublishError,
    },
}

/// Accepts orders, records them, and hands them to the `orders` channel.
#[derive(Clone)]
pub struct Dispatcher {
    ledger: Arc<MissionLedger>,
    publisher: ReliablePublisher,
}

impl Dispatcher {
    pub fn new(ledger: Arc<MissionLedger>, publisher: ReliablePublisher) -> Self {
        Self { ledger, publisher }
    }

    pub fn ledger(&self) -> &Arc<MissionLedger> {
        &self.ledger
    }

    pub async fn submit(&self, order: &str) -> Result<Mission, DispatchError> {
        let order = order.trim();
        if order.is_empty() {
            return Err(DispatchError::EmptyOrder);
        }
        let mission = Mission::queued(Uuid::new_v4().to_string(), order);
        // the ledger entry must exist before any executor can report on it
        let mission = self.ledger.create(mission).await?;
        if let Err(source) = self
            .publisher
            .publish_json(mc_topics::CHANNEL_ORDERS, &mission)
            .await
        {
            tracing::error!(target: "mc::dispatch", mission_id = %mission.id, error = %source, "mission not published");
            return Err(DispatchError::Publish {
                mission_id: mission.id,
                source,
            });
        }
        tracing::info!(target: "mc::dispatch", mission_id = %mission.id, "mission queued");
        Ok(mission)
    }

    pub async fn get(&self, id: &str) -> Option<Mission> {
        self.ledger.get(id).await
    }
}

/// Drain the `status` channel into the ledger until it closes or `cancel` fires.
pub async fn run_status_consumer(
    transport: Arc<dyn Transport>,
    ledger: Arc<MissionLedger>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    tracing::info!(target: "mc::dispatch", "status consumer started");
    loop {
        let delivery = tokio::select! {
            _ = cancel.cancelled() => break,
            next = transport.receive(mc_topics::CHANNEL_STATUS, mc_topics::GROUP_COMMANDER) => next,
        };
        let delivery = match delivery {
            Ok(Some(delivery)) => delivery,
            Ok(None) => {
                tracing::info!(target: "mc::dispatch", "status channel closed");
                break;
            }
            Err(err) => {
                tracing::warn!(target: "mc::dispatch", error = %err, "status receive failed");
                tokio::time::sleep(std::time::Duration::from_millis(500)).await;
                continue;
            }
        };
        match serde_json::from_slice::<StatusUpdate>(&delivery.payload) {
            Ok(update) if !update.mission_id.is_empty() => {
                ledger.apply_status(&update.mission_id, update.status).await;
            }
            Ok(_) => tracing::warn!(target: "mc::dispatch", "status event without mission id dropped"),
            Err(err) => {
                tracing::warn!(target: "mc::dispatch", error = %err, "malformed status event dropped")
            }
        }
        if let Err(err) = transport.ack(delivery.lease).await {
            tracing::warn!(target: "mc::dispatch", error = %err, "status ack failed");
        }
    }
    tracing::info!(target: "mc::dispatch", "status consumer stopped");
    Ok(())
}
