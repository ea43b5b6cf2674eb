mod local;
#[cfg(feature = "nats")]
pub mod nats;
mod types;

use std::sync::Arc;

pub use local::LocalTransport;
#[cfg(feature = "nats")]
pub use nats::NatsTransport;
pub use types::{Delivery, LeaseToken, DEFAULT_LEASE_TTL_MS, MIN_LEASE_TTL_MS};

use crate::config::{TransportBackend, TransportConfig};

/// Durable pub/sub abstraction over named channels.
///
/// Delivery is at-least-once: a message stays leased until it is acked, and an
/// expired lease makes it eligible for redelivery.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Publish one payload to `channel`.
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> anyhow::Result<()>;
    /// Wait for the next message on `channel` for this consumer group.
    /// Returns `Ok(None)` once the channel has been closed.
    async fn receive(&self, channel: &str, group: &str) -> anyhow::Result<Option<Delivery>>;
    /// Acknowledge and forget a delivery.
    async fn ack(&self, lease: LeaseToken) -> anyhow::Result<()>;
    /// Negative-acknowledge; optionally delay the redelivery.
    async fn nack(&self, lease: LeaseToken, retry_after_ms: Option<u64>) -> anyhow::Result<()>;
}

/// Build the transport selected by configuration.
pub async fn connect(cfg: &TransportConfig) -> anyhow::Result<Arc<dyn Transport>> {
    match cfg.backend {
        TransportBackend::Local => {
            tracing::info!(target: "mc::transport", "using in-process transport");
            Ok(Arc::new(LocalTransport::new()))
        }
        #[cfg(feature = "nats")]
        TransportBackend::Nats => {
            tracing::info!(target: "mc::transport", url = %cfg.nats_url, "connecting to nats");
            Ok(Arc::new(NatsTransport::connect(&cfg.nats_url).await?))
        }
        #[cfg(not(feature = "nats"))]
        TransportBackend::Nats => Err(anyhow::anyhow!(
            "nats transport requested but mc-core was built without the `nats` feature"
        )),
    }
}
