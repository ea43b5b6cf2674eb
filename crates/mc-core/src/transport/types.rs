use serde::{Deserialize, Serialize};

pub const DEFAULT_LEASE_TTL_MS: u64 = 30_000;
pub const MIN_LEASE_TTL_MS: u64 = 100;

/// Lease token for a delivered, not yet acknowledged message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseToken {
    pub channel: String,
    pub lease_id: String,
    /// Epoch millis after which an unacknowledged message is redelivered.
    pub expires_at_ms: u64,
}

/// A message handed to a consumer.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub channel: String,
    pub payload: Vec<u8>,
    /// Zero on first delivery; incremented on each redelivery.
    pub attempt: u32,
    pub lease: LeaseToken,
}
