//! Canonical channel and subject names shared by the commander and soldiers.
//!
//! Both sides must agree on these strings, so they live in one place.
//! Logical channel names are transport-neutral; the NATS backend maps them
//! onto subjects under [`SUBJECT_PREFIX`].

// Transport channels
pub const CHANNEL_ORDERS: &str = "orders";
pub const CHANNEL_STATUS: &str = "status";

/// Every channel the workspace declares, in stream order.
pub const CHANNELS: &[&str] = &[CHANNEL_ORDERS, CHANNEL_STATUS];

// Consumer groups
pub const GROUP_SOLDIERS: &str = "soldiers";
pub const GROUP_COMMANDER: &str = "commander";

// NATS mapping
pub const STREAM_MISSIONS: &str = "MISSIONS";
pub const SUBJECT_PREFIX: &str = "mc";

/// Map a logical channel onto its NATS subject (`orders` -> `mc.orders`).
pub fn subject_for(channel: &str) -> String {
    format!("{SUBJECT_PREFIX}.{channel}")
}
