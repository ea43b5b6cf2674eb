use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::transport::Transport;

/// Bounded retry with doubling backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Sleep after the given (1-based) failed attempt.
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.initial_backoff.saturating_mul(1u32 << shift)
    }
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("encode payload: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("publish to {channel} failed after {attempts} attempts: {last}")]
    Exhausted {
        channel: String,
        attempts: u32,
        last: String,
    },
}

/// Publishes to a channel with retries. Payloads are not kept once attempts
/// run out.
#[derive(Clone)]
pub struct ReliablePublisher {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
}

impl ReliablePublisher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_policy(transport, RetryPolicy::default())
    }

    pub fn with_policy(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<(), PublishError> {
        let attempts = self.policy.max_attempts.max(1);
        let mut last = String::new();
        for attempt in 1..=attempts {
            match self.transport.publish(channel, payload.clone()).await {
                Ok(()) => {
                    if attempt > 1 {
                        tracing::info!(target: "mc::publisher", channel, attempt, "publish succeeded after retry");
                    }
                    return Ok(());
                }
                Err(err) => {
                    let backoff = self.policy.backoff_after(attempt);
                    tracing::warn!(
                        target: "mc::publisher",
                        channel,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "publish failed"
                    );
                    last = err.to_string();
                    tokio::time::sleep(backoff).await;
                }
            }
        }
        tracing::error!(target: "mc::publisher", channel, attempts, "giving up on publish");
        Err(PublishError::Exhausted {
            channel: channel.to_string(),
            attempts,
            last,
        })
    }

    pub async fn publish_json<T: Serialize + ?Sized>(
        &self,
        channel: &str,
        value: &T,
    ) -> Result<(), PublishError> {
        let payload = serde_json::to_vec(value)?;
        self.publish(channel, payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_from_initial() {
        let policy = RetryPolicy::default();
        let delays: Vec<u64> = (1..=5).map(|a| policy.backoff_after(a).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16]);
        assert_eq!(delays.iter().sum::<u64>(), 31);
    }
}
