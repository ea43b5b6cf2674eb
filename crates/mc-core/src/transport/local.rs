use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

use super::types::{Delivery, LeaseToken, DEFAULT_LEASE_TTL_MS, MIN_LEASE_TTL_MS};
use super::Transport;
use crate::util::now_millis;

/// In-memory transport for single-process runs and tests.
///
/// Consumers in any group compete for messages on a channel. Leases that are
/// neither acked nor nacked before their TTL are put back on the channel.
#[derive(Clone)]
pub struct LocalTransport {
    inner: Arc<LocalInner>,
}

struct Queued {
    payload: Vec<u8>,
    attempt: u32,
}

struct LocalInner {
    channels: Mutex<HashMap<String, VecDeque<Queued>>>,
    pending: Mutex<HashMap<String, (String, Queued, u64)>>, // lease_id -> (channel, message, expires_at_ms)
    notify: Notify,
    lease_ttl_ms: u64,
    sweeper_shutdown: Arc<Notify>,
    sweeper_done: Arc<AtomicBool>,
    stop_flag: AtomicBool,
    closed: AtomicBool,
}

impl LocalTransport {
    pub fn new() -> Self {
        Self::with_lease_ttl(DEFAULT_LEASE_TTL_MS)
    }

    pub fn with_lease_ttl(ttl_ms: u64) -> Self {
        let inner = Arc::new(LocalInner {
            channels: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            notify: Notify::new(),
            lease_ttl_ms: ttl_ms.max(MIN_LEASE_TTL_MS),
            sweeper_shutdown: Arc::new(Notify::new()),
            sweeper_done: Arc::new(AtomicBool::new(false)),
            stop_flag: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        });
        let sweep_every = Duration::from_millis((inner.lease_ttl_ms / 2).clamp(50, 500));
        // the sweeper must not keep the queues alive once every handle is gone
        let weak: Weak<LocalInner> = Arc::downgrade(&inner);
        let shutdown = inner.sweeper_shutdown.clone();
        let done = inner.sweeper_done.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(sweep_every) => {}
                    _ = shutdown.notified() => {}
                }
                let Some(inner) = weak.upgrade() else { break };
                if inner.stop_flag.load(Ordering::SeqCst) {
                    break;
                }
                inner.requeue_expired().await;
            }
            done.store(true, Ordering::SeqCst);
            tracing::trace!(target: "mc::transport", "lease sweeper stopped");
        });
        Self { inner }
    }

    /// Close every channel; blocked and future receivers get `Ok(None)`.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.stop_flag.store(true, Ordering::SeqCst);
        self.inner.sweeper_shutdown.notify_waiters();
        self.inner.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Messages waiting on `channel` that have not been handed out.
    pub async fn depth(&self, channel: &str) -> usize {
        self.inner
            .channels
            .lock()
            .await
            .get(channel)
            .map_or(0, VecDeque::len)
    }

    /// Deliveries handed out but not yet acked.
    pub async fn in_flight(&self) -> usize {
        self.inner.pending.lock().await.len()
    }

    async fn push(&self, channel: &str, message: Queued) {
        self.inner
            .channels
            .lock()
            .await
            .entry(channel.to_string())
            .or_default()
            .push_back(message);
        self.inner.notify.notify_waiters();
    }
}

impl LocalInner {
    async fn requeue_expired(&self) {
        let now = now_millis();
        let mut expired: Vec<(String, Queued)> = Vec::new();
        {
            let mut pend = self.pending.lock().await;
            let lids: Vec<String> = pend
                .iter()
                .filter_map(|(lid, (_, _, exp))| (*exp <= now).then(|| lid.clone()))
                .collect();
            for lid in lids {
                if let Some((channel, message, _)) = pend.remove(&lid) {
                    expired.push((channel, message));
                }
            }
        }
        if expired.is_empty() {
            return;
        }
        tracing::debug!(target: "mc::transport", count = expired.len(), "redelivering expired leases");
        {
            let mut map = self.channels.lock().await;
            for (channel, mut message) in expired {
                message.attempt = message.attempt.saturating_add(1);
                map.entry(channel).or_default().push_back(message);
            }
        }
        self.notify.notify_waiters();
    }
}

impl Default for LocalTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Transport for LocalTransport {
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> anyhow::Result<()> {
        if self.is_closed() {
            anyhow::bail!("transport closed");
        }
        self.push(channel, Queued {
            payload,
            attempt: 0,
        })
        .await;
        Ok(())
    }

    async fn receive(&self, channel: &str, _group: &str) -> anyhow::Result<Option<Delivery>> {
        loop {
            // register interest before checking so a concurrent publish is never missed
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_closed() {
                return Ok(None);
            }
            let next = {
                let mut map = self.inner.channels.lock().await;
                map.get_mut(channel).and_then(VecDeque::pop_front)
            };
            if let Some(message) = next {
                let lease_id = Uuid::new_v4().to_string();
                let expires_at_ms = now_millis() + self.inner.lease_ttl_ms;
                let delivery = Delivery {
                    channel: channel.to_string(),
                    payload: message.payload.clone(),
                    attempt: message.attempt,
                    lease: LeaseToken {
                        channel: channel.to_string(),
                        lease_id: lease_id.clone(),
                        expires_at_ms,
                    },
                };
                self.inner
                    .pending
                    .lock()
                    .await
                    .insert(lease_id, (channel.to_string(), message, expires_at_ms));
                return Ok(Some(delivery));
            }
            notified.await;
        }
    }

    async fn ack(&self, lease: LeaseToken) -> anyhow::Result<()> {
        self.inner.pending.lock().await.remove(&lease.lease_id);
        Ok(())
    }

    async fn nack(&self, lease: LeaseToken, retry_after_ms: Option<u64>) -> anyhow::Result<()> {
        let entry = self.inner.pending.lock().await.remove(&lease.lease_id);
        if let Some((channel, mut message, _)) = entry {
            message.attempt = message.attempt.saturating_add(1);
            if let Some(delay) = retry_after_ms {
                let transport = self.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    transport.push(&channel, message).await;
                });
            } else {
                self.push(&channel, message).await;
            }
        }
        Ok(())
    }
}

impl Drop for LocalTransport {
    fn drop(&mut self) {
        // only signal shutdown when this is the final handle
        if Arc::strong_count(&self.inner) == 1 {
            self.inner.stop_flag.store(true, Ordering::SeqCst);
            self.inner.sweeper_shutdown.notify_waiters();
            self.inner.notify.notify_waiters();
        }
    }
}
