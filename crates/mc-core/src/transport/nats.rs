use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_nats::jetstream::consumer::pull;
use async_nats::jetstream::consumer::AckPolicy;
use async_nats::jetstream::context::Context as JsContext;
use async_nats::jetstream::{self, AckKind};
use async_nats::Client;
use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::types::{Delivery, LeaseToken, DEFAULT_LEASE_TTL_MS};
use super::Transport;
use crate::util::{env_bool, env_parse, env_string, now_millis};

/// JetStream-backed transport with durable pull consumers and explicit acks.
///
/// Every channel maps to subject `mc.<channel>` on one stream. Each consumer
/// group gets a durable consumer per channel, so group members share work.
#[derive(Clone)]
pub struct NatsTransport {
    _client: Client,
    js: JsContext,
    stream: String,
    streams: Arc<Mutex<HashMap<String, Arc<Mutex<pull::Stream>>>>>,
    pending: Arc<Mutex<HashMap<String, jetstream::Message>>>,
}

impl NatsTransport {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = connect_with_env(url).await?;
        let js = jetstream::new(client.clone());
        let stream = mc_topics::STREAM_MISSIONS.to_string();
        js.get_or_create_stream(jetstream::stream::Config {
            name: stream.clone(),
            subjects: mc_topics::CHANNELS
                .iter()
                .map(|channel| mc_topics::subject_for(channel))
                .collect(),
            ..Default::default()
        })
        .await
        .map_err(|e| anyhow::anyhow!("create stream {stream}: {e}"))?;
        Ok(Self {
            _client: client,
            js,
            stream,
            streams: Arc::new(Mutex::new(HashMap::new())),
            pending: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    async fn messages_for(&self, channel: &str, group: &str) -> Result<Arc<Mutex<pull::Stream>>> {
        let key = format!("{group}-{channel}");
        let mut streams = self.streams.lock().await;
        if let Some(existing) = streams.get(&key) {
            return Ok(existing.clone());
        }
        let stream = self
            .js
            .get_stream(&self.stream)
            .await
            .map_err(|e| anyhow::anyhow!("lookup stream {}: {e}", self.stream))?;
        let consumer = stream
            .get_or_create_consumer(
                &key,
                pull::Config {
                    durable_name: Some(key.clone()),
                    ack_policy: AckPolicy::Explicit,
                    ack_wait: Duration::from_millis(DEFAULT_LEASE_TTL_MS),
                    filter_subject: mc_topics::subject_for(channel),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| anyhow::anyhow!("create consumer {key}: {e}"))?;
        let messages = consumer
            .messages()
            .await
            .map_err(|e| anyhow::anyhow!("open consumer {key}: {e}"))?;
        let shared = Arc::new(Mutex::new(messages));
        streams.insert(key, shared.clone());
        Ok(shared)
    }
}

/// Build a NATS connection honoring env-based auth/TLS knobs and a simple initial retry.
async fn connect_with_env(url: &str) -> Result<Client> {
    let mut u = url.to_string();
    if env_bool("MC_NATS_TLS").unwrap_or(false) {
        u = u.replacen("nats://", "tls://", 1);
        u = u.replacen("ws://", "wss://", 1);
    }
    // inject credentials only when the URL carries no userinfo
    if !u.contains('@') {
        if let (Some(user), Some(pass)) = (env_string("MC_NATS_USER"), env_string("MC_NATS_PASS")) {
            if let Some((scheme, rest)) = u.split_once("://") {
                u = format!("{scheme}://{user}:{pass}@{rest}");
            }
        }
    }
    let retries: u32 = env_parse("MC_NATS_CONNECT_RETRIES").unwrap_or(3);
    let backoff_ms: u64 = env_parse("MC_NATS_CONNECT_BACKOFF_MS").unwrap_or(500);
    let mut last_err: Option<anyhow::Error> = None;
    for attempt in 0..=retries {
        match async_nats::connect(&u).await {
            Ok(client) => return Ok(client),
            Err(e) => {
                tracing::warn!(target: "mc::transport", attempt, error = %e, "nats connect failed");
                last_err = Some(anyhow::anyhow!(e));
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            }
        }
    }
    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("nats connect failed")))
}

#[async_trait]
impl Transport for NatsTransport {
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<()> {
        let ack = self
            .js
            .publish(mc_topics::subject_for(channel), payload.into())
            .await
            .map_err(|e| anyhow::anyhow!("publish to {channel}: {e}"))?;
        ack.await
            .map_err(|e| anyhow::anyhow!("publish ack from {channel}: {e}"))?;
        Ok(())
    }

    async fn receive(&self, channel: &str, group: &str) -> Result<Option<Delivery>> {
        let shared = self.messages_for(channel, group).await?;
        let next = shared.lock().await.next().await;
        let Some(msg) = next else {
            return Ok(None);
        };
        let msg = msg.map_err(|e| anyhow::anyhow!("receive from {channel}: {e}"))?;
        let attempt = msg
            .info()
            .map(|info| info.delivered.saturating_sub(1).max(0) as u32)
            .unwrap_or(0);
        let payload = msg.message.payload.to_vec();
        let lease_id = Uuid::new_v4().to_string();
        self.pending.lock().await.insert(lease_id.clone(), msg);
        Ok(Some(Delivery {
            channel: channel.to_string(),
            payload,
            attempt,
            lease: LeaseToken {
                channel: channel.to_string(),
                lease_id,
                expires_at_ms: now_millis() + DEFAULT_LEASE_TTL_MS,
            },
        }))
    }

    async fn ack(&self, lease: LeaseToken) -> Result<()> {
        if let Some(msg) = self.pending.lock().await.remove(&lease.lease_id) {
            msg.ack().await.map_err(|e| anyhow::anyhow!("ack: {e}"))?;
        }
        Ok(())
    }

    async fn nack(&self, lease: LeaseToken, retry_after_ms: Option<u64>) -> Result<()> {
        if let Some(msg) = self.pending.lock().await.remove(&lease.lease_id) {
            let delay = retry_after_ms.map(Duration::from_millis);
            msg.ack_with(AckKind::Nak(delay))
                .await
                .map_err(|e| anyhow::anyhow!("nak: {e}"))?;
        }
        Ok(())
    }
}
