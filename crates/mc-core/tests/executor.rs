use std::sync::Arc;
use std::time::Duration;

use mc_auth::{CredentialEngine, CredentialIssuer, LocalExchange, Role};
use mc_core::{
    Executor, LocalTransport, Mission, MissionBody, MissionStatus, ReliablePublisher,
    RotationPolicy, StatusUpdate, TokenLifecycleManager, Transport,
};
use tokio_util::sync::CancellationToken;

const SECRET: &[u8] = b"executor-secret";

enum Behaviour {
    Succeed,
    Fail,
    Panic,
}

/// Body keyed on the order text.
struct ScriptedBody;

#[async_trait::async_trait]
impl MissionBody for ScriptedBody {
    async fn run(&self, mission: &Mission) -> anyhow::Result<()> {
        let behaviour = match mission.order.as_str() {
            "fail" => Behaviour::Fail,
            "panic" => Behaviour::Panic,
            _ => Behaviour::Succeed,
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        match behaviour {
            Behaviour::Succeed => Ok(()),
            Behaviour::Fail => anyhow::bail!("ambushed"),
            Behaviour::Panic => panic!("body exploded"),
        }
    }
}

struct Harness {
    transport: LocalTransport,
    executor: Executor,
}

async fn harness(login_as: Role) -> Harness {
    let engine = Arc::new(CredentialEngine::new(SECRET));
    let issuer = Arc::new(
        CredentialIssuer::new(engine.clone())
            .with_api_key(Role::Commander, "commander-key")
            .with_api_key(Role::Soldier, "soldier-key"),
    );
    let key = match login_as {
        Role::Commander => "commander-key",
        Role::Soldier => "soldier-key",
    };
    let exchange = Arc::new(LocalExchange::new(issuer, login_as, key));
    let credentials = Arc::new(TokenLifecycleManager::new(exchange, RotationPolicy::default()));
    credentials.login().await.unwrap();

    let transport = LocalTransport::new();
    let shared: Arc<dyn Transport> = Arc::new(transport.clone());
    let executor = Executor::new(
        shared.clone(),
        ReliablePublisher::new(shared),
        credentials,
        engine,
        Arc::new(ScriptedBody),
    );
    Harness {
        transport,
        executor,
    }
}

async fn send_order(transport: &LocalTransport, mission: &Mission) {
    transport
        .publish(mc_topics::CHANNEL_ORDERS, serde_json::to_vec(mission).unwrap())
        .await
        .unwrap();
}

async fn next_status(transport: &LocalTransport) -> StatusUpdate {
    let delivery = tokio::time::timeout(
        Duration::from_secs(5),
        transport.receive(mc_topics::CHANNEL_STATUS, mc_topics::GROUP_COMMANDER),
    )
    .await
    .expect("status within deadline")
    .unwrap()
    .expect("status channel open");
    let update = serde_json::from_slice(&delivery.payload).unwrap();
    transport.ack(delivery.lease).await.unwrap();
    update
}

async fn statuses_for(transport: &LocalTransport, count: usize) -> Vec<StatusUpdate> {
    let mut seen = Vec::with_capacity(count);
    for _ in 0..count {
        seen.push(next_status(transport).await);
    }
    seen
}

#[tokio::test]
async fn reports_in_progress_then_completed() {
    let h = harness(Role::Soldier).await;
    let cancel = CancellationToken::new();
    let run = {
        let executor = h.executor.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { executor.run(cancel).await })
    };

    send_order(&h.transport, &Mission::queued("m-ok", "patrol")).await;
    let seen = statuses_for(&h.transport, 2).await;
    assert_eq!(seen[0], StatusUpdate::new("m-ok", MissionStatus::InProgress));
    assert_eq!(seen[1], StatusUpdate::new("m-ok", MissionStatus::Completed));

    cancel.cancel();
    run.await.unwrap().unwrap();
}

#[tokio::test]
async fn wrong_role_is_rejected_without_progress() {
    let h = harness(Role::Commander).await;
    let cancel = CancellationToken::new();
    let run = {
        let executor = h.executor.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { executor.run(cancel).await })
    };

    send_order(&h.transport, &Mission::queued("m-denied", "patrol")).await;
    let seen = next_status(&h.transport).await;
    assert_eq!(seen, StatusUpdate::new("m-denied", MissionStatus::Rejected));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.transport.depth(mc_topics::CHANNEL_STATUS).await, 0);

    cancel.cancel();
    run.await.unwrap().unwrap();
}

#[tokio::test]
async fn keeps_consuming_after_malformed_and_panicking_orders() {
    let h = harness(Role::Soldier).await;
    let cancel = CancellationToken::new();
    let run = {
        let executor = h.executor.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { executor.run(cancel).await })
    };

    h.transport
        .publish(mc_topics::CHANNEL_ORDERS, b"{not json".to_vec())
        .await
        .unwrap();
    h.transport
        .publish(
            mc_topics::CHANNEL_ORDERS,
            br#"{"mission_id":"","order":"x","status":"QUEUED"}"#.to_vec(),
        )
        .await
        .unwrap();
    send_order(&h.transport, &Mission::queued("m-boom", "panic")).await;
    let boom = statuses_for(&h.transport, 2).await;
    assert_eq!(boom[0].status, MissionStatus::InProgress);
    assert_eq!(boom[1], StatusUpdate::new("m-boom", MissionStatus::Failed));

    send_order(&h.transport, &Mission::queued("m-fail", "fail")).await;
    let fail = statuses_for(&h.transport, 2).await;
    assert_eq!(fail[1], StatusUpdate::new("m-fail", MissionStatus::Failed));

    send_order(&h.transport, &Mission::queued("m-after", "patrol")).await;
    let after = statuses_for(&h.transport, 2).await;
    assert_eq!(after[1], StatusUpdate::new("m-after", MissionStatus::Completed));

    // every order, malformed ones included, was acked
    assert_eq!(h.transport.depth(mc_topics::CHANNEL_ORDERS).await, 0);

    cancel.cancel();
    run.await.unwrap().unwrap();
}

#[tokio::test]
async fn loop_ends_when_orders_channel_closes() {
    let h = harness(Role::Soldier).await;
    let run = {
        let executor = h.executor.clone();
        tokio::spawn(async move { executor.run(CancellationToken::new()).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    h.transport.close();
    tokio::time::timeout(Duration::from_secs(1), run)
        .await
        .expect("executor should stop on close")
        .unwrap()
        .unwrap();
}
