use std::sync::Arc;
use std::time::Duration;

use mc_auth::{CredentialEngine, CredentialIssuer, LocalExchange, Role};
use mc_core::{
    run_status_consumer, Dispatcher, Executor, LocalTransport, Mission, MissionBody,
    MissionLedger, MissionStatus, ReliablePublisher, RotationPolicy, SimulatedBody,
    TokenLifecycleManager, Transport,
};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Holds each mission until the test releases it.
#[derive(Default)]
struct GatedBody {
    entered: Notify,
    release: Notify,
}

#[async_trait::async_trait]
impl MissionBody for GatedBody {
    async fn run(&self, _mission: &Mission) -> anyhow::Result<()> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(())
    }
}

async fn wait_for_status(
    ledger: &MissionLedger,
    id: &str,
    done: impl Fn(MissionStatus) -> bool,
) -> MissionStatus {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if let Some(mission) = ledger.get(id).await {
            if done(mission.status) {
                return mission.status;
            }
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "mission {id} did not settle"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn order_travels_from_commander_to_soldier_and_back() {
    let engine = Arc::new(CredentialEngine::new(b"flow-secret"));
    let issuer = Arc::new(
        CredentialIssuer::new(engine.clone()).with_api_key(Role::Soldier, "soldier-key"),
    );
    let local = LocalTransport::new();
    let transport: Arc<dyn Transport> = Arc::new(local.clone());
    let cancel = CancellationToken::new();

    // commander side
    let ledger = Arc::new(MissionLedger::new());
    let dispatcher = Dispatcher::new(ledger.clone(), ReliablePublisher::new(transport.clone()));
    let consumer = tokio::spawn(run_status_consumer(
        transport.clone(),
        ledger.clone(),
        cancel.clone(),
    ));

    // soldier side
    let credentials = Arc::new(TokenLifecycleManager::new(
        Arc::new(LocalExchange::new(issuer, Role::Soldier, "soldier-key")),
        RotationPolicy::default(),
    ));
    credentials.login_with_retry().await.unwrap();
    let rotation = credentials.spawn(cancel.clone());
    let body = Arc::new(GatedBody::default());
    let executor = Executor::new(
        transport.clone(),
        ReliablePublisher::new(transport.clone()),
        credentials,
        engine,
        body.clone(),
    );
    let soldier = {
        let cancel = cancel.clone();
        tokio::spawn(async move { executor.run(cancel).await })
    };

    let mission = dispatcher.submit("scout-north").await.unwrap();
    assert_eq!(mission.status, MissionStatus::Queued);

    tokio::time::timeout(Duration::from_secs(5), body.entered.notified())
        .await
        .expect("soldier never started the mission");
    // the body is held, so the ledger cannot move past IN_PROGRESS yet
    let running = wait_for_status(&ledger, &mission.id, |s| s == MissionStatus::InProgress).await;
    assert_eq!(running, MissionStatus::InProgress);

    body.release.notify_one();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    let mut seen_in_progress = false;
    loop {
        let status = ledger.get(&mission.id).await.unwrap().status;
        match status {
            MissionStatus::InProgress => seen_in_progress = true,
            MissionStatus::Queued => assert!(!seen_in_progress, "QUEUED after IN_PROGRESS"),
            _ => {}
        }
        if status.is_terminal() {
            assert_eq!(status, MissionStatus::Completed);
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "mission did not complete");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let stored = ledger.get(&mission.id).await.unwrap();
    assert_eq!(stored.order, "scout-north");

    cancel.cancel();
    consumer.await.unwrap().unwrap();
    soldier.await.unwrap().unwrap();
    rotation.await.unwrap();
}

#[tokio::test]
async fn many_missions_all_settle() {
    let engine = Arc::new(CredentialEngine::new(b"flow-secret"));
    let issuer = Arc::new(
        CredentialIssuer::new(engine.clone()).with_api_key(Role::Soldier, "soldier-key"),
    );
    let local = LocalTransport::new();
    let transport: Arc<dyn Transport> = Arc::new(local.clone());
    let cancel = CancellationToken::new();

    let ledger = Arc::new(MissionLedger::new());
    let dispatcher = Dispatcher::new(ledger.clone(), ReliablePublisher::new(transport.clone()));
    tokio::spawn(run_status_consumer(
        transport.clone(),
        ledger.clone(),
        cancel.clone(),
    ));

    let credentials = Arc::new(TokenLifecycleManager::new(
        Arc::new(LocalExchange::new(issuer, Role::Soldier, "soldier-key")),
        RotationPolicy::default(),
    ));
    credentials.login().await.unwrap();
    // two soldiers compete for the same orders
    for _ in 0..2 {
        let executor = Executor::new(
            transport.clone(),
            ReliablePublisher::new(transport.clone()),
            credentials.clone(),
            engine.clone(),
            Arc::new(SimulatedBody {
                min_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(20),
                failure_rate: 0.5,
            }),
        );
        let cancel = cancel.clone();
        tokio::spawn(async move { executor.run(cancel).await });
    }

    let mut ids = Vec::new();
    for n in 0..20 {
        ids.push(dispatcher.submit(&format!("sweep sector {n}")).await.unwrap().id);
    }
    for id in &ids {
        let status = wait_for_status(&ledger, id, |s| s.is_terminal()).await;
        assert!(matches!(
            status,
            MissionStatus::Completed | MissionStatus::Failed
        ));
    }
    assert_eq!(ledger.len().await, 20);
    cancel.cancel();
}
