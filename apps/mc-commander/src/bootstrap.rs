use std::sync::Arc;

use axum::Router;
use futures_util::FutureExt;
use mc_auth::{CredentialEngine, CredentialIssuer, LocalExchange, Role};
use mc_core::{
    run_status_consumer, Config, Dispatcher, Executor, MissionBody, MissionLedger,
    ReliablePublisher, SimulatedBody, TokenLifecycleManager, Transport, TransportBackend,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::tasks::{TaskHandle, TaskManager};
use crate::{router, AppState};

pub(crate) struct BootstrapOutput {
    pub router: Router,
    pub background_tasks: TaskManager,
    pub cancel: CancellationToken,
    pub issuer: Arc<CredentialIssuer>,
}

pub(crate) async fn build(cfg: &Config) -> anyhow::Result<BootstrapOutput> {
    let transport = mc_core::transport::connect(&cfg.transport).await?;
    let mut output = build_with_transport(cfg, transport.clone());
    // the in-process queue is private to this process, so orders are executed here
    if cfg.transport.backend == TransportBackend::Local {
        attach_local_soldier(&mut output, cfg, transport, Arc::new(SimulatedBody::default()));
    }
    Ok(output)
}

pub(crate) fn build_with_transport(cfg: &Config, transport: Arc<dyn Transport>) -> BootstrapOutput {
    let engine = Arc::new(CredentialEngine::with_policy(
        &cfg.jwt_secret(),
        cfg.token_policy(),
    ));
    let mut issuer = CredentialIssuer::new(engine);
    for role in Role::ALL {
        match cfg.api_key(role) {
            Some(key) => issuer = issuer.with_api_key(role, key),
            None => info!(target: "mc::config", %role, "no api key configured; login disabled for role"),
        }
    }

    let ledger = Arc::new(MissionLedger::new());
    let publisher = ReliablePublisher::with_policy(transport.clone(), cfg.retry_policy());
    let dispatcher = Dispatcher::new(ledger.clone(), publisher);

    let cancel = CancellationToken::new();
    let mut background_tasks = TaskManager::new();
    let consumer = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let run = run_status_consumer(transport, ledger, cancel);
            match std::panic::AssertUnwindSafe(run).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => error!(target: "mc::dispatch", error = %err, "status consumer failed"),
                Err(_) => error!(target: "mc::dispatch", "status consumer panicked"),
            }
        })
    };
    background_tasks.push(TaskHandle::new("status-consumer", consumer));

    let issuer = Arc::new(issuer);
    let state = AppState::new(issuer.clone(), dispatcher);
    BootstrapOutput {
        router: router::build(state),
        background_tasks,
        cancel,
        issuer,
    }
}

/// Single-node mode: run a soldier inside the commander against the same
/// transport, logging in through the local issuer with the soldier api key.
pub(crate) fn attach_local_soldier(
    output: &mut BootstrapOutput,
    cfg: &Config,
    transport: Arc<dyn Transport>,
    body: Arc<dyn MissionBody>,
) {
    let Some(api_key) = cfg.api_key(Role::Soldier).map(str::to_string) else {
        warn!(target: "mc::config", "local transport without SOLDIER_API_KEY; missions will stay QUEUED");
        return;
    };
    let engine = output.issuer.engine().clone();
    let exchange = LocalExchange::new(output.issuer.clone(), Role::Soldier, api_key);
    let credentials = Arc::new(TokenLifecycleManager::new(
        Arc::new(exchange),
        cfg.rotation_policy(),
    ));
    let executor = Executor::new(
        transport.clone(),
        ReliablePublisher::with_policy(transport, cfg.retry_policy()),
        credentials.clone(),
        engine,
        body,
    );
    let cancel = output.cancel.clone();
    let soldier = tokio::spawn(async move {
        if let Err(err) = credentials.login_with_retry().await {
            error!(target: "mc::executor", error = %err, "embedded soldier could not authenticate");
            return;
        }
        let rotation = credentials.spawn(cancel.clone());
        info!(target: "mc::executor", "embedded soldier ready");
        if let Err(err) = executor.run(cancel.clone()).await {
            error!(target: "mc::executor", error = %err, "embedded execution loop failed");
        }
        cancel.cancelled().await;
        if let Err(err) = rotation.await {
            error!(target: "mc::executor", "rotation timer join failed: {err}");
        }
    });
    output
        .background_tasks
        .push(TaskHandle::new("embedded-soldier", soldier));
}
