use std::sync::Arc;

use mc_auth::{CredentialEngine, Role};
use mc_core::{
    Config, Executor, ReliablePublisher, SimulatedBody, TokenLifecycleManager, TransportBackend,
};
use mc_soldier::HttpExchange;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    mc_otel::init();
    let cfg = match Config::load() {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(2);
        }
    };
    let Some(api_key) = cfg.api_key(Role::Soldier).map(str::to_string) else {
        error!("SOLDIER_API_KEY is not set");
        std::process::exit(2);
    };

    if cfg.transport.backend == TransportBackend::Local {
        // an in-process queue here would never see the commander's orders
        error!("the soldier needs a shared transport; set MC_TRANSPORT=nats (the commander runs its own soldier in local mode)");
        std::process::exit(2);
    }

    let transport = match mc_core::transport::connect(&cfg.transport).await {
        Ok(transport) => transport,
        Err(err) => {
            error!("transport connect failed: {err:#}");
            std::process::exit(1);
        }
    };

    let exchange = match HttpExchange::new(&cfg.soldier.commander_url, Role::Soldier, api_key) {
        Ok(exchange) => exchange,
        Err(err) => {
            error!("auth client setup failed: {err}");
            std::process::exit(1);
        }
    };
    let credentials = Arc::new(TokenLifecycleManager::new(
        Arc::new(exchange),
        cfg.rotation_policy(),
    ));
    if let Err(err) = credentials.login_with_retry().await {
        error!("could not authenticate with commander: {err}");
        std::process::exit(1);
    }

    let cancel = CancellationToken::new();
    let rotation = credentials.spawn(cancel.clone());
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            cancel.cancel();
        }
    });

    let engine = Arc::new(CredentialEngine::with_policy(
        &cfg.jwt_secret(),
        cfg.token_policy(),
    ));
    let executor = Executor::new(
        transport.clone(),
        ReliablePublisher::with_policy(transport, cfg.retry_policy()),
        credentials,
        engine,
        Arc::new(SimulatedBody::default()),
    );
    info!(commander = %cfg.soldier.commander_url, "soldier ready");
    if let Err(err) = executor.run(cancel.clone()).await {
        error!("execution loop failed: {err:#}");
    }

    cancel.cancel();
    if let Err(err) = rotation.await {
        error!("rotation timer join failed: {err}");
    }
    info!("soldier stopped");
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                error!("failed to install SIGTERM handler: {err}");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("shutdown signal received");
}
