use std::time::Duration;

use mc_core::Config;
use tracing::{error, info};

mod api_auth;
mod api_meta;
mod api_missions;
mod app_state;
mod bootstrap;
mod responses;
mod router;
mod security;
mod tasks;

pub(crate) use app_state::AppState;

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

    let bootstrap::BootstrapOutput {
        router,
        background_tasks,
        cancel,
        ..
    } = match bootstrap::build(&cfg).await {
        Ok(output) => output,
        Err(err) => {
            error!("bootstrap failed: {err:#}");
            std::process::exit(1);
        }
    };

    let listener = match tokio::net::TcpListener::bind(&cfg.commander.bind).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(addr = %cfg.commander.bind, "bind failed: {err}");
            std::process::exit(2);
        }
    };
    info!(addr = %cfg.commander.bind, "commander API listening");

    let server = axum::serve(listener, router).with_graceful_shutdown(shutdown_signal());
    if let Err(err) = server.await {
        error!("http server exited with error: {err}");
    }

    info!("shutting down background tasks");
    cancel.cancel();
    background_tasks
        .shutdown_with_grace(Duration::from_secs(5))
        .await;
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
