use std::sync::Arc;

use kfrs_config::Config;
use tokio::signal::unix::{SignalKind, signal};

use crate::bus;
use crate::client;
use crate::error::SupervisorError;
use crate::health::{HealthServer, HealthState};
use crate::observer::{Observer, ObserverConfig};
use crate::recorder::{RealFs, Recorder, RecorderConfig};
use crate::vcs::{GitSync, GitSyncConfig};

/// Wires every component together and runs until a termination signal arrives.
///
/// Start order mirrors the original implementation's `run` package: the git working tree
/// first (nothing else can write until it exists), then the recorder and the observer
/// together (the recorder must already be draining the bus before the observer can start
/// producing), then the health endpoint last. Stop order mirrors it too: observer, git sync,
/// recorder, health endpoint, matching the original's `ctrl`/`repo`/`reco`/`http` stop sequence.
pub async fn run(config: Config) -> Result<(), SupervisorError> {
    tracing::info!(local_dir = %config.local_dir.display(), "starting git repository synchronizer");
    let git_sync = GitSync::start(GitSyncConfig::new(
        config.local_dir.clone(),
        config.git_url.clone(),
        config.vcs_check_interval,
        config.vcs_command_timeout,
        config.dry_run,
    ))
    .await?;

    let (bus_tx, bus_rx) = bus::channel(bus::DEFAULT_BUS_CAPACITY);

    let recorder = Recorder::start(
        RecorderConfig {
            local_dir: config.local_dir.clone(),
            exclude_object: config.exclude_object.clone(),
            sweep_interval: config.sweep_interval,
            dry_run: config.dry_run,
        },
        Arc::new(RealFs),
        bus_rx,
    );

    tracing::info!("connecting to kubernetes cluster");
    let client = client::build_client(config.kube_config.as_deref(), config.api_server.as_deref()).await?;

    let observer = Observer::start(
        client,
        ObserverConfig {
            exclude_kind: config.exclude_kind.clone(),
            filter: config.filter.clone(),
            resync_interval: config.resync_interval,
        },
        bus_tx,
    );

    let health_state = HealthState::new();
    let health = HealthServer::start(config.healthcheck_port, health_state).await?;

    wait_for_shutdown_signal().await;

    tracing::info!("shutdown signal received, stopping");
    observer.stop().await;
    git_sync.stop().await;
    recorder.stop().await;
    health.stop().await;

    Ok(())
}

async fn wait_for_shutdown_signal() {
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(error) => {
            tracing::warn!(%error, "failed to install SIGTERM handler, falling back to ctrl_c only");
            let _ = tokio::signal::ctrl_c().await;
            return;
        },
    };

    tokio::select! {
        _ = sigterm.recv() => {},
        result = tokio::signal::ctrl_c() => {
            if let Err(error) = result {
                tracing::warn!(%error, "error waiting for ctrl-c signal");
            }
        },
    }
}
