mod config;
mod error;
mod routes;
mod state;
mod ws;

use crate::config::{AppConfig, Args};
use crate::state::{AppState, Backends};
use clap::Parser;
use snapdash_core::config::NotifierKind;
use snapdash_core::daemon::shutdown::ShutdownCoordinator;
use snapdash_core::diff::{probe_diff_tool, Sndiff};
use snapdash_core::exec::system::SystemRunner;
use snapdash_core::exec::CommandRunner;
use snapdash_core::snapper::Snapper;
use snapdash_core::sync::{DbusMonitorNotifier, PollingNotifier, SyncHandle};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = AppConfig::load(&args)?;
    snapdash_core::utils::logger::init(&config.core.log)?;

    tracing::info!("Starting snapdash v{}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &config.config_path {
        tracing::info!("Using configuration file {}", path.display());
    }

    let availability = probe_diff_tool(&config.core.diff.binary).await;

    let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner::from_config(&config.core));
    let backends = Backends {
        manager: Arc::new(Snapper::new(config.core.snapper.binary.clone(), runner.clone())),
        diff_tool: Arc::new(Sndiff::new(config.core.diff.binary.clone(), runner.clone())),
        runner,
    };
    let state = Arc::new(AppState::new(config.clone(), backends, availability));

    // Push store changes to UI sockets
    let cancel = CancellationToken::new();
    let forwarder =
        ws::ui::spawn_store_forwarder(&state.store, state.ui.clone(), cancel.clone());

    let watcher = start_sync(&state)?;
    let manual = state.sync.listen(&*state.refresh)?;

    let app = routes::create_router(state.clone());

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    let coordinator = Arc::new(ShutdownCoordinator::new());
    let mut shutdown_rx = coordinator.subscribe();
    tokio::spawn({
        let coordinator = coordinator.clone();
        async move { coordinator.wait_for_signal().await }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await?;

    tracing::info!("Shutting down...");
    cancel.cancel();
    coordinator
        .shutdown(async move {
            watcher.stop().await;
            manual.stop().await;
            let _ = forwarder.await;
        })
        .await;

    tracing::info!("Server stopped");
    Ok(())
}

/// Subscribe to the configured change source. A bus monitor that cannot be
/// started falls back to polling.
fn start_sync(state: &Arc<AppState>) -> anyhow::Result<SyncHandle> {
    let sync = &state.config.core.sync;
    let polling = PollingNotifier::new(sync.poll_interval());

    if sync.notifier == NotifierKind::Dbus {
        let dbus = DbusMonitorNotifier::new(sync.dbus_monitor.clone(), sync.dbus_interface.clone());
        match state.sync.start(&dbus) {
            Ok(handle) => {
                tracing::info!("Watching {} signals", sync.dbus_interface);
                return Ok(handle);
            }
            Err(e) => {
                tracing::warn!(
                    "Cannot watch the system bus ({}), polling every {}s instead",
                    e,
                    sync.poll_interval().as_secs()
                );
            }
        }
    }

    tracing::info!("Polling for changes every {}s", sync.poll_interval().as_secs());
    Ok(state.sync.start(&polling)?)
}
