use crate::config::AppConfig;
use crate::ws::ui::UiBroadcaster;
use snapdash_core::diff::{DiffAvailability, DiffCache, DiffTool};
use snapdash_core::exec::CommandRunner;
use snapdash_core::rollback::{RollbackOrchestrator, SystemPower};
use snapdash_core::snapper::SnapshotManager;
use snapdash_core::sync::{ManualNotifier, SnapshotStore, SyncController};
use snapdash_core::ui::DialogStack;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

/// External collaborators the server drives
pub struct Backends {
    pub manager: Arc<dyn SnapshotManager>,
    pub diff_tool: Arc<dyn DiffTool>,
    pub runner: Arc<dyn CommandRunner>,
}

pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<SnapshotStore>,
    pub sync: Arc<SyncController>,
    pub diffs: Arc<DiffCache>,
    pub diff_availability: DiffAvailability,
    pub rollback: RollbackOrchestrator,
    pub power: SystemPower,
    pub dialogs: Mutex<DialogStack>,
    pub ui: UiBroadcaster,
    /// Source behind `POST /api/refresh`
    pub refresh: Arc<ManualNotifier>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: AppConfig, backends: Backends, diff_availability: DiffAvailability) -> Self {
        let store = Arc::new(SnapshotStore::new());
        let diffs = Arc::new(DiffCache::new(backends.diff_tool));
        let sync = SyncController::new(
            backends.manager.clone(),
            store.clone(),
            Some(diffs.clone()),
        );

        Self {
            config,
            store,
            sync,
            diffs,
            diff_availability,
            rollback: RollbackOrchestrator::new(backends.manager),
            power: SystemPower::new(backends.runner),
            dialogs: Mutex::new(DialogStack::new()),
            ui: UiBroadcaster::new(),
            refresh: Arc::new(ManualNotifier::new()),
            started_at: Instant::now(),
        }
    }
}
