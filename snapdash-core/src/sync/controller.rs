//! Synchronization controller.
//!
//! Re-lists configurations and then, per configuration, its snapshots, and
//! publishes the paired result into the [`SnapshotStore`]. Listings of
//! different configurations run independently. A refresh requested while a
//! configuration is still being listed is folded into one follow-up listing
//! of that configuration instead of a second concurrent call. Notifications
//! are folded the same way at the level of whole refreshes.

use super::notify::ChangeNotifier;
use super::store::{ListingStatus, SnapshotStore};
use crate::diff::DiffCache;
use crate::snapper::SnapshotManager;
use crate::snapshot::PairingIndex;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub struct SyncController {
    manager: Arc<dyn SnapshotManager>,
    store: Arc<SnapshotStore>,
    diffs: Option<Arc<DiffCache>>,
    /// Configurations with a listing in flight; `true` when another one is owed
    inflight: DashMap<String, bool>,
    /// Notification-driven refresh in flight, and whether another one is owed
    refreshing: Mutex<Option<bool>>,
}

impl SyncController {
    pub fn new(
        manager: Arc<dyn SnapshotManager>,
        store: Arc<SnapshotStore>,
        diffs: Option<Arc<DiffCache>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            manager,
            store,
            diffs,
            inflight: DashMap::new(),
            refreshing: Mutex::new(None),
        })
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    /// Full refresh: configurations first, then every configuration's
    /// snapshots. Resolves once every listing started here has landed.
    pub async fn refresh(self: &Arc<Self>) {
        match self.manager.list_configs().await {
            Ok(configs) => {
                let removed = self.store.replace_configs(configs);
                for name in &removed {
                    info!("Configuration {} disappeared", name);
                    if let Some(diffs) = &self.diffs {
                        diffs.drop_config(name);
                    }
                }
            }
            Err(e) => {
                // Keep listing what we knew about.
                warn!("Failed to list configurations: {}", e);
            }
        }

        let names: Vec<String> = self
            .store
            .current()
            .configs
            .iter()
            .map(|c| c.name.clone())
            .collect();

        let handles: Vec<JoinHandle<()>> = names
            .into_iter()
            .filter_map(|name| self.schedule_listing(name))
            .collect();

        for result in futures_util::future::join_all(handles).await {
            if let Err(e) = result {
                error!("Listing task panicked: {}", e);
            }
        }
    }

    /// Run [`SyncController::refresh`] in the background unless one started
    /// here is still running, in which case it goes again once finished.
    /// Any number of requests during a refresh cost a single follow-up.
    pub fn request_refresh(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        {
            let mut refreshing = self.refreshing.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(rerun) = refreshing.as_mut() {
                debug!("Refresh in flight, queueing a rerun");
                *rerun = true;
                return None;
            }
            *refreshing = Some(false);
        }

        let this = Arc::clone(self);
        Some(tokio::spawn(async move {
            loop {
                this.refresh().await;
                if !this.take_refresh_rerun() {
                    break;
                }
            }
        }))
    }

    fn take_refresh_rerun(&self) -> bool {
        let mut refreshing = self.refreshing.lock().unwrap_or_else(PoisonError::into_inner);
        if *refreshing == Some(true) {
            *refreshing = Some(false);
            true
        } else {
            *refreshing = None;
            false
        }
    }

    /// Start listing `config` unless a listing is already running, in which
    /// case that one is asked to go again when it finishes.
    fn schedule_listing(self: &Arc<Self>, config: String) -> Option<JoinHandle<()>> {
        match self.inflight.entry(config.clone()) {
            Entry::Occupied(mut running) => {
                debug!("Listing of {} in flight, queueing a rerun", config);
                *running.get_mut() = true;
                None
            }
            Entry::Vacant(slot) => {
                slot.insert(false);
                let this = Arc::clone(self);
                Some(tokio::spawn(async move {
                    loop {
                        this.refresh_config(&config).await;
                        if !this.take_rerun(&config) {
                            break;
                        }
                    }
                }))
            }
        }
    }

    /// Consume a queued rerun, or release the in-flight marker.
    fn take_rerun(&self, config: &str) -> bool {
        match self.inflight.entry(config.to_string()) {
            Entry::Occupied(mut running) => {
                if *running.get() {
                    *running.get_mut() = false;
                    true
                } else {
                    running.remove();
                    false
                }
            }
            Entry::Vacant(_) => false,
        }
    }

    /// List one configuration and publish it. Failures publish an empty list.
    pub async fn refresh_config(&self, config: &str) {
        let (snapshots, status) = match self.manager.list_snapshots(config).await {
            Ok(snapshots) => (snapshots, ListingStatus::Ready),
            Err(e) => {
                warn!("Failed to list snapshots of {}: {}", config, e);
                (
                    Vec::new(),
                    ListingStatus::Failed {
                        message: e.to_string(),
                    },
                )
            }
        };

        let index = PairingIndex::build(&snapshots);
        for conflict in index.conflicts() {
            warn!(
                "Snapshot {} displaced by {} for key {} in {}",
                conflict.displaced, conflict.kept, conflict.key, config
            );
        }
        let pairs: HashSet<(u64, u64)> = index.pairs().collect();
        let count = snapshots.len();

        if !self
            .store
            .replace_listing(config, snapshots, index.into_change_sets(), status)
        {
            debug!("Dropping listing of removed configuration {}", config);
            return;
        }
        debug!("Listed {} snapshots of {}", count, config);

        if let Some(diffs) = &self.diffs {
            let dropped = diffs.retain_pairs(config, &pairs);
            if dropped > 0 {
                debug!("Evicted {} stale diffs of {}", dropped, config);
            }
        }
    }

    /// Subscribe to `notifier` and refresh on every event until stopped.
    /// The first refresh runs right away.
    pub fn start(self: &Arc<Self>, notifier: &dyn ChangeNotifier) -> crate::Result<SyncHandle> {
        self.dispatch(notifier, true)
    }

    /// Like [`SyncController::start`], without the initial refresh. For
    /// additional sources next to the one passed to `start`.
    pub fn listen(self: &Arc<Self>, notifier: &dyn ChangeNotifier) -> crate::Result<SyncHandle> {
        self.dispatch(notifier, false)
    }

    fn dispatch(
        self: &Arc<Self>,
        notifier: &dyn ChangeNotifier,
        initial_refresh: bool,
    ) -> crate::Result<SyncHandle> {
        let mut subscription = notifier.subscribe()?;
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let this = Arc::clone(self);

        let task = tokio::spawn(async move {
            info!("Sync started ({} notifications)", subscription.source());
            if initial_refresh {
                this.request_refresh();
            }

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    event = subscription.next() => match event {
                        Some(_) => {
                            debug!("Refresh requested");
                            this.request_refresh();
                        }
                        None => {
                            warn!("Change notifications stopped; state will no longer refresh");
                            token.cancelled().await;
                            break;
                        }
                    }
                }
            }

            let source = subscription.source();
            subscription.unsubscribe();
            info!("Sync stopped ({} notifications)", source);
        });

        Ok(SyncHandle { cancel, task })
    }
}

/// Running dispatcher. Stopping it releases the notification source.
pub struct SyncHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SyncHandle {
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            error!("Sync dispatcher panicked: {}", e);
        }
    }
}
