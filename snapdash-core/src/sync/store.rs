//! Reactive snapshot store.
//!
//! Holds the configuration list and, per configuration, the latest listing
//! and its change-sets. Readers get whole-state snapshots through a watch
//! channel; only the sync controller writes.

use crate::snapshot::{ChangeSet, SnapperConfig, Snapshot};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ListingStatus {
    /// Not listed yet
    Pending,
    Ready,
    /// The last listing failed; the snapshot list is empty
    Failed { message: String },
}

#[derive(Debug, Clone)]
pub struct SubvolumeState {
    pub config: SnapperConfig,
    pub snapshots: Arc<Vec<Snapshot>>,
    pub change_sets: Arc<Vec<ChangeSet>>,
    pub status: ListingStatus,
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl SubvolumeState {
    fn pending(config: SnapperConfig) -> Self {
        Self {
            config,
            snapshots: Arc::new(Vec::new()),
            change_sets: Arc::new(Vec::new()),
            status: ListingStatus::Pending,
            refreshed_at: None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.status {
            ListingStatus::Failed { message } => Some(message),
            _ => None,
        }
    }
}

/// What the most recent write touched
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StoreChange {
    #[default]
    Initial,
    Configs,
    Subvolume(String),
}

#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    pub configs: Arc<Vec<SnapperConfig>>,
    pub subvolumes: BTreeMap<String, SubvolumeState>,
    /// Bumped on every write
    pub generation: u64,
    pub last_change: StoreChange,
}

impl DashboardState {
    pub fn subvolume(&self, config: &str) -> Option<&SubvolumeState> {
        self.subvolumes.get(config)
    }

    pub fn config_names(&self) -> Vec<&str> {
        self.configs.iter().map(|c| c.name.as_str()).collect()
    }
}

#[derive(Debug)]
pub struct SnapshotStore {
    tx: watch::Sender<DashboardState>,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(DashboardState::default());
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardState> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> DashboardState {
        self.tx.borrow().clone()
    }

    /// Install a new configuration list. New configurations start out
    /// pending; state of vanished ones is dropped. Returns the removed names.
    pub(crate) fn replace_configs(&self, configs: Vec<SnapperConfig>) -> Vec<String> {
        let mut removed = Vec::new();
        self.tx.send_modify(|state| {
            removed = state
                .subvolumes
                .keys()
                .filter(|name| !configs.iter().any(|c| &c.name == *name))
                .cloned()
                .collect();
            for name in &removed {
                state.subvolumes.remove(name);
            }

            for config in &configs {
                match state.subvolumes.get_mut(&config.name) {
                    Some(existing) => existing.config = config.clone(),
                    None => {
                        state
                            .subvolumes
                            .insert(config.name.clone(), SubvolumeState::pending(config.clone()));
                    }
                }
            }

            // Readers tell a changed list apart by pointer.
            if *state.configs != configs {
                state.configs = Arc::new(configs);
            }
            state.generation += 1;
            state.last_change = StoreChange::Configs;
        });
        removed
    }

    /// Publish a listing. Ignored when the configuration has gone away in
    /// the meantime.
    pub(crate) fn replace_listing(
        &self,
        config: &str,
        snapshots: Vec<Snapshot>,
        change_sets: Vec<ChangeSet>,
        status: ListingStatus,
    ) -> bool {
        self.tx.send_if_modified(|state| {
            let Some(entry) = state.subvolumes.get_mut(config) else {
                return false;
            };
            entry.snapshots = Arc::new(snapshots);
            entry.change_sets = Arc::new(change_sets);
            entry.status = status;
            entry.refreshed_at = Some(Utc::now());

            state.generation += 1;
            state.last_change = StoreChange::Subvolume(config.to_string());
            true
        })
    }
}
