//! Keeps the snapshot store in step with the snapshot manager.

pub mod controller;
pub mod notify;
pub mod store;

pub use controller::{SyncController, SyncHandle};
pub use notify::{
    ChangeNotifier, DbusMonitorNotifier, ManualNotifier, PollingNotifier, RefreshRequested,
    Subscription,
};
pub use store::{DashboardState, ListingStatus, SnapshotStore, StoreChange, SubvolumeState};
