//! View models for the dashboard, the diff page and their dialogs.

pub mod dialogs;
pub mod navigation;
pub mod rows;

pub use dialogs::{Dialog, DialogEntry, DialogId, DialogStack};
pub use navigation::{resolve_config, Crumb, Location, LocationQuery};
pub use rows::{build_rows, sort_rows, RowAction, SnapshotRow, SortColumn, SortDirection};

use crate::diff::DiffAvailability;
use crate::sync::{ListingStatus, SubvolumeState};
use serde::Serialize;

/// Why comparing is unavailable, shown next to the disabled control
pub const DIFF_TOOL_MISSING: &str = "sndiff is not installed";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubvolumeView {
    pub config: String,
    pub subvolume: String,
    pub status: ListingStatus,
    pub rows: Vec<SnapshotRow>,
    pub compare_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compare_disabled_reason: Option<&'static str>,
}

impl SubvolumeView {
    pub fn build(
        state: &SubvolumeState,
        diff: DiffAvailability,
        column: SortColumn,
        direction: SortDirection,
    ) -> Self {
        let mut rows = build_rows(&state.change_sets, diff.is_available());
        sort_rows(&mut rows, column, direction);

        Self {
            config: state.config.name.clone(),
            subvolume: state.config.subvolume.clone(),
            status: state.status.clone(),
            rows,
            compare_enabled: diff.is_available(),
            compare_disabled_reason: (!diff.is_available()).then_some(DIFF_TOOL_MISSING),
        }
    }
}
