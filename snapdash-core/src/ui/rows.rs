//! Dashboard rows, one per change-set.

use crate::snapshot::{ChangeSet, Snapshot};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowAction {
    pub label: &'static str,
    /// Snapshot the rollback targets
    pub snapshot: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotRow {
    pub key: String,
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub date: String,
    pub description: String,
    pub userdata: String,
    pub actions: Vec<RowAction>,
    /// `(pre, post)` the expandable diff view shows; absent when there is
    /// nothing to compare or no diff tool
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<(u64, u64)>,
    #[serde(skip)]
    sort_number: u64,
}

fn state_suffix(snapshot: &Snapshot) -> &'static str {
    match (snapshot.active, snapshot.default) {
        (true, true) => " (Active + Default)",
        (true, false) => " (Active)",
        (false, true) => " (Default)",
        (false, false) => "",
    }
}

impl SnapshotRow {
    pub fn from_change_set(set: &ChangeSet, diff_available: bool) -> Self {
        match set {
            ChangeSet::Pair { pre, post, .. } => SnapshotRow {
                key: format!("{}-{}", pre.number, post.number),
                id: format!("{} - {}{}", pre.number, post.number, state_suffix(post)),
                kind: format!("{} - {}", pre.kind.as_str(), post.kind.as_str()),
                date: pre.date.clone(),
                description: pre.description.clone(),
                userdata: pre.userdata_json(),
                actions: vec![
                    RowAction {
                        label: "Rollback to pre",
                        snapshot: pre.number,
                    },
                    RowAction {
                        label: "Rollback to post",
                        snapshot: post.number,
                    },
                ],
                diff: diff_available.then_some((pre.number, post.number)),
                sort_number: pre.number,
            },
            ChangeSet::Standalone { snapshot, .. } => SnapshotRow {
                key: snapshot.number.to_string(),
                id: format!("{}{}", snapshot.number, state_suffix(snapshot)),
                kind: snapshot.kind.as_str().to_string(),
                date: snapshot.date.clone(),
                description: snapshot.description.clone(),
                userdata: snapshot.userdata_json(),
                actions: vec![RowAction {
                    label: "Rollback to snapshot",
                    snapshot: snapshot.number,
                }],
                diff: None,
                sort_number: snapshot.number,
            },
        }
    }
}

pub fn build_rows(change_sets: &[ChangeSet], diff_available: bool) -> Vec<SnapshotRow> {
    change_sets
        .iter()
        .map(|set| SnapshotRow::from_change_set(set, diff_available))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortColumn {
    #[default]
    Id,
    Date,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Stable sort by the chosen column. Dates compare chronologically; ties
/// and unparsable dates fall back to the snapshot number.
pub fn sort_rows(rows: &mut [SnapshotRow], column: SortColumn, direction: SortDirection) {
    rows.sort_by(|a, b| {
        let ordering = match column {
            SortColumn::Id => a.sort_number.cmp(&b.sort_number),
            SortColumn::Date => compare_dates(&a.date, &b.date)
                .then_with(|| a.sort_number.cmp(&b.sort_number)),
        };
        match direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });
}

fn compare_dates(a: &str, b: &str) -> Ordering {
    let parse = |date: &str| {
        chrono::NaiveDateTime::parse_from_str(date, "%Y-%m-%d %H:%M:%S").ok()
    };
    match (parse(a), parse(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}
