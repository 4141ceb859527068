//! Modal dialogs. Only the top of the stack takes input.

use super::navigation::Location;
use crate::diff::{classify_text, FileChange};
use crate::diff::view::ClassifiedLine;
use crate::rollback::RollbackOutcome;
use crate::snapshot::Snapshot;
use crate::SnapError;
use serde::Serialize;

pub type DialogId = u64;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "dialog", rename_all = "snake_case")]
pub enum Dialog {
    /// Pick two snapshots to compare; both lists offer every snapshot
    Compare {
        config: String,
        choices: Vec<u64>,
        snapshot1: Option<u64>,
        snapshot2: Option<u64>,
    },
    Rollback {
        message: String,
        offers_reboot: bool,
        outcome: RollbackOutcome,
    },
    FileDiff {
        path: String,
        lines: Vec<ClassifiedLine>,
    },
}

impl Dialog {
    /// Compare dialog pre-filled from the current location
    pub fn compare(config: impl Into<String>, snapshots: &[Snapshot], current: &Location) -> Self {
        let mut choices: Vec<u64> = snapshots.iter().map(|s| s.number).collect();
        choices.sort_unstable();
        choices.dedup();

        let (snapshot1, snapshot2) = match current {
            Location::Diff { pre, post, .. } => (Some(*pre), Some(*post)),
            Location::Dashboard => (None, None),
        };

        Dialog::Compare {
            config: config.into(),
            choices,
            snapshot1,
            snapshot2,
        }
    }

    pub fn rollback(outcome: RollbackOutcome) -> Self {
        Dialog::Rollback {
            message: outcome.message().to_string(),
            offers_reboot: outcome.offers_reboot(),
            outcome,
        }
    }

    /// File-diff viewer, only for files that carry a textual diff
    pub fn file_diff(change: &FileChange) -> Option<Self> {
        change.text_diff().map(|text| Dialog::FileDiff {
            path: change.path.clone(),
            lines: classify_text(text),
        })
    }

    pub fn title(&self) -> &str {
        match self {
            Dialog::Compare { .. } => "Compare Snapshots",
            Dialog::Rollback { outcome, .. } => outcome.title(),
            Dialog::FileDiff { path, .. } => path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DialogEntry {
    pub id: DialogId,
    pub title: String,
    pub interactive: bool,
    #[serde(flatten)]
    pub dialog: Dialog,
}

#[derive(Debug, Default)]
pub struct DialogStack {
    entries: Vec<(DialogId, Dialog)>,
    next_id: DialogId,
}

impl DialogStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, dialog: Dialog) -> DialogId {
        self.next_id += 1;
        let id = self.next_id;
        self.entries.push((id, dialog));
        id
    }

    pub fn top(&self) -> Option<(DialogId, &Dialog)> {
        self.entries.last().map(|(id, dialog)| (*id, dialog))
    }

    pub fn is_interactive(&self, id: DialogId) -> bool {
        self.top().is_some_and(|(top, _)| top == id)
    }

    /// Close `id`. Dialogs under the top one cannot be closed.
    pub fn close(&mut self, id: DialogId) -> Option<Dialog> {
        if !self.is_interactive(id) {
            return None;
        }
        self.pop()
    }

    pub fn pop(&mut self) -> Option<Dialog> {
        self.entries.pop().map(|(_, dialog)| dialog)
    }

    /// Confirm the compare dialog `id` with two of its choices. Closes it and
    /// returns where to navigate.
    pub fn confirm_compare(
        &mut self,
        id: DialogId,
        snapshot1: u64,
        snapshot2: u64,
    ) -> crate::Result<Location> {
        let config = match self.top() {
            Some((top, Dialog::Compare { config, choices, .. })) if top == id => {
                for number in [snapshot1, snapshot2] {
                    if !choices.contains(&number) {
                        return Err(SnapError::InvalidLocation(format!(
                            "snapshot {} is not in {}",
                            number, config
                        )));
                    }
                }
                config.clone()
            }
            _ => {
                return Err(SnapError::InvalidLocation(format!(
                    "dialog {} is not an open compare dialog",
                    id
                )))
            }
        };

        self.pop();
        Ok(Location::diff(Some(config), snapshot1, snapshot2))
    }

    pub fn entries(&self) -> Vec<DialogEntry> {
        let top = self.top().map(|(id, _)| id);
        self.entries
            .iter()
            .map(|(id, dialog)| DialogEntry {
                id: *id,
                title: dialog.title().to_string(),
                interactive: Some(*id) == top,
                dialog: dialog.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
