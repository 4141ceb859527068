//! Pairing index: groups raw snapshots into change-sets.
//!
//! A change-set is either a standalone snapshot or a `(pre, post)` pair that
//! shares a correlation key. The input is ordered by snapshot number before
//! the single pass, so the grouping does not depend on the order in which the
//! snapshot manager happened to list the records.

use super::Snapshot;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeSet {
    Standalone { key: u64, snapshot: Snapshot },
    Pair { key: u64, pre: Snapshot, post: Snapshot },
}

impl ChangeSet {
    pub fn key(&self) -> u64 {
        match self {
            ChangeSet::Standalone { key, .. } | ChangeSet::Pair { key, .. } => *key,
        }
    }

    /// The standalone snapshot, or the pre member of a pair
    pub fn first(&self) -> &Snapshot {
        match self {
            ChangeSet::Standalone { snapshot, .. } => snapshot,
            ChangeSet::Pair { pre, .. } => pre,
        }
    }

    pub fn post(&self) -> Option<&Snapshot> {
        match self {
            ChangeSet::Standalone { .. } => None,
            ChangeSet::Pair { post, .. } => Some(post),
        }
    }

    pub fn is_pair(&self) -> bool {
        matches!(self, ChangeSet::Pair { .. })
    }

    /// Members in display order, pre first
    pub fn members(&self) -> Vec<&Snapshot> {
        match self {
            ChangeSet::Standalone { snapshot, .. } => vec![snapshot],
            ChangeSet::Pair { pre, post, .. } => vec![pre, post],
        }
    }

    /// `(pre, post)` numbers for pairs; the diff target of the row
    pub fn pair_numbers(&self) -> Option<(u64, u64)> {
        match self {
            ChangeSet::Standalone { .. } => None,
            ChangeSet::Pair { pre, post, .. } => Some((pre.number, post.number)),
        }
    }

    pub fn contains(&self, number: u64) -> bool {
        self.members().iter().any(|s| s.number == number)
    }
}

/// A snapshot pushed out of the index because another one claimed its slot.
/// The snapshot manager should never produce these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairingConflict {
    pub key: u64,
    pub displaced: u64,
    pub kept: u64,
}

/// Ordered mapping from correlation key to change-set
#[derive(Debug, Clone, Default)]
pub struct PairingIndex {
    sets: BTreeMap<u64, ChangeSet>,
    conflicts: Vec<PairingConflict>,
}

impl PairingIndex {
    pub fn build(snapshots: &[Snapshot]) -> Self {
        let mut ordered: Vec<&Snapshot> = snapshots.iter().collect();
        ordered.sort_by(|a, b| {
            a.number
                .cmp(&b.number)
                .then_with(|| a.pre_number.cmp(&b.pre_number))
        });

        let mut index = PairingIndex::default();
        for snapshot in ordered {
            index.insert(snapshot.clone());
        }
        index
    }

    fn insert(&mut self, incoming: Snapshot) {
        let key = incoming.correlation_key();
        let next = match self.sets.remove(&key) {
            None => ChangeSet::Standalone {
                key,
                snapshot: incoming,
            },
            Some(existing) => self.merge(existing, incoming),
        };
        self.sets.insert(key, next);
    }

    fn merge(&mut self, existing: ChangeSet, incoming: Snapshot) -> ChangeSet {
        let key = existing.key();
        let closes_out = incoming.pre_number.is_some();

        match existing {
            ChangeSet::Standalone { snapshot: anchor, .. }
                if closes_out && anchor.pre_number.is_none() =>
            {
                ChangeSet::Pair {
                    key,
                    pre: anchor,
                    post: incoming,
                }
            }
            ChangeSet::Standalone { snapshot: orphan, .. }
                if !closes_out && orphan.pre_number.is_some() =>
            {
                // The pre showed up after a post that referenced it.
                ChangeSet::Pair {
                    key,
                    pre: incoming,
                    post: orphan,
                }
            }
            ChangeSet::Pair { pre, post, .. } if closes_out => {
                self.record(key, post.number, incoming.number);
                ChangeSet::Pair {
                    key,
                    pre,
                    post: incoming,
                }
            }
            existing => {
                for displaced in existing.members() {
                    self.record(key, displaced.number, incoming.number);
                }
                ChangeSet::Standalone {
                    key,
                    snapshot: incoming,
                }
            }
        }
    }

    fn record(&mut self, key: u64, displaced: u64, kept: u64) {
        self.conflicts.push(PairingConflict {
            key,
            displaced,
            kept,
        });
    }

    /// Change-sets in ascending key order
    pub fn change_sets(&self) -> impl Iterator<Item = &ChangeSet> {
        self.sets.values()
    }

    pub fn into_change_sets(self) -> Vec<ChangeSet> {
        self.sets.into_values().collect()
    }

    pub fn get(&self, key: u64) -> Option<&ChangeSet> {
        self.sets.get(&key)
    }

    /// Every `(pre, post)` pair currently in the index
    pub fn pairs(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.sets.values().filter_map(ChangeSet::pair_numbers)
    }

    pub fn conflicts(&self) -> &[PairingConflict] {
        &self.conflicts
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

/// Group `snapshots` into change-sets ordered by correlation key.
pub fn pair_snapshots(snapshots: &[Snapshot]) -> Vec<ChangeSet> {
    PairingIndex::build(snapshots).into_change_sets()
}
