//! Snapshot records as reported by the snapshot manager.
//!
//! Snapshots are never mutated here; the full list is re-read on every change.

pub mod pairing;

pub use pairing::{ChangeSet, PairingConflict, PairingIndex};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Date layout used by `snapper --json`
const SNAPPER_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotKind {
    Single,
    Pre,
    Post,
}

impl SnapshotKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotKind::Single => "single",
            SnapshotKind::Pre => "pre",
            SnapshotKind::Post => "post",
        }
    }
}

/// One snapshot of a subvolume
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub subvolume: String,

    /// Unique within its configuration
    pub number: u64,

    #[serde(default)]
    pub default: bool,

    #[serde(default)]
    pub active: bool,

    #[serde(rename = "type")]
    pub kind: SnapshotKind,

    /// The "pre" snapshot this one closes out
    #[serde(rename = "pre-number", default)]
    pub pre_number: Option<u64>,

    #[serde(default)]
    pub date: String,

    #[serde(default)]
    pub user: String,

    #[serde(default)]
    pub cleanup: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub userdata: Option<BTreeMap<String, serde_json::Value>>,
}

impl Snapshot {
    /// Key under which this snapshot is grouped with its partner: the
    /// pre-number when present, otherwise its own number.
    pub fn correlation_key(&self) -> u64 {
        self.pre_number.unwrap_or(self.number)
    }

    /// Parsed creation time, when the date uses snapper's layout
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.date, SNAPPER_DATE_FORMAT).ok()
    }

    /// Userdata rendered as JSON text (`null` when absent)
    pub fn userdata_json(&self) -> String {
        serde_json::to_string(&self.userdata).unwrap_or_else(|_| "null".to_string())
    }
}

/// A named binding between the snapshot manager and one subvolume
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapperConfig {
    #[serde(rename = "config")]
    pub name: String,
    pub subvolume: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_snapper_record() {
        let json = r#"{
            "subvolume": "/",
            "number": 42,
            "default": false,
            "active": true,
            "type": "post",
            "pre-number": 41,
            "date": "2024-03-01 10:15:00",
            "user": "root",
            "cleanup": "number",
            "description": "zypp(zypper)",
            "userdata": {"important": "yes"}
        }"#;

        let snapshot: Snapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.number, 42);
        assert_eq!(snapshot.kind, SnapshotKind::Post);
        assert_eq!(snapshot.pre_number, Some(41));
        assert_eq!(snapshot.correlation_key(), 41);
        assert!(snapshot.active);
        assert_eq!(snapshot.userdata_json(), r#"{"important":"yes"}"#);
        assert!(snapshot.timestamp().is_some());
    }

    #[test]
    fn test_optional_fields_default() {
        let snapshot: Snapshot =
            serde_json::from_str(r#"{"number": 0, "type": "single"}"#).unwrap();
        assert_eq!(snapshot.pre_number, None);
        assert_eq!(snapshot.correlation_key(), 0);
        assert_eq!(snapshot.userdata_json(), "null");
        assert!(snapshot.timestamp().is_none());
    }

    #[test]
    fn test_null_pre_number() {
        let snapshot: Snapshot =
            serde_json::from_str(r#"{"number": 7, "type": "pre", "pre-number": null}"#).unwrap();
        assert_eq!(snapshot.correlation_key(), 7);
    }

    #[test]
    fn test_missing_number_is_rejected() {
        let result = serde_json::from_str::<Snapshot>(r#"{"type": "single"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let result = serde_json::from_str::<Snapshot>(r#"{"number": 1, "type": "weird"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_record() {
        let config: SnapperConfig =
            serde_json::from_str(r#"{"config": "root", "subvolume": "/"}"#).unwrap();
        assert_eq!(config.name, "root");
        assert_eq!(config.subvolume, "/");
    }
}
