//! Snapshot diffs: the diff tool's report, its cache and its presentation.

pub mod cache;
pub mod tool;
pub mod view;

pub use cache::{CachedDiff, DiffCache, DiffKey, FetchStatus};
pub use tool::{probe_diff_tool, DiffAvailability, DiffTool, Sndiff};
pub use view::{classify_line, classify_text, present, DiffView, LineKind};

use serde::{Deserialize, Serialize};

/// A package whose version differs between the two snapshots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageChange {
    pub name: String,
    #[serde(rename = "version_from", default)]
    pub from_version: String,
    #[serde(rename = "version_to", default)]
    pub to_version: String,
    #[serde(default)]
    pub changelog_diff: String,
}

/// A file that differs between the two snapshots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    #[serde(default)]
    pub root_path_from: String,
    #[serde(default)]
    pub root_path_to: String,
    #[serde(default)]
    pub size_from: Option<u64>,
    #[serde(default)]
    pub size_to: Option<u64>,
    #[serde(default)]
    pub file_type_from: String,
    #[serde(default)]
    pub file_type_to: String,
    #[serde(default)]
    pub file_diff: Option<String>,
}

impl FileChange {
    /// Textual diff, if the tool produced a non-empty one
    pub fn text_diff(&self) -> Option<&str> {
        self.file_diff.as_deref().filter(|d| !d.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageChanges {
    #[serde(default)]
    pub updated: Vec<PackageChange>,
    #[serde(default)]
    pub downgraded: Vec<PackageChange>,
    #[serde(default)]
    pub added: Vec<PackageChange>,
    #[serde(default)]
    pub removed: Vec<PackageChange>,
}

impl PackageChanges {
    pub fn is_empty(&self) -> bool {
        self.updated.is_empty()
            && self.downgraded.is_empty()
            && self.added.is_empty()
            && self.removed.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileChanges {
    #[serde(default)]
    pub modified: Vec<FileChange>,
    #[serde(default)]
    pub added: Vec<FileChange>,
    #[serde(default)]
    pub removed: Vec<FileChange>,
}

impl FileChanges {
    pub fn is_empty(&self) -> bool {
        self.modified.is_empty() && self.added.is_empty() && self.removed.is_empty()
    }

    /// Look a file up in any bucket
    pub fn find(&self, path: &str) -> Option<&FileChange> {
        self.modified
            .iter()
            .chain(&self.added)
            .chain(&self.removed)
            .find(|f| f.path == path)
    }
}

/// Everything the diff tool reports for one `(pre, post)` pair.
/// `Default` is the empty result substituted for unusable output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiffResult {
    pub packages: PackageChanges,
    pub files: FileChanges,
}

impl DiffResult {
    /// Parse the diff tool's JSON report
    pub fn parse(output: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(output)?)
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty() && self.files.is_empty()
    }
}
