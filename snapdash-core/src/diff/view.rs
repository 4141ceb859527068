//! Presentation model for a diff report.
//!
//! Computed at display time from a cached [`DiffResult`]; nothing here is
//! cached itself.

use super::{DiffResult, FileChange, PackageChange};
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// `@@ -1,3 +1,4 @@`, or `@@@ ... @@@` for combined diffs
static HUNK_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^@{2,} .+? @{2,}").expect("valid hunk header pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    Added,
    Removed,
    Context,
    HunkHeader,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedLine {
    pub kind: LineKind,
    pub text: String,
}

pub fn classify_line(line: &str) -> LineKind {
    if HUNK_HEADER.is_match(line) {
        LineKind::HunkHeader
    } else if line.starts_with('+') {
        LineKind::Added
    } else if line.starts_with('-') {
        LineKind::Removed
    } else {
        LineKind::Context
    }
}

pub fn classify_text(diff: &str) -> Vec<ClassifiedLine> {
    diff.lines()
        .map(|line| ClassifiedLine {
            kind: classify_line(line),
            text: line.to_string(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageEntry {
    pub name: String,
    pub from_version: String,
    pub to_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageSection {
    pub id: &'static str,
    pub title: &'static str,
    pub packages: Vec<PackageEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileEntry {
    pub path: String,
    /// Whether the file-diff viewer can be opened for this entry
    pub has_diff: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileSection {
    pub id: &'static str,
    pub title: &'static str,
    pub files: Vec<FileEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffView {
    pub packages: Vec<PackageSection>,
    pub files: Vec<FileSection>,
    pub no_changes: bool,
}

impl DiffView {
    /// Sections that have at least one entry, packages first
    pub fn non_empty_titles(&self) -> Vec<&'static str> {
        self.packages
            .iter()
            .filter(|s| !s.packages.is_empty())
            .map(|s| s.title)
            .chain(
                self.files
                    .iter()
                    .filter(|s| !s.files.is_empty())
                    .map(|s| s.title),
            )
            .collect()
    }
}

fn package_section(
    id: &'static str,
    title: &'static str,
    changes: &[PackageChange],
) -> PackageSection {
    PackageSection {
        id,
        title,
        packages: changes
            .iter()
            .map(|p| PackageEntry {
                name: p.name.clone(),
                from_version: p.from_version.clone(),
                to_version: p.to_version.clone(),
            })
            .collect(),
    }
}

fn file_section(id: &'static str, title: &'static str, changes: &[FileChange]) -> FileSection {
    FileSection {
        id,
        title,
        files: changes
            .iter()
            .map(|f| FileEntry {
                path: f.path.clone(),
                has_diff: f.text_diff().is_some(),
            })
            .collect(),
    }
}

/// Partition a report into four package buckets and three file buckets.
pub fn present(result: &DiffResult) -> DiffView {
    let packages = vec![
        package_section("def-updated-packages", "Updated Packages", &result.packages.updated),
        package_section(
            "def-downgraded-packages",
            "Downgraded Packages",
            &result.packages.downgraded,
        ),
        package_section("def-added-packages", "Added Packages", &result.packages.added),
        package_section("def-removed-packages", "Removed Packages", &result.packages.removed),
    ];
    let files = vec![
        file_section("def-modified-files", "Modified Files", &result.files.modified),
        file_section("def-added-files", "Added Files", &result.files.added),
        file_section("def-removed-files", "Removed Files", &result.files.removed),
    ];

    let no_changes = packages.iter().all(|s| s.packages.is_empty())
        && files.iter().all(|s| s.files.is_empty());

    DiffView {
        packages,
        files,
        no_changes,
    }
}
