//! The external diff tool (`sndiff`).

use crate::exec::{CommandRunner, CommandSpec};
use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Produces the raw JSON report for a snapshot pair
#[async_trait]
pub trait DiffTool: Send + Sync {
    async fn diff(&self, config: &str, pre: u64, post: u64) -> crate::Result<String>;
}

/// `sndiff --json <pre> <post>`
pub struct Sndiff {
    binary: PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl Sndiff {
    pub fn new(binary: impl Into<PathBuf>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            binary: binary.into(),
            runner,
        }
    }
}

#[async_trait]
impl DiffTool for Sndiff {
    async fn diff(&self, _config: &str, pre: u64, post: u64) -> crate::Result<String> {
        // sndiff resolves snapshot numbers against the root configuration.
        let spec = CommandSpec::new(self.binary.to_string_lossy())
            .args(["--json".to_string(), pre.to_string(), post.to_string()])
            .superuser();
        self.runner.run(&spec).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffAvailability {
    Available,
    Missing,
}

impl DiffAvailability {
    pub fn is_available(&self) -> bool {
        matches!(self, DiffAvailability::Available)
    }
}

/// Check once, up front, whether the diff tool is installed
pub async fn probe_diff_tool(path: &Path) -> DiffAvailability {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => DiffAvailability::Available,
        _ => {
            info!("{} not found, compare and diff views disabled", path.display());
            DiffAvailability::Missing
        }
    }
}
