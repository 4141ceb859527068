//! Client for the `snapper` command line.
//!
//! Lists configurations and snapshots and issues rollbacks. All output is
//! parsed into typed records at this boundary.

use crate::exec::{CommandRunner, CommandSpec};
use crate::snapshot::{SnapperConfig, Snapshot};
use crate::SnapError;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

/// The snapshot manager as seen by the engine
#[async_trait]
pub trait SnapshotManager: Send + Sync {
    async fn list_configs(&self) -> crate::Result<Vec<SnapperConfig>>;

    async fn list_snapshots(&self, config: &str) -> crate::Result<Vec<Snapshot>>;

    /// Roll back to `number`. Returns the tool's stdout.
    async fn rollback(&self, config: Option<&str>, number: u64) -> crate::Result<String>;
}

#[derive(Debug, Deserialize)]
struct ConfigListing {
    configs: Vec<SnapperConfig>,
}

/// `snapper` driven through a [`CommandRunner`]
pub struct Snapper {
    binary: String,
    runner: Arc<dyn CommandRunner>,
}

impl Snapper {
    pub fn new(binary: impl Into<String>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            binary: binary.into(),
            runner,
        }
    }

    fn command(&self) -> CommandSpec {
        CommandSpec::new(&self.binary).arg("--json")
    }

    /// Pick the snapshot array for `config` out of a listing keyed by config name.
    fn select_listing(
        &self,
        config: &str,
        mut listing: HashMap<String, Vec<Snapshot>>,
    ) -> crate::Result<Vec<Snapshot>> {
        if let Some(snapshots) = listing.remove(config) {
            return Ok(snapshots);
        }
        if listing.len() == 1 {
            if let Some((_, snapshots)) = listing.into_iter().next() {
                return Ok(snapshots);
            }
        }
        Err(SnapError::UnexpectedShape {
            program: self.binary.clone(),
            detail: format!("no snapshot list for config {}", config),
        })
    }
}

#[async_trait]
impl SnapshotManager for Snapper {
    async fn list_configs(&self) -> crate::Result<Vec<SnapperConfig>> {
        let spec = self.command().arg("list-configs");
        let output = self.runner.run(&spec).await?;
        let listing: ConfigListing = serde_json::from_str(&output)?;
        Ok(listing.configs)
    }

    async fn list_snapshots(&self, config: &str) -> crate::Result<Vec<Snapshot>> {
        let spec = self
            .command()
            .args(["--no-dbus", "-c", config, "list", "--disable-used-space"])
            .superuser();
        let output = self.runner.run(&spec).await?;
        let listing: HashMap<String, Vec<Snapshot>> = serde_json::from_str(&output)?;
        self.select_listing(config, listing)
    }

    async fn rollback(&self, config: Option<&str>, number: u64) -> crate::Result<String> {
        let mut spec = self.command();
        if let Some(config) = config {
            spec = spec.args(["-c", config]);
        }
        let spec = spec.args(["rollback".to_string(), number.to_string()]).superuser();
        self.runner.run(&spec).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::Privilege;
    use crate::testing::ScriptedRunner;

    fn snapper(runner: Arc<ScriptedRunner>) -> Snapper {
        Snapper::new("snapper", runner)
    }

    #[tokio::test]
    async fn test_list_configs() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.respond(
            "snapper --json list-configs",
            Ok(r#"{"configs":[{"config":"root","subvolume":"/"},{"config":"home","subvolume":"/home"}]}"#),
        );

        let configs = snapper(runner.clone()).list_configs().await.unwrap();
        assert_eq!(configs.len(), 2);
        assert_eq!(configs[1].name, "home");
        assert_eq!(configs[1].subvolume, "/home");
        assert_eq!(runner.calls()[0].privilege, Privilege::User);
    }

    #[tokio::test]
    async fn test_list_snapshots_uses_requested_config() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.respond(
            "snapper --json --no-dbus -c home list --disable-used-space",
            Ok(r#"{"home":[{"number":0,"type":"single"},{"number":1,"type":"pre"},{"number":2,"type":"post","pre-number":1}]}"#),
        );

        let snapshots = snapper(runner.clone()).list_snapshots("home").await.unwrap();
        assert_eq!(snapshots.len(), 3);
        assert_eq!(snapshots[2].pre_number, Some(1));
        assert_eq!(runner.calls()[0].privilege, Privilege::Superuser);
    }

    #[tokio::test]
    async fn test_list_snapshots_accepts_root_key() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.respond(
            "snapper --json --no-dbus -c root list --disable-used-space",
            Ok(r#"{"root":[{"number":5,"type":"single"}]}"#),
        );

        let snapshots = snapper(runner).list_snapshots("root").await.unwrap();
        assert_eq!(snapshots[0].number, 5);
    }

    #[tokio::test]
    async fn test_list_snapshots_wrong_key_is_malformed() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.respond(
            "snapper --json --no-dbus -c home list --disable-used-space",
            Ok(r#"{"a":[],"b":[]}"#),
        );

        let err = snapper(runner).list_snapshots("home").await.unwrap_err();
        assert!(err.is_malformed());
    }

    #[tokio::test]
    async fn test_rollback_command_line() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.respond("snapper --json -c root rollback 42", Ok("{}"));

        snapper(runner.clone()).rollback(Some("root"), 42).await.unwrap();
        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].privilege, Privilege::Superuser);
    }
}
