//! Rollback orchestration.
//!
//! A rollback targets exactly one snapshot. Success always means a reboot is
//! still needed; the reboot itself is a separate, explicit operation.

use crate::exec::{CommandRunner, CommandSpec};
use crate::snapper::SnapshotManager;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

pub const REBOOT_NOTICE: &str = "A reboot is needed to complete the rollback";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RollbackOutcome {
    Succeeded { snapshot: u64, reboot_required: bool },
    Failed { snapshot: u64, message: String },
}

impl RollbackOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RollbackOutcome::Succeeded { .. })
    }

    /// Headline for the outcome dialog
    pub fn title(&self) -> &'static str {
        match self {
            RollbackOutcome::Succeeded { .. } => "Rolled back successfully",
            RollbackOutcome::Failed { .. } => "There was an error",
        }
    }

    /// Body text: the reboot notice, or the tool's message verbatim
    pub fn message(&self) -> &str {
        match self {
            RollbackOutcome::Succeeded { .. } => REBOOT_NOTICE,
            RollbackOutcome::Failed { message, .. } => message,
        }
    }

    pub fn offers_reboot(&self) -> bool {
        matches!(
            self,
            RollbackOutcome::Succeeded {
                reboot_required: true,
                ..
            }
        )
    }
}

/// Issues rollbacks; never retries and never reboots
#[derive(Clone)]
pub struct RollbackOrchestrator {
    manager: Arc<dyn SnapshotManager>,
}

impl RollbackOrchestrator {
    pub fn new(manager: Arc<dyn SnapshotManager>) -> Self {
        Self { manager }
    }

    pub async fn rollback(&self, config: Option<&str>, snapshot: u64) -> RollbackOutcome {
        info!("Rolling back to snapshot {} (config: {:?})", snapshot, config);

        match self.manager.rollback(config, snapshot).await {
            Ok(_) => {
                info!("Rollback to snapshot {} succeeded, reboot required", snapshot);
                RollbackOutcome::Succeeded {
                    snapshot,
                    reboot_required: true,
                }
            }
            Err(e) => {
                error!("Rollback to snapshot {} failed: {}", snapshot, e);
                RollbackOutcome::Failed {
                    snapshot,
                    message: e.to_string(),
                }
            }
        }
    }
}

/// Explicit reboot, offered after a successful rollback
#[derive(Clone)]
pub struct SystemPower {
    runner: Arc<dyn CommandRunner>,
}

impl SystemPower {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    pub async fn reboot(&self) -> crate::Result<()> {
        info!("Reboot requested");
        self.runner
            .run(&CommandSpec::new("reboot").superuser())
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::Privilege;
    use crate::snapper::Snapper;
    use crate::testing::ScriptedRunner;

    fn orchestrator(runner: Arc<ScriptedRunner>) -> RollbackOrchestrator {
        RollbackOrchestrator::new(Arc::new(Snapper::new("snapper", runner)))
    }

    #[tokio::test]
    async fn test_success_requires_reboot() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.respond("snapper --json rollback 7", Ok(r#"{"ok": true}"#));

        let outcome = orchestrator(runner.clone()).rollback(None, 7).await;
        assert_eq!(
            outcome,
            RollbackOutcome::Succeeded {
                snapshot: 7,
                reboot_required: true
            }
        );
        assert!(outcome.offers_reboot());
        assert_eq!(outcome.message(), REBOOT_NOTICE);

        // Only the rollback itself ran; no reboot behind the caller's back.
        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, "snapper");
    }

    #[tokio::test]
    async fn test_failure_carries_exact_message() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.respond("snapper --json rollback 7", Err("subvolume busy"));

        let outcome = orchestrator(runner.clone()).rollback(None, 7).await;
        assert_eq!(
            outcome,
            RollbackOutcome::Failed {
                snapshot: 7,
                message: "subvolume busy".to_string()
            }
        );
        assert!(!outcome.offers_reboot());
        assert_eq!(outcome.title(), "There was an error");
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_reboot_is_explicit_and_privileged() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.respond("reboot", Ok(""));

        SystemPower::new(runner.clone()).reboot().await.unwrap();
        let calls = runner.calls();
        assert_eq!(calls[0].program, "reboot");
        assert_eq!(calls[0].privilege, Privilege::Superuser);
    }
}
