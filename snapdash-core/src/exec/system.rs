//! [`CommandRunner`] backed by real processes.

use super::{CommandRunner, CommandSpec, Privilege};
use crate::config::Config;
use crate::SnapError;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Spawns processes with `tokio::process`, escalating privilege when needed
#[derive(Debug, Clone)]
pub struct SystemRunner {
    escalation: Vec<String>,
    timeout: Option<Duration>,
}

impl SystemRunner {
    pub fn new(escalation: Vec<String>, timeout: Option<Duration>) -> Self {
        Self {
            escalation,
            timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.privilege.escalation.clone(),
            config.commands.timeout(),
        )
    }

    /// Final argv for `spec`, given whether we already run as root
    fn argv(&self, spec: &CommandSpec, is_root: bool) -> (String, Vec<String>) {
        let escalate =
            spec.privilege == Privilege::Superuser && !is_root && !self.escalation.is_empty();

        if !escalate {
            return (spec.program.clone(), spec.args.clone());
        }

        let mut args: Vec<String> = self.escalation[1..].to_vec();
        args.push(spec.program.clone());
        args.extend(spec.args.iter().cloned());
        (self.escalation[0].clone(), args)
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, spec: &CommandSpec) -> crate::Result<String> {
        let is_root = nix::unistd::geteuid().is_root();
        let (program, args) = self.argv(spec, is_root);
        debug!("Running {} {:?}", program, args);

        let child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SnapError::Spawn {
                program: spec.program.clone(),
                source,
            })?;

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| SnapError::Timeout {
                    program: spec.program.clone(),
                    secs: limit.as_secs(),
                })?,
            None => child.wait_with_output().await,
        }?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            format!("{} exited with {}", spec.program, output.status)
        } else {
            stderr
        };

        Err(SnapError::Command {
            program: spec.program.clone(),
            message,
        })
    }
}
