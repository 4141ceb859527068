//! In-process stand-ins for the external tools.

use crate::diff::DiffTool;
use crate::exec::{CommandRunner, CommandSpec};
use crate::snapper::SnapshotManager;
use crate::snapshot::{SnapperConfig, Snapshot, SnapshotKind};
use crate::SnapError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

fn snapshot(number: u64, kind: SnapshotKind, pre_number: Option<u64>) -> Snapshot {
    Snapshot {
        subvolume: "/".to_string(),
        number,
        default: false,
        active: false,
        kind,
        pre_number,
        date: format!("2024-01-01 00:00:{:02}", number % 60),
        user: "root".to_string(),
        cleanup: "number".to_string(),
        description: format!("snapshot {}", number),
        userdata: None,
    }
}

pub fn single(number: u64) -> Snapshot {
    snapshot(number, SnapshotKind::Single, None)
}

pub fn pre(number: u64) -> Snapshot {
    snapshot(number, SnapshotKind::Pre, None)
}

pub fn post(number: u64, pre_number: u64) -> Snapshot {
    snapshot(number, SnapshotKind::Post, Some(pre_number))
}

fn command_error(message: &str) -> SnapError {
    SnapError::Command {
        program: "fake".to_string(),
        message: message.to_string(),
    }
}

/// Answers command lines from a script and records every call
#[derive(Default)]
pub struct ScriptedRunner {
    script: Mutex<HashMap<String, Result<String, String>>>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, command_line: &str, response: Result<&str, &str>) {
        self.script.lock().unwrap().insert(
            command_line.to_string(),
            response.map(str::to_string).map_err(str::to_string),
        );
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> crate::Result<String> {
        self.calls.lock().unwrap().push(spec.clone());
        let line = spec.to_string();
        match self.script.lock().unwrap().get(&line) {
            Some(Ok(out)) => Ok(out.clone()),
            Some(Err(message)) => Err(command_error(message)),
            None => Err(command_error(&format!("unscripted command: {}", line))),
        }
    }
}

/// Diff tool that can hold every call until released
pub struct GatedDiffTool {
    response: Result<&'static str, &'static str>,
    gate: Option<Notify>,
    calls: AtomicUsize,
}

impl GatedDiffTool {
    pub fn gated(response: Result<&'static str, &'static str>) -> Self {
        Self {
            response,
            gate: Some(Notify::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn immediate(response: Result<&'static str, &'static str>) -> Self {
        Self {
            response,
            gate: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DiffTool for GatedDiffTool {
    async fn diff(&self, _config: &str, _pre: u64, _post: u64) -> crate::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.response
            .map(str::to_string)
            .map_err(command_error)
    }
}

/// Snapshot manager with per-config scripted listings and optional gates
#[derive(Default)]
pub struct FakeManager {
    configs: Mutex<Option<Vec<SnapperConfig>>>,
    listings: Mutex<HashMap<String, Result<Vec<Snapshot>, String>>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    calls: Mutex<HashMap<String, usize>>,
    config_calls: AtomicUsize,
}

impl FakeManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_configs(&self, names: &[&str]) {
        let configs = names
            .iter()
            .map(|name| SnapperConfig {
                name: name.to_string(),
                subvolume: if *name == "root" {
                    "/".to_string()
                } else {
                    format!("/{}", name)
                },
            })
            .collect();
        *self.configs.lock().unwrap() = Some(configs);
    }

    /// Make configuration listing fail
    pub fn fail_configs(&self) {
        *self.configs.lock().unwrap() = None;
    }

    pub fn set_snapshots(&self, config: &str, snapshots: Vec<Snapshot>) {
        self.listings
            .lock()
            .unwrap()
            .insert(config.to_string(), Ok(snapshots));
    }

    pub fn fail_snapshots(&self, config: &str, message: &str) {
        self.listings
            .lock()
            .unwrap()
            .insert(config.to_string(), Err(message.to_string()));
    }

    /// Hold listings of `config` until the returned gate is notified
    pub fn gate(&self, config: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates
            .lock()
            .unwrap()
            .insert(config.to_string(), gate.clone());
        gate
    }

    pub fn ungate(&self, config: &str) {
        if let Some(gate) = self.gates.lock().unwrap().remove(config) {
            gate.notify_waiters();
            gate.notify_one();
        }
    }

    pub fn listing_calls(&self, config: &str) -> usize {
        self.calls.lock().unwrap().get(config).copied().unwrap_or(0)
    }

    pub fn config_calls(&self) -> usize {
        self.config_calls.load(Ordering::SeqCst)
    }

    /// Wait until `config` has been listed at least `n` times
    pub async fn wait_for_listing(&self, config: &str, n: usize) {
        for _ in 0..1000 {
            if self.listing_calls(config) >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        panic!("{} was listed {} times, expected {}", config, self.listing_calls(config), n);
    }
}

#[async_trait]
impl SnapshotManager for FakeManager {
    async fn list_configs(&self) -> crate::Result<Vec<SnapperConfig>> {
        self.config_calls.fetch_add(1, Ordering::SeqCst);
        self.configs
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| command_error("cannot reach snapperd"))
    }

    async fn list_snapshots(&self, config: &str) -> crate::Result<Vec<Snapshot>> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(config.to_string())
            .or_insert(0) += 1;

        let gate = self.gates.lock().unwrap().get(config).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        match self.listings.lock().unwrap().get(config) {
            Some(Ok(snapshots)) => Ok(snapshots.clone()),
            Some(Err(message)) => Err(command_error(message)),
            None => Ok(Vec::new()),
        }
    }

    async fn rollback(&self, _config: Option<&str>, _number: u64) -> crate::Result<String> {
        Ok(String::new())
    }
}
