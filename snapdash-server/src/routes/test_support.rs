//! Router harness with in-process stand-ins for snapper, sndiff and reboot.

use crate::config::AppConfig;
use crate::state::{AppState, Backends};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use snapdash_core::diff::{DiffAvailability, DiffTool};
use snapdash_core::exec::{CommandRunner, CommandSpec};
use snapdash_core::snapper::SnapshotManager;
use snapdash_core::snapshot::{SnapperConfig, Snapshot};
use snapdash_core::{Config, SnapError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

/// A single snapshot followed by a pre/post pair; the post is active and default
pub const LISTING_ROOT: &str = r#"[
    {"subvolume": "/", "number": 1, "default": false, "active": false, "type": "single",
     "date": "2024-03-01 09:00:00", "user": "root", "cleanup": "", "description": "first root filesystem"},
    {"subvolume": "/", "number": 2, "default": false, "active": false, "type": "pre",
     "date": "2024-03-02 10:00:00", "user": "root", "cleanup": "number", "description": "zypp(zypper)",
     "userdata": {"important": "yes"}},
    {"subvolume": "/", "number": 3, "default": true, "active": true, "type": "post", "pre-number": 2,
     "date": "2024-03-02 10:01:00", "user": "root", "cleanup": "number", "description": ""}
]"#;

pub const DIFF_REPORT: &str = r#"{
    "packages": {
        "updated": [{"name": "bash", "version_from": "5.2.15", "version_to": "5.2.21", "changelog_diff": ""}],
        "downgraded": [], "added": [], "removed": []
    },
    "files": {
        "modified": [
            {"path": "/etc/fstab", "file_diff": "@@ -1 +1 @@\n-UUID=a / btrfs\n+UUID=b / btrfs"},
            {"path": "/usr/bin/ls", "file_diff": ""}
        ],
        "added": [], "removed": []
    }
}"#;

const EMPTY_REPORT: &str = r#"{"packages": {}, "files": {}}"#;

fn tool_error(message: &str) -> SnapError {
    SnapError::Command {
        program: "stub".to_string(),
        message: message.to_string(),
    }
}

#[derive(Default)]
pub struct StubManager {
    configs: Mutex<Vec<SnapperConfig>>,
    listings: Mutex<HashMap<String, Result<String, String>>>,
    rollback_error: Mutex<Option<String>>,
    rollbacks: Mutex<Vec<(Option<String>, u64)>>,
}

impl StubManager {
    pub fn set_configs(&self, configs: &[(&str, &str)]) {
        *self.configs.lock().unwrap() = configs
            .iter()
            .map(|(name, subvolume)| SnapperConfig {
                name: name.to_string(),
                subvolume: subvolume.to_string(),
            })
            .collect();
    }

    pub fn set_listing(&self, config: &str, json: &str) {
        self.listings
            .lock()
            .unwrap()
            .insert(config.to_string(), Ok(json.to_string()));
    }

    pub fn fail_listing(&self, config: &str, message: &str) {
        self.listings
            .lock()
            .unwrap()
            .insert(config.to_string(), Err(message.to_string()));
    }

    pub fn fail_rollback(&self, message: &str) {
        *self.rollback_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn rollbacks(&self) -> Vec<(Option<String>, u64)> {
        self.rollbacks.lock().unwrap().clone()
    }
}

#[async_trait]
impl SnapshotManager for StubManager {
    async fn list_configs(&self) -> snapdash_core::Result<Vec<SnapperConfig>> {
        Ok(self.configs.lock().unwrap().clone())
    }

    async fn list_snapshots(&self, config: &str) -> snapdash_core::Result<Vec<Snapshot>> {
        let listing = self.listings.lock().unwrap().get(config).cloned();
        match listing {
            Some(Ok(json)) => Ok(serde_json::from_str(&json)?),
            Some(Err(message)) => Err(tool_error(&message)),
            None => Ok(Vec::new()),
        }
    }

    async fn rollback(&self, config: Option<&str>, number: u64) -> snapdash_core::Result<String> {
        self.rollbacks
            .lock()
            .unwrap()
            .push((config.map(str::to_string), number));
        match self.rollback_error.lock().unwrap().clone() {
            Some(message) => Err(tool_error(&message)),
            None => Ok(String::new()),
        }
    }
}

pub struct StubDiffTool {
    response: Mutex<Result<String, String>>,
    calls: AtomicUsize,
}

impl Default for StubDiffTool {
    fn default() -> Self {
        Self {
            response: Mutex::new(Ok(EMPTY_REPORT.to_string())),
            calls: AtomicUsize::new(0),
        }
    }
}

impl StubDiffTool {
    pub fn respond(&self, response: Result<&str, &str>) {
        *self.response.lock().unwrap() = response.map(str::to_string).map_err(str::to_string);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DiffTool for StubDiffTool {
    async fn diff(&self, _config: &str, _pre: u64, _post: u64) -> snapdash_core::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.response.lock().unwrap().clone().map_err(|m| tool_error(&m))
    }
}

#[derive(Default)]
pub struct StubRunner {
    calls: Mutex<Vec<String>>,
    error: Mutex<Option<String>>,
}

impl StubRunner {
    pub fn fail(&self, message: &str) {
        *self.error.lock().unwrap() = Some(message.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for StubRunner {
    async fn run(&self, spec: &CommandSpec) -> snapdash_core::Result<String> {
        self.calls.lock().unwrap().push(spec.to_string());
        match self.error.lock().unwrap().clone() {
            Some(message) => Err(tool_error(&message)),
            None => Ok(String::new()),
        }
    }
}

pub struct TestApp {
    pub state: Arc<AppState>,
    pub manager: Arc<StubManager>,
    pub diff_tool: Arc<StubDiffTool>,
    pub runner: Arc<StubRunner>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_availability(DiffAvailability::Available)
    }

    pub fn without_diff_tool() -> Self {
        Self::with_availability(DiffAvailability::Missing)
    }

    fn with_availability(availability: DiffAvailability) -> Self {
        let manager = Arc::new(StubManager::default());
        let diff_tool = Arc::new(StubDiffTool::default());
        let runner = Arc::new(StubRunner::default());

        let config = AppConfig {
            core: Config::default(),
            config_path: None,
        };
        let backends = Backends {
            manager: manager.clone(),
            diff_tool: diff_tool.clone(),
            runner: runner.clone(),
        };

        Self {
            state: Arc::new(AppState::new(config, backends, availability)),
            manager,
            diff_tool,
            runner,
        }
    }

    pub fn router(&self) -> Router {
        super::create_router(self.state.clone())
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("router is infallible");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("readable body");
    // Extractor rejections answer in plain text.
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, body)
}

pub async fn get_json(router: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("valid request");
    send(router, request).await
}

pub async fn post_json(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("valid request");
    send(router, request).await
}
