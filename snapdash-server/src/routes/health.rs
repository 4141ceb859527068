//! Health check endpoints.

use crate::state::AppState;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use std::sync::Arc;

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.store.current();
    let failed: Vec<&str> = snapshot
        .subvolumes
        .values()
        .filter(|s| s.error_message().is_some())
        .map(|s| s.config.name.as_str())
        .collect();

    Json(json!({
        "status": if failed.is_empty() { "ok" } else { "degraded" },
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "configs": snapshot.configs.len(),
        "failed_configs": failed,
        "diff_tool": state.diff_availability,
        "cached_diffs": state.diffs.len(),
    }))
}

/// GET /version
pub async fn version(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut features = vec!["rollback"];
    if state.diff_availability.is_available() {
        features.push("sndiff");
    }

    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "build": if cfg!(debug_assertions) { "dev" } else { "release" },
        "features": features,
    }))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{get_json, TestApp};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_failed_listing_degrades_health() {
        let app = TestApp::new();
        app.manager.set_configs(&[("root", "/"), ("home", "/home")]);
        app.manager.fail_listing("home", "Unknown config.");
        app.state.sync.refresh().await;

        let (status, body) = get_json(&app.router(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["configs"], 2);
        assert_eq!(body["failed_configs"], serde_json::json!(["home"]));
        assert_eq!(body["diff_tool"], "available");
    }

    #[tokio::test]
    async fn test_version_lists_diff_feature_only_when_installed() {
        let (_, body) = get_json(&TestApp::new().router(), "/version").await;
        assert_eq!(body["features"], serde_json::json!(["rollback", "sndiff"]));

        let (_, body) = get_json(&TestApp::without_diff_tool().router(), "/version").await;
        assert_eq!(body["features"], serde_json::json!(["rollback"]));
    }
}
