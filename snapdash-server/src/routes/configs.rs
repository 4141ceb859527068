use super::{diff, rollback, snapshots};
use crate::state::AppState;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use snapdash_core::sync::ListingStatus;
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_configs))
        .route("/{config}/snapshots", get(snapshots::list_snapshots))
        .route(
            "/{config}/snapshots/{number}/rollback",
            post(rollback::rollback),
        )
        .route("/{config}/diff/{pre}/{post}", get(diff::get_diff))
}

pub fn refresh_router() -> Router<Arc<AppState>> {
    Router::new().route("/api/refresh", post(refresh))
}

#[derive(Debug, Serialize)]
pub struct ConfigRow {
    pub config: String,
    pub subvolume: String,
    pub status: ListingStatus,
    pub snapshots: usize,
}

async fn list_configs(State(state): State<Arc<AppState>>) -> Json<Vec<ConfigRow>> {
    let current = state.store.current();
    let rows = current
        .configs
        .iter()
        .map(|config| {
            let subvolume = current.subvolume(&config.name);
            ConfigRow {
                config: config.name.clone(),
                subvolume: config.subvolume.clone(),
                status: subvolume
                    .map(|s| s.status.clone())
                    .unwrap_or(ListingStatus::Pending),
                snapshots: subvolume.map(|s| s.snapshots.len()).unwrap_or(0),
            }
        })
        .collect();
    Json(rows)
}

#[derive(Debug, Serialize)]
struct RefreshResponse {
    requested: bool,
}

/// POST /api/refresh - re-list everything, as if the snapshot manager had
/// announced a change
async fn refresh(State(state): State<Arc<AppState>>) -> Json<RefreshResponse> {
    let reached = state.refresh.trigger();
    if reached == 0 {
        tracing::warn!("Refresh requested but sync is not running");
    }
    Json(RefreshResponse {
        requested: reached > 0,
    })
}
