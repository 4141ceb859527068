use super::diff::fetch_cached;
use crate::error::AppError;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use snapdash_core::ui::{
    Dialog, DialogEntry, DialogId, Location, LocationQuery, DIFF_TOOL_MISSING,
};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_dialogs))
        .route("/compare", post(open_compare))
        .route("/file-diff", post(open_file_diff))
        .route("/{id}/confirm", post(confirm_compare))
        .route("/{id}/close", post(close_dialog))
}

#[derive(Debug, Serialize)]
pub struct Opened {
    pub id: DialogId,
}

async fn list_dialogs(State(state): State<Arc<AppState>>) -> Json<Vec<DialogEntry>> {
    Json(state.dialogs.lock().await.entries())
}

#[derive(Debug, Deserialize)]
pub struct CompareRequest {
    pub config: String,
    /// Current navigation state, used to pre-fill the selection
    #[serde(default)]
    pub snapshot1: Option<String>,
    #[serde(default)]
    pub snapshot2: Option<String>,
}

/// POST /api/dialogs/compare
async fn open_compare(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CompareRequest>,
) -> Result<Json<Opened>, AppError> {
    if !state.diff_availability.is_available() {
        return Err(AppError::ServiceUnavailable(DIFF_TOOL_MISSING.into()));
    }

    let current = LocationQuery {
        snapshot1: req.snapshot1,
        snapshot2: req.snapshot2,
        config: Some(req.config.clone()),
    }
    .parse()?;

    let store = state.store.current();
    let subvolume = store
        .subvolume(&req.config)
        .ok_or_else(|| AppError::NotFound(format!("Configuration {} not found", req.config)))?;

    let dialog = Dialog::compare(&req.config, &subvolume.snapshots, &current);
    let id = state.dialogs.lock().await.push(dialog);
    Ok(Json(Opened { id }))
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub snapshot1: u64,
    pub snapshot2: u64,
}

#[derive(Debug, Serialize)]
pub struct Navigate {
    pub location: Location,
    pub query: LocationQuery,
}

/// POST /api/dialogs/{id}/confirm - pick the pair and navigate to its diff
async fn confirm_compare(
    State(state): State<Arc<AppState>>,
    Path(id): Path<DialogId>,
    Json(req): Json<ConfirmRequest>,
) -> Result<Json<Navigate>, AppError> {
    let location = state
        .dialogs
        .lock()
        .await
        .confirm_compare(id, req.snapshot1, req.snapshot2)?;

    Ok(Json(Navigate {
        query: location.to_query(),
        location,
    }))
}

#[derive(Debug, Deserialize)]
pub struct FileDiffRequest {
    pub config: String,
    pub pre: u64,
    pub post: u64,
    pub path: String,
}

/// POST /api/dialogs/file-diff - open the viewer for one modified file
async fn open_file_diff(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FileDiffRequest>,
) -> Result<Json<Opened>, AppError> {
    let cached = fetch_cached(&state, &req.config, req.pre, req.post).await?;

    let dialog = cached
        .result
        .files
        .modified
        .iter()
        .find(|f| f.path == req.path)
        .and_then(Dialog::file_diff)
        .ok_or_else(|| AppError::NotFound(format!("No textual diff for {}", req.path)))?;

    let id = state.dialogs.lock().await.push(dialog);
    Ok(Json(Opened { id }))
}

/// POST /api/dialogs/{id}/close
async fn close_dialog(
    State(state): State<Arc<AppState>>,
    Path(id): Path<DialogId>,
) -> Result<StatusCode, AppError> {
    let mut dialogs = state.dialogs.lock().await;
    match dialogs.close(id) {
        Some(_) => Ok(StatusCode::NO_CONTENT),
        None if dialogs.entries().iter().any(|e| e.id == id) => Err(AppError::Conflict(format!(
            "Dialog {} is not the topmost dialog",
            id
        ))),
        None => Err(AppError::NotFound(format!("Dialog {} not found", id))),
    }
}
