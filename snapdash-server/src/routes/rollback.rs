use crate::error::AppError;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use snapdash_core::rollback::RollbackOutcome;
use snapdash_core::ui::{Dialog, DialogId};
use std::sync::Arc;

pub fn system_router() -> Router<Arc<AppState>> {
    Router::new().route("/reboot", post(reboot))
}

#[derive(Debug, Serialize)]
pub struct RollbackResponse {
    pub dialog: DialogId,
    #[serde(flatten)]
    pub outcome: RollbackOutcome,
}

/// POST /api/configs/{config}/snapshots/{number}/rollback
///
/// Always answers 200; a failed rollback is an outcome, not a transport error.
pub async fn rollback(
    State(state): State<Arc<AppState>>,
    Path((config, number)): Path<(String, u64)>,
) -> Result<Json<RollbackResponse>, AppError> {
    if state.store.current().subvolume(&config).is_none() {
        return Err(AppError::NotFound(format!("Configuration {} not found", config)));
    }

    let outcome = state.rollback.rollback(Some(config.as_str()), number).await;

    let dialog = state
        .dialogs
        .lock()
        .await
        .push(Dialog::rollback(outcome.clone()));

    state.ui.broadcast(
        "rollback:completed",
        json!({ "config": config, "snapshot": number, "success": outcome.is_success() }),
    );
    if outcome.is_success() {
        // The rollback created snapshots of its own.
        state.refresh.trigger();
    }

    Ok(Json(RollbackResponse { dialog, outcome }))
}

/// POST /api/system/reboot - the explicit follow-up to a successful rollback
async fn reboot(State(state): State<Arc<AppState>>) -> Result<StatusCode, AppError> {
    state.power.reboot().await?;
    Ok(StatusCode::ACCEPTED)
}
