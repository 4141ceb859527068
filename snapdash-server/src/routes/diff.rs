use crate::error::AppError;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use snapdash_core::diff::{present, CachedDiff, DiffKey, DiffView, FetchStatus};
use snapdash_core::ui::{resolve_config, Crumb, Location, LocationQuery, DIFF_TOOL_MISSING};
use std::sync::Arc;

pub fn compare_router() -> Router<Arc<AppState>> {
    Router::new().route("/api/compare", get(compare))
}

#[derive(Debug, Serialize)]
pub struct DiffResponse {
    pub config: String,
    pub pre: u64,
    pub post: u64,
    pub status: FetchStatus,
    pub fetched_at: DateTime<Utc>,
    #[serde(flatten)]
    pub view: DiffView,
}

fn require_diff_tool(state: &AppState) -> Result<(), AppError> {
    if state.diff_availability.is_available() {
        Ok(())
    } else {
        Err(AppError::ServiceUnavailable(DIFF_TOOL_MISSING.into()))
    }
}

/// Fetch the diff of a pair, or reuse the cached one
pub(crate) async fn fetch_cached(
    state: &AppState,
    config: &str,
    pre: u64,
    post: u64,
) -> Result<Arc<CachedDiff>, AppError> {
    require_diff_tool(state)?;
    if state.store.current().subvolume(config).is_none() {
        return Err(AppError::NotFound(format!("Configuration {} not found", config)));
    }
    Ok(state.diffs.get(&DiffKey::new(config, pre, post)).await)
}

/// Fetch (or reuse) the diff of a pair and lay it out for display
async fn load_diff(
    state: &AppState,
    config: &str,
    pre: u64,
    post: u64,
) -> Result<DiffResponse, AppError> {
    let cached = fetch_cached(state, config, pre, post).await?;
    Ok(DiffResponse {
        config: config.to_string(),
        pre,
        post,
        status: cached.status.clone(),
        fetched_at: cached.fetched_at,
        view: present(&cached.result),
    })
}

/// GET /api/configs/{config}/diff/{pre}/{post} - expanding a row
pub async fn get_diff(
    State(state): State<Arc<AppState>>,
    Path((config, pre, post)): Path<(String, u64, u64)>,
) -> Result<Json<DiffResponse>, AppError> {
    Ok(Json(load_diff(&state, &config, pre, post).await?))
}

#[derive(Debug, Serialize)]
pub struct ComparePage {
    pub location: Location,
    pub breadcrumb: Vec<Crumb>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<DiffResponse>,
}

/// GET /api/compare?snapshot1=&snapshot2=&config= - deep link into the diff view
async fn compare(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LocationQuery>,
) -> Result<Json<ComparePage>, AppError> {
    let location = match query.parse()? {
        Location::Dashboard => {
            return Ok(Json(ComparePage {
                breadcrumb: Location::Dashboard.breadcrumb(),
                location: Location::Dashboard,
                diff: None,
            }))
        }
        Location::Diff { config, pre, post } => {
            require_diff_tool(&state)?;
            let configs = state.store.current().configs.clone();
            let config = resolve_config(config.as_deref(), &configs)?;
            Location::diff(Some(config), pre, post)
        }
    };

    let diff = match &location {
        Location::Diff {
            config: Some(config),
            pre,
            post,
        } => Some(load_diff(&state, config, *pre, *post).await?),
        _ => None,
    };

    Ok(Json(ComparePage {
        breadcrumb: location.breadcrumb(),
        location,
        diff,
    }))
}
