use crate::error::AppError;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use snapdash_core::ui::{SortColumn, SortDirection, SubvolumeView};
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
pub struct SortQuery {
    #[serde(default)]
    pub sort: SortColumn,
    #[serde(default)]
    pub dir: SortDirection,
}

/// GET /api/configs/{config}/snapshots?sort=id|date&dir=asc|desc
pub async fn list_snapshots(
    State(state): State<Arc<AppState>>,
    Path(config): Path<String>,
    Query(query): Query<SortQuery>,
) -> Result<Json<SubvolumeView>, AppError> {
    let current = state.store.current();
    let subvolume = current
        .subvolume(&config)
        .ok_or_else(|| AppError::NotFound(format!("Configuration {} not found", config)))?;

    Ok(Json(SubvolumeView::build(
        subvolume,
        state.diff_availability,
        query.sort,
        query.dir,
    )))
}
