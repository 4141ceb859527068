pub mod configs;
pub mod dialogs;
pub mod diff;
pub mod health;
pub mod rollback;
pub mod snapshots;

#[cfg(test)]
mod test_support;

use crate::state::AppState;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

pub fn create_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route("/health", get(health::health))
        .route("/version", get(health::version))
        .nest("/api/configs", configs::router())
        .nest("/api/dialogs", dialogs::router())
        .nest("/api/system", rollback::system_router())
        .merge(diff::compare_router())
        .merge(configs::refresh_router())
        .route("/ws", get(crate::ws::ui::ws_handler));

    if let Some(ui_dir) = &state.config.core.server.ui_dir {
        let index_html = ui_dir.join("index.html");
        router =
            router.fallback_service(ServeDir::new(ui_dir).fallback(ServeFile::new(index_html)));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
