mod api;
mod health;
mod session;
mod ui;

use axum::Router;
use tower_http::trace::TraceLayer;

use api::api_router;
use health::health_router;
use ui::ui_router;

use crate::state::AppState;

pub use session::{SESSION_COOKIE, SessionCookie};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(ui_router())
        .nest("/health", health_router())
        .nest("/api", api_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
