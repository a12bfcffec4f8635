pub mod health;

use axum::routing::get;
use axum::Router;

use crate::session;
use crate::state::AppState;

/// The gateway's own HTTP surface: a health probe plus the websocket
/// endpoint that drives every session. The sandbox reverse proxy is a
/// fully self-contained router mounted separately in `main.rs`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health::health))
        .route("/ws", get(session::connect))
        .with_state(state)
}
