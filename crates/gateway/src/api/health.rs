use axum::extract::State;
use axum::Json;

use crate::state::AppState;

/// Liveness/readiness probe: reports whether at least one LLM model is
/// registered, mirroring the shape operators expect from a load balancer
/// health check.
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "models_configured": state.llm.len(),
        "sandbox_mode": format!("{:?}", state.config.sandbox.mode),
    }))
}
