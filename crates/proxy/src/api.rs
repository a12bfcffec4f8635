use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::ProxyState;

/// `GET /api/ping` — simple liveness probe.
pub async fn ping() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok", "message": "pong" }))
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    port: Option<u16>,
    container_name: Option<String>,
}

fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

/// `POST /api/register` — a sandbox-internal service announces itself.
/// Purely informational bookkeeping; the proxy still routes by `Host`
/// header on every request regardless of what's registered here.
pub async fn register(State(state): State<ProxyState>, Json(req): Json<RegisterRequest>) -> Response {
    let Some(port) = req.port else {
        return api_error(StatusCode::BAD_REQUEST, "port is required");
    };
    let Some(container_name) = req.container_name else {
        return api_error(StatusCode::BAD_REQUEST, "container_name is required");
    };

    let entry = state.registry.register(&container_name, port);
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "message": format!("Service of container '{container_name}' running on port '{port}'"),
            "service": entry,
        })),
    )
        .into_response()
}

/// `GET /api/debug-headers` — echoes the request's headers for
/// troubleshooting routing issues from outside the sandbox network.
pub async fn debug_headers(headers: HeaderMap) -> Json<serde_json::Value> {
    let map: serde_json::Map<String, serde_json::Value> = headers
        .iter()
        .map(|(name, value)| {
            (
                name.to_string(),
                serde_json::Value::String(value.to_str().unwrap_or("").to_string()),
            )
        })
        .collect();
    Json(serde_json::json!({ "headers": map }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ping_reports_ok() {
        let Json(body) = ping().await;
        assert_eq!(body["status"], "ok");
    }
}
