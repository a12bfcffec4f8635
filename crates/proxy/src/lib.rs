pub mod api;
pub mod http;
pub mod registry;
pub mod route;
pub mod ws;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use registry::ServiceRegistry;

/// Shared state for every proxy handler: the client used to forward plain
/// HTTP requests upstream, and the bookkeeping registry `/api/register`
/// writes to.
#[derive(Clone)]
pub struct ProxyState {
    pub client: reqwest::Client,
    pub registry: Arc<ServiceRegistry>,
}

impl ProxyState {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            registry: Arc::new(ServiceRegistry::new()),
        }
    }
}

impl Default for ProxyState {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the proxy's router: three admin endpoints plus a catch-all
/// fallback that handles every other host/path by forwarding to the
/// sandbox it addresses.
pub fn router() -> Router {
    Router::new()
        .route("/api/ping", get(api::ping))
        .route("/api/register", post(api::register))
        .route("/api/debug-headers", get(api::debug_headers))
        .fallback(ws::dispatch)
        .with_state(ProxyState::new())
}
