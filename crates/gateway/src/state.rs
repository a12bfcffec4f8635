use std::collections::HashMap;
use std::sync::Arc;

use ac_domain::config::Config;
use ac_providers::registry::ProviderRegistry;
use ac_sandbox::SandboxRegistry;
use ac_sessions::{EventStore, HistoryStore, SessionStore};
use parking_lot::RwLock;
use regex::RegexSet;
use uuid::Uuid;

use crate::session::SessionRuntime;

/// Shared application state passed to every axum handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub llm: Arc<ProviderRegistry>,
    pub sandboxes: Arc<SandboxRegistry>,

    pub sessions: Arc<SessionStore>,
    pub events: Arc<EventStore>,
    pub history: Arc<HistoryStore>,

    pub denied_patterns: Arc<RegexSet>,

    /// Connected sessions, keyed by session id. Populated on connect,
    /// removed on disconnect — resuming a session rebuilds its runtime
    /// from the persisted stores rather than reusing a stale entry.
    pub runtimes: Arc<RwLock<HashMap<Uuid, Arc<SessionRuntime>>>>,
}
