//! AppState construction, extracted from `main.rs` so the `serve` and
//! `doctor`/`config` CLI paths can share it without double-initializing
//! every subsystem.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;

use ac_domain::config::{Config, ConfigSeverity};
use ac_providers::registry::ProviderRegistry;
use ac_sessions::{EventStore, HistoryStore, SessionStore};
use parking_lot::RwLock;

use crate::state::AppState;

/// Validate config and initialize every subsystem, returning a fully-wired
/// [`AppState`]. Shared by `serve` and `doctor`.
pub fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues.iter().filter(|i| i.severity == ConfigSeverity::Error).count()
        );
    }

    std::fs::create_dir_all(&config.workspace.path).context("creating workspace root")?;
    std::fs::create_dir_all(&config.workspace.state_path).context("creating state directory")?;

    let llm = Arc::new(ProviderRegistry::from_config(&config.llm));
    if llm.is_empty() {
        tracing::warn!("no LLM providers initialized — configure API keys to enable model access");
    } else {
        tracing::info!(providers = llm.len(), "LLM provider registry ready");
    }

    let sandboxes = Arc::new(
        ac_sandbox::registry_for_config(&config.sandbox, config.workspace.path.clone())
            .context("initializing sandbox registry")?,
    );
    tracing::info!(mode = ?config.sandbox.mode, "sandbox registry ready");

    let sessions = Arc::new(SessionStore::new(&config.workspace.state_path).context("initializing session store")?);
    let events = Arc::new(EventStore::new(&config.workspace.state_path).context("initializing event store")?);
    let history = Arc::new(HistoryStore::from_config(&config.workspace.file_store).context("initializing history store")?);
    tracing::info!("session/event/history stores ready");

    let denied_patterns = Arc::new(
        regex::RegexSet::new(&config.tools.exec_security.denied_patterns)
            .context("invalid regex in tools.exec_security.denied_patterns")?,
    );
    tracing::info!(patterns = config.tools.exec_security.denied_patterns.len(), "exec denied-patterns compiled");

    Ok(AppState {
        config,
        llm,
        sandboxes,
        sessions,
        events,
        history,
        denied_patterns,
        runtimes: Arc::new(RwLock::new(HashMap::new())),
    })
}

/// Spawn the gateway's long-running background tasks (periodic session
/// flush). Call after [`build_app_state`] when running the HTTP server.
pub fn spawn_background_tasks(state: &AppState) {
    let sessions = state.sessions.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(30));
        loop {
            interval.tick().await;
            if let Err(e) = sessions.flush().await {
                tracing::warn!(error = %e, "session store flush failed");
            }
        }
    });
    tracing::info!("background tasks spawned");
}
