//! Per-connection session runtime (C9 state, C7 history, cooperative
//! cancellation). One [`SessionRuntime`] is built per websocket connection
//! and shared between the reader task and the spawned agent-loop task,
//! mirroring the teacher's connection-registry entries that hold a
//! channel-backed outbound sink plus whatever per-connection state the
//! protocol needs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ac_domain::config::Config;
use ac_domain::event::{Event, EventKind};
use ac_domain::history::MessageHistory;
use ac_domain::session::{Session, SessionEntry};
use ac_domain::tool::ToolCatalog;
use ac_providers::registry::ProviderRegistry;
use ac_providers::traits::LlmProvider;
use ac_sandbox::SandboxRegistry;
use ac_sessions::{EventStore, HistoryStore, SessionStore};
use ac_tools::client::ToolClient;
use parking_lot::Mutex;
use regex::RegexSet;
use tokio::sync::{mpsc, Notify};
use uuid::Uuid;

use crate::session::tools::ToolDispatcher;

/// Everything the agent loop and the websocket reader share for one
/// connected session. Cheap to clone (`Arc` all the way down); the fields
/// that mutate during a turn are behind `parking_lot` locks or atomics so
/// `cancel`/`ping`/`workspace_info` never block behind the running loop.
pub struct SessionRuntime {
    pub session: Mutex<Session>,
    pub entry: Mutex<SessionEntry>,
    pub history: Mutex<MessageHistory>,
    pub model_name: Mutex<Option<String>>,
    pub enable_reviewer: AtomicBool,

    pub cancelled: Arc<AtomicBool>,
    pub running: Arc<AtomicBool>,
    /// Signaled every time a turn finishes, so disconnect/edit_query can
    /// wait for an in-flight query to return before proceeding.
    pub turn_done: Arc<Notify>,
    /// Id of the most recently emitted `user_message` event, so `edit_query`
    /// knows where to cut the persisted event tail.
    pub last_user_event_id: Mutex<Option<uuid::Uuid>>,

    pub tools: Arc<ToolCatalog>,
    pub dispatcher: ToolDispatcher,
    pub llm: Arc<ProviderRegistry>,

    pub events_tx: mpsc::UnboundedSender<Event>,

    pub session_store: Arc<SessionStore>,
    pub event_store: Arc<EventStore>,
    pub history_store: Arc<HistoryStore>,

    pub config: Arc<Config>,
}

impl SessionRuntime {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session: Session,
        entry: SessionEntry,
        history: MessageHistory,
        tool_client: Arc<ToolClient>,
        denied_patterns: Arc<RegexSet>,
        llm: Arc<ProviderRegistry>,
        events_tx: mpsc::UnboundedSender<Event>,
        session_store: Arc<SessionStore>,
        event_store: Arc<EventStore>,
        history_store: Arc<HistoryStore>,
        config: Arc<Config>,
    ) -> Self {
        let terminal_id = session.id.to_string();
        let dispatcher = ToolDispatcher::new(tool_client, denied_patterns, terminal_id, config.tools.exec.timeout_sec);
        Self {
            session: Mutex::new(session),
            entry: Mutex::new(entry),
            history: Mutex::new(history),
            model_name: Mutex::new(None),
            enable_reviewer: AtomicBool::new(false),
            cancelled: Arc::new(AtomicBool::new(false)),
            running: Arc::new(AtomicBool::new(false)),
            turn_done: Arc::new(Notify::new()),
            last_user_event_id: Mutex::new(None),
            tools: Arc::new(super::tools::builtin_catalog()),
            dispatcher,
            llm,
            events_tx,
            session_store,
            event_store,
            history_store,
            config,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session.lock().id
    }

    pub fn is_initialized(&self) -> bool {
        self.model_name.lock().is_some()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn request_cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Block until the currently running turn (if any) has returned.
    pub async fn wait_until_idle(&self) {
        while self.is_running() {
            self.turn_done.notified().await;
        }
    }

    /// Emit an event: append it to the persisted log and push it onto the
    /// outbound channel the websocket writer drains. Best-effort — a
    /// disconnected writer or a persistence failure must not abort a turn.
    pub async fn emit(&self, kind: EventKind) {
        let event = Event::new(self.session_id(), kind);
        if let Err(e) = self.event_store.append(&event).await {
            tracing::warn!(session_id = %event.session_id, error = %e, "failed to persist event");
        }
        let _ = self.events_tx.send(event);
    }

    /// Emit a `user_message` event and remember its id, so a later
    /// `edit_query` can find exactly where to cut the persisted event tail.
    pub async fn record_user_message(&self, text: &str) -> Uuid {
        let event = Event::new(self.session_id(), EventKind::UserMessage { text: text.to_string() });
        let id = event.id;
        if let Err(e) = self.event_store.append(&event).await {
            tracing::warn!(session_id = %event.session_id, error = %e, "failed to persist event");
        }
        let _ = self.events_tx.send(event);
        *self.last_user_event_id.lock() = Some(id);
        id
    }

    pub fn apply_first_message_naming(&self, text: &str) {
        let mut session = self.session.lock();
        session.set_name_from_first_message(text);
        self.session_store.update(session.clone());
    }

    pub fn llm_provider(&self) -> ac_domain::error::Result<Arc<dyn LlmProvider>> {
        let model = self.model_name.lock().clone().ok_or(ac_domain::error::Error::NotInitialized)?;
        self.llm.get(&model)
    }

    pub fn model_name(&self) -> Option<String> {
        self.model_name.lock().clone()
    }

    pub fn record_usage(&self, input_tokens: u64, output_tokens: u64) {
        let key = self.session.lock().device_id.clone();
        self.session_store.record_usage(&key, input_tokens, output_tokens);
        let mut entry = self.entry.lock();
        entry.record_usage(input_tokens, output_tokens);
    }

    pub async fn persist_history(&self) {
        let (id, snapshot) = {
            let history = self.history.lock();
            (self.session_id(), history.clone())
        };
        if let Err(e) = self.history_store.save(id, &snapshot) {
            tracing::warn!(session_id = %id, error = %e, "failed to persist history snapshot");
        }
    }
}

pub type SharedSessionRuntime = Arc<SessionRuntime>;

/// Create (or reconnect) the sandbox backing one session and build the
/// [`ToolClient`] that talks to it. `SandboxMode::Local` never goes through
/// the registry's HTTP round-trip — the caller builds an in-process
/// [`ToolClient::Local`] directly instead of calling this.
pub async fn remote_tool_client_for_session(
    registry: &SandboxRegistry,
    mode: ac_domain::SandboxMode,
    session_id: &str,
) -> ac_domain::error::Result<(ac_domain::Sandbox, Arc<ToolClient>)> {
    let sandbox = registry.create(mode, session_id).await?;
    let base_url = registry.backend(mode)?.connect(&sandbox).await?;
    Ok((sandbox, Arc::new(ToolClient::remote(base_url, std::time::Duration::from_secs(30)))))
}
