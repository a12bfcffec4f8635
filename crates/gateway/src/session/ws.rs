//! Session Orchestrator (C9) websocket endpoint. Mirrors the teacher's
//! node-connection reader/writer split: the socket is cut into a sink and a
//! stream, a bounded channel carries outbound events to a dedicated writer
//! task, and the reader loop dispatches inbound frames to a typed handler.
//! `cancel`/`ping`/`workspace_info` are served directly from the reader
//! loop so they never queue up behind a running agent loop turn.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use ac_domain::event::{Event, EventKind};
use ac_domain::history::MessageHistory;
use ac_domain::session::SessionEntry;
use ac_providers::traits::{GenerateRequest, LlmProvider};

use crate::session::agent_loop;
use crate::session::manager::SessionRuntime;
use crate::session::protocol::{event_to_wire, InboundMessage};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    /// An existing session id to resume; a fresh one is minted if absent.
    pub session_id: Option<Uuid>,
    /// Stable external identity used to key the gateway's `SessionEntry` row.
    #[serde(default = "default_device_id")]
    pub device_id: String,
}

fn default_device_id() -> String {
    "default".to_string()
}

pub async fn connect(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<ConnectQuery>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, query))
}

async fn handle_socket(socket: WebSocket, state: AppState, query: ConnectQuery) {
    let (mut ws_sink, mut ws_stream) = socket.split();

    let workspace_dir = state
        .config
        .workspace
        .path
        .join(query.session_id.map(|id| id.to_string()).unwrap_or_else(|| Uuid::new_v4().to_string()))
        .to_string_lossy()
        .into_owned();

    let session = match query.session_id {
        Some(id) => state.sessions.resume_or_create(id, workspace_dir.clone(), query.device_id.clone()),
        None => state.sessions.create(workspace_dir.clone(), query.device_id.clone()),
    };
    let (entry, _) = state.sessions.resolve_or_create_entry(&query.device_id, "");

    let history = match state.history.load(session.id) {
        Ok(Some(h)) => h,
        Ok(None) => MessageHistory::new(),
        Err(e) => {
            tracing::warn!(session_id = %session.id, error = %e, "failed to load history snapshot, starting fresh");
            MessageHistory::new()
        }
    };

    let tool_client = match state.config.sandbox.mode {
        ac_domain::config::SandboxMode::Local => {
            let workspace_root = std::path::PathBuf::from(&session.workspace_dir);
            if let Err(e) = std::fs::create_dir_all(&workspace_root) {
                tracing::error!(session_id = %session.id, error = %e, "failed to create session workspace directory");
                return;
            }
            let terminal = Arc::new(ac_tools::terminal::TerminalManager::new(
                "/bin/bash",
                state.config.tools.exec.timeout_sec,
                true,
                Some(workspace_root.clone()),
            ));
            let file_edit = Arc::new(ac_tools::file_edit::FileEditManager::new(workspace_root, state.config.tools.file_edit.clone()));
            Arc::new(ac_tools::client::ToolClient::local(terminal, file_edit))
        }
        mode => {
            let domain_mode = match mode {
                ac_domain::config::SandboxMode::Container => ac_domain::SandboxMode::Container,
                ac_domain::config::SandboxMode::RemoteVm => ac_domain::SandboxMode::RemoteVm,
                ac_domain::config::SandboxMode::Local => unreachable!(),
            };
            match crate::session::manager::remote_tool_client_for_session(&state.sandboxes, domain_mode, &session.id.to_string()).await {
                Ok((_sandbox, client)) => client,
                Err(e) => {
                    tracing::error!(session_id = %session.id, error = %e, "failed to provision sandbox");
                    return;
                }
            }
        }
    };

    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<Event>();

    let runtime = Arc::new(SessionRuntime::new(
        session.clone(),
        entry,
        history,
        tool_client,
        state.denied_patterns.clone(),
        state.llm.clone(),
        events_tx,
        state.sessions.clone(),
        state.events.clone(),
        state.history.clone(),
        state.config.clone(),
    ));
    state.runtimes.write().insert(session.id, runtime.clone());

    runtime.emit(EventKind::ConnectionEstablished { workspace_path: workspace_dir }).await;

    let writer = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            let wire = event_to_wire(&event);
            let Ok(text) = serde_json::to_string(&wire) else { continue };
            if ws_sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = ws_stream.next().await {
        match msg {
            Message::Text(text) => handle_inbound(&runtime, &state, &text).await,
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) => {}
            _ => {}
        }
    }

    runtime.request_cancel();
    runtime.wait_until_idle().await;
    runtime.persist_history().await;
    writer.abort();
    state.runtimes.write().remove(&session.id);
    tracing::info!(session_id = %session.id, "session detached (sandbox left running for later resume)");
}

async fn handle_inbound(runtime: &Arc<SessionRuntime>, state: &AppState, text: &str) {
    let parsed: Result<InboundMessage, _> = serde_json::from_str(text);
    let message = match parsed {
        Ok(m) => m,
        Err(e) => {
            runtime.emit(EventKind::Error { message: format!("malformed message: {e}"), kind: "validation".into() }).await;
            return;
        }
    };

    match message {
        InboundMessage::InitAgent(payload) => {
            if state.llm.get(&payload.model_name).is_err() {
                runtime.emit(EventKind::Error { message: format!("unknown model \"{}\"", payload.model_name), kind: "validation".into() }).await;
                return;
            }
            *runtime.model_name.lock() = Some(payload.model_name.clone());
            runtime
                .enable_reviewer
                .store(payload.tool_args.enable_reviewer.unwrap_or(false), Ordering::SeqCst);
            runtime.emit(EventKind::AgentInitialized { model_name: payload.model_name }).await;
        }
        InboundMessage::Query(payload) => {
            run_query_or_command(runtime, payload.text, payload.resume, payload.files).await;
        }
        InboundMessage::EditQuery(payload) => {
            run_edit_query(runtime, payload.text, payload.files).await;
        }
        InboundMessage::Cancel => {
            runtime.request_cancel();
        }
        InboundMessage::EnhancePrompt(payload) => {
            run_enhance_prompt(runtime, state, payload.model_name, payload.text).await;
        }
        InboundMessage::WorkspaceInfo => {
            let session = runtime.session.lock().clone();
            runtime
                .emit(EventKind::WorkspaceInfo { path: session.workspace_dir, sandbox_id: session.sandbox_id })
                .await;
        }
        InboundMessage::Ping => {
            runtime.emit(EventKind::Pong).await;
        }
        InboundMessage::ReviewResult(_payload) => {
            // The reviewer UI's result shape is out of scope; nothing in the
            // core loop currently consumes it.
            tracing::debug!(session_id = %runtime.session_id(), "ignoring review_result");
        }
    }
}

async fn run_query_or_command(runtime: &Arc<SessionRuntime>, text: String, resume: bool, files: Vec<String>) {
    if !runtime.is_initialized() {
        runtime.emit(EventKind::Error { message: "session has not been initialized".into(), kind: "not_initialized".into() }).await;
        return;
    }
    if runtime.is_running() {
        runtime.emit(EventKind::Error { message: "a query is already running for this session".into(), kind: "busy".into() }).await;
        return;
    }

    let trimmed = text.trim();
    if trimmed == "/compact" {
        spawn_compact(runtime.clone()).await;
        return;
    }
    if trimmed == "/help" {
        runtime
            .emit(EventKind::System {
                message: "available commands: /compact (summarize history), /help (this message)".into(),
            })
            .await;
        runtime.emit(EventKind::StreamComplete).await;
        return;
    }

    let runtime = runtime.clone();
    tokio::spawn(async move {
        if let Err(e) = agent_loop::run_turn(runtime.clone(), text, resume, files).await {
            tracing::warn!(session_id = %runtime.session_id(), error = %e, "query turn ended in error");
        }
    });
}

async fn run_edit_query(runtime: &Arc<SessionRuntime>, text: String, files: Vec<String>) {
    if !runtime.is_initialized() {
        runtime.emit(EventKind::Error { message: "session has not been initialized".into(), kind: "not_initialized".into() }).await;
        return;
    }

    runtime.request_cancel();
    runtime.wait_until_idle().await;

    let cutoff = *runtime.last_user_event_id.lock();
    {
        let mut history = runtime.history.lock();
        history.truncate_to_last_user_turn();
    }
    if let Some(cutoff_id) = cutoff {
        if let Err(e) = runtime.event_store.delete_tail_from(runtime.session_id(), cutoff_id).await {
            tracing::warn!(session_id = %runtime.session_id(), error = %e, "failed to trim event tail for edit_query");
        }
    }

    let runtime = runtime.clone();
    tokio::spawn(async move {
        if let Err(e) = agent_loop::run_turn(runtime.clone(), text, false, files).await {
            tracing::warn!(session_id = %runtime.session_id(), error = %e, "edit_query turn ended in error");
        }
    });
}

async fn spawn_compact(runtime: Arc<SessionRuntime>) {
    if runtime.is_running() {
        runtime.emit(EventKind::Error { message: "a query is already running for this session".into(), kind: "busy".into() }).await;
        return;
    }
    runtime.running.store(true, Ordering::SeqCst);
    tokio::spawn(async move {
        let result = agent_loop::run_compact(runtime.clone()).await;
        runtime.running.store(false, Ordering::SeqCst);
        runtime.turn_done.notify_waiters();
        match result {
            Ok(()) => {
                runtime.persist_history().await;
                runtime.emit(EventKind::System { message: "history compacted".into() }).await;
            }
            Err(e) => {
                runtime.emit(EventKind::Error { message: e.to_string(), kind: e.kind().to_string() }).await;
            }
        }
        runtime.emit(EventKind::StreamComplete).await;
    });
}

async fn run_enhance_prompt(runtime: &Arc<SessionRuntime>, state: &AppState, model_name: String, text: String) {
    let Ok(provider) = state.llm.get(&model_name) else {
        runtime.emit(EventKind::Error { message: format!("unknown model \"{model_name}\""), kind: "validation".into() }).await;
        return;
    };
    let request = GenerateRequest {
        system_prompt: Some("Rewrite the user's prompt to be clearer and more specific, without changing its intent. Respond with only the rewritten prompt.".into()),
        history: vec![ac_domain::message::Turn::user_text(text)],
        tools: vec![],
        model: model_name,
        max_tokens: Some(1024),
        temperature: None,
        thinking_budget_tokens: None,
    };
    match provider.generate(request).await {
        Ok(resp) => {
            let rewritten = resp
                .turn
                .messages
                .iter()
                .find_map(|m| match m {
                    ac_domain::message::Message::TextResult { text } => Some(text.clone()),
                    _ => None,
                })
                .unwrap_or_default();
            runtime.emit(EventKind::PromptGenerated { text: rewritten }).await;
        }
        Err(e) => {
            runtime.emit(EventKind::Error { message: e.to_string(), kind: e.kind().to_string() }).await;
        }
    }
    runtime.emit(EventKind::StreamComplete).await;
}

#[allow(dead_code)]
fn _assert_session_entry_shape(_: SessionEntry) {}
