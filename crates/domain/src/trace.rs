use serde::Serialize;

/// Structured trace events emitted across every agentcore crate. One
/// variant per externally-visible state transition (C11); `.emit()` logs it
/// as a single `tracing::info!` record so a JSON log sink can index on
/// `trace_event` without the caller reaching for `tracing` macros directly.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    WebsocketConnected {
        session_id: String,
    },
    WebsocketDisconnected {
        session_id: String,
        had_running_query: bool,
    },
    SessionResolved {
        session_key: String,
        session_id: String,
        is_new: bool,
    },
    SessionReset {
        session_key: String,
        old_session_id: String,
        new_session_id: String,
        reason: String,
    },
    AgentInitialized {
        session_id: String,
        model: String,
    },
    TurnStarted {
        session_id: String,
        turn_index: usize,
    },
    ToolDispatched {
        session_id: String,
        tool_name: String,
        call_id: String,
        remote: bool,
    },
    ContextTruncated {
        session_id: String,
        strategy: String,
        turns_before: usize,
        turns_after: usize,
        tokens_before: usize,
        tokens_after: usize,
    },
    SummarizationFailed {
        session_id: String,
        events_lost: usize,
        error: String,
    },
    LlmRequest {
        session_id: String,
        model: String,
        streaming: bool,
        duration_ms: u64,
        prompt_tokens: Option<u32>,
        completion_tokens: Option<u32>,
    },
    LlmRetry {
        session_id: String,
        attempt: u32,
        error: String,
    },
    SandboxCreated {
        session_id: String,
        sandbox_id: String,
        mode: String,
    },
    SandboxCleanedUp {
        sandbox_id: String,
    },
    ProxyRouted {
        host: String,
        container: String,
        port: u16,
        status: u16,
        duration_ms: u64,
    },
    TranscriptAppend {
        session_id: String,
        turns: usize,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "agentcore_event");
    }
}
