use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The closed set of externally-visible state transitions a session can
/// emit. One `Event` per transition, append-only, drained to the websocket
/// by the Session Orchestrator and persisted behind C12.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum EventKind {
    ConnectionEstablished { workspace_path: String },
    AgentInitialized { model_name: String },
    Processing,
    UserMessage { text: String },
    AssistantText { text: String },
    Thinking { text: String },
    ToolCall {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        id: String,
        name: String,
        output: String,
    },
    FileEdit {
        path: String,
        operation: String,
    },
    WorkspaceInfo {
        path: String,
        sandbox_id: Option<String>,
    },
    Pong,
    System { message: String },
    PromptGenerated { text: String },
    StreamComplete,
    AgentResponse { text: String },
    Error { message: String, kind: String },
}

/// An append-only record on a session's event log, ordered by `timestamp`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub session_id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl Event {
    pub fn new(session_id: Uuid, kind: EventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            timestamp: Utc::now(),
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_carries_its_session_id() {
        let sid = Uuid::new_v4();
        let ev = Event::new(sid, EventKind::Pong);
        assert_eq!(ev.session_id, sid);
    }

    #[test]
    fn event_serializes_with_tagged_kind() {
        let sid = Uuid::new_v4();
        let ev = Event::new(
            sid,
            EventKind::ToolCall {
                id: "c1".into(),
                name: "exec".into(),
                input: serde_json::json!({"cmd": "ls"}),
            },
        );
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["kind"], "tool_call");
        assert_eq!(json["payload"]["name"], "exec");
    }
}
