//! Websocket wire protocol (§6). Inbound frames are adjacently tagged on
//! `type`/`content`, which maps directly onto the typed variants below.
//! Outbound frames are built from [`ac_domain::Event`], whose own JSON
//! shape (`{id, session_id, timestamp, kind, payload}`) differs from the
//! wire envelope — [`event_to_wire`] does the field rename.

use ac_domain::event::Event;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum MemoryToolMode {
    CompactifyMemory,
    Simple,
    #[default]
    None,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ToolArgs {
    #[serde(default)]
    pub sequential_thinking: Option<bool>,
    #[serde(default)]
    pub deep_research: Option<bool>,
    #[serde(default)]
    pub pdf: Option<bool>,
    #[serde(default)]
    pub media_generation: Option<bool>,
    #[serde(default)]
    pub audio_generation: Option<bool>,
    #[serde(default)]
    pub browser: Option<bool>,
    #[serde(default)]
    pub memory_tool: Option<MemoryToolMode>,
    #[serde(default)]
    pub enable_reviewer: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InitAgentPayload {
    pub model_name: String,
    #[serde(default)]
    pub tool_args: ToolArgs,
    #[serde(default)]
    pub thinking_tokens: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryPayload {
    pub text: String,
    #[serde(default)]
    pub resume: bool,
    #[serde(default)]
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnhancePromptPayload {
    pub model_name: String,
    pub text: String,
    #[serde(default)]
    pub files: Vec<String>,
}

/// The shape of `review_result` is owned by the (out-of-scope) reviewer UI;
/// carried through as opaque JSON rather than a typed struct.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewResultPayload {
    #[serde(flatten)]
    pub raw: Value,
}

/// A single inbound websocket frame, tagged `{"type": ..., "content": ...}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum InboundMessage {
    InitAgent(InitAgentPayload),
    Query(QueryPayload),
    EditQuery(QueryPayload),
    Cancel,
    EnhancePrompt(EnhancePromptPayload),
    WorkspaceInfo,
    Ping,
    ReviewResult(ReviewResultPayload),
}

/// Translate a persisted/broadcast [`Event`] into the wire envelope a
/// connected client expects: `kind`/`payload` renamed to `type`/`content`.
pub fn event_to_wire(event: &Event) -> Value {
    let full = serde_json::to_value(event).unwrap_or(Value::Null);
    serde_json::json!({
        "type": full.get("kind").cloned().unwrap_or(Value::Null),
        "content": full.get("payload").cloned().unwrap_or_else(|| serde_json::json!({})),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ac_domain::event::EventKind;
    use uuid::Uuid;

    #[test]
    fn init_agent_parses_nested_tool_args() {
        let raw = serde_json::json!({
            "type": "init_agent",
            "content": {
                "model_name": "claude-main",
                "tool_args": {"browser": true, "memory_tool": "compactify-memory"},
                "thinking_tokens": 4096
            }
        });
        let msg: InboundMessage = serde_json::from_value(raw).unwrap();
        match msg {
            InboundMessage::InitAgent(p) => {
                assert_eq!(p.model_name, "claude-main");
                assert_eq!(p.tool_args.browser, Some(true));
                assert_eq!(p.tool_args.memory_tool, Some(MemoryToolMode::CompactifyMemory));
                assert_eq!(p.thinking_tokens, Some(4096));
            }
            _ => panic!("expected init_agent"),
        }
    }

    #[test]
    fn unit_variants_parse_without_content() {
        let raw = serde_json::json!({"type": "ping"});
        assert!(matches!(serde_json::from_value::<InboundMessage>(raw).unwrap(), InboundMessage::Ping));

        let raw = serde_json::json!({"type": "cancel"});
        assert!(matches!(serde_json::from_value::<InboundMessage>(raw).unwrap(), InboundMessage::Cancel));
    }

    #[test]
    fn event_to_wire_renames_kind_and_payload() {
        let sid = Uuid::new_v4();
        let event = Event::new(sid, EventKind::AssistantText { text: "hi".into() });
        let wire = event_to_wire(&event);
        assert_eq!(wire["type"], "assistant_text");
        assert_eq!(wire["content"]["text"], "hi");
    }
}
