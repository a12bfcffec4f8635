use serde::{Deserialize, Serialize};

/// One content block inside a turn. Tagged by `type` on the wire so a
/// history snapshot round-trips through JSON without ambiguity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// User-submitted text (`query`, `edit_query`, or a slash-command body).
    TextPrompt { text: String },
    /// Assistant-produced final or intermediate text answer.
    TextResult { text: String },
    /// Assistant reasoning that precedes the result it justifies.
    Thinking { text: String },
    /// Opaque reasoning the provider redacted; carried through unmodified.
    RedactedThinking { data: String },
    /// A tool invocation requested by the assistant.
    ToolCall {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    /// The result of a previously requested tool call.
    ToolResult {
        id: String,
        name: String,
        output: String,
    },
}

impl Message {
    pub fn is_tool_call(&self) -> bool {
        matches!(self, Message::ToolCall { .. })
    }

    pub fn is_tool_result(&self) -> bool {
        matches!(self, Message::ToolResult { .. })
    }

    pub fn is_thinking(&self) -> bool {
        matches!(self, Message::Thinking { .. } | Message::RedactedThinking { .. })
    }

    pub fn is_text_prompt(&self) -> bool {
        matches!(self, Message::TextPrompt { .. })
    }

    /// Id of the tool call/result this block refers to, if any.
    pub fn tool_id(&self) -> Option<&str> {
        match self {
            Message::ToolCall { id, .. } | Message::ToolResult { id, .. } => Some(id.as_str()),
            _ => None,
        }
    }

    /// Flattened text used for token counting and summarization prompts:
    /// tool-call/result payloads render as their JSON text.
    pub fn flat_text(&self) -> String {
        match self {
            Message::TextPrompt { text } | Message::TextResult { text } | Message::Thinking { text } => {
                text.clone()
            }
            Message::RedactedThinking { data } => data.clone(),
            Message::ToolCall { name, input, .. } => {
                format!("tool_call {name} {}", input)
            }
            Message::ToolResult { name, output, .. } => {
                format!("tool_result {name} {output}")
            }
        }
    }
}

/// Who spoke a turn. Tool results are carried on user-role turns per the
/// history's alternation invariant (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// An ordered, non-empty sequence of messages spoken by one role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub messages: Vec<Message>,
}

impl Turn {
    pub fn new(role: Role, messages: Vec<Message>) -> Self {
        Self { role, messages }
    }

    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            messages: vec![Message::TextPrompt { text: text.into() }],
        }
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            messages: vec![Message::TextResult { text: text.into() }],
        }
    }

    pub fn tool_result(id: impl Into<String>, name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            messages: vec![Message::ToolResult {
                id: id.into(),
                name: name.into(),
                output: output.into(),
            }],
        }
    }

    /// Pending tool calls in this turn — those with no `ToolResult` among
    /// its own messages. Per the agent-loop invariant there is at most one.
    pub fn pending_tool_calls(&self) -> Vec<&Message> {
        let resolved: std::collections::HashSet<&str> = self
            .messages
            .iter()
            .filter_map(|m| match m {
                Message::ToolResult { id, .. } => Some(id.as_str()),
                _ => None,
            })
            .collect();
        self.messages
            .iter()
            .filter(|m| matches!(m, Message::ToolCall { id, .. } if !resolved.contains(id.as_str())))
            .collect()
    }

    /// `true` when thinking blocks in this turn precede every `TextResult`/`ToolCall`.
    pub fn thinking_precedes_results(&self) -> bool {
        let mut seen_result = false;
        for m in &self.messages {
            match m {
                Message::Thinking { .. } | Message::RedactedThinking { .. } => {
                    if seen_result {
                        return false;
                    }
                }
                Message::TextResult { .. } | Message::ToolCall { .. } => seen_result = true,
                _ => {}
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_tool_calls_excludes_resolved() {
        let turn = Turn::new(
            Role::Assistant,
            vec![
                Message::ToolCall {
                    id: "c1".into(),
                    name: "exec".into(),
                    input: serde_json::json!({}),
                },
                Message::ToolCall {
                    id: "c2".into(),
                    name: "exec".into(),
                    input: serde_json::json!({}),
                },
            ],
        );
        assert_eq!(turn.pending_tool_calls().len(), 2);
    }

    #[test]
    fn thinking_before_result_is_valid() {
        let turn = Turn::new(
            Role::Assistant,
            vec![
                Message::Thinking { text: "reasoning".into() },
                Message::TextResult { text: "answer".into() },
            ],
        );
        assert!(turn.thinking_precedes_results());
    }

    #[test]
    fn thinking_after_result_is_invalid() {
        let turn = Turn::new(
            Role::Assistant,
            vec![
                Message::TextResult { text: "answer".into() },
                Message::Thinking { text: "reasoning".into() },
            ],
        );
        assert!(!turn.thinking_precedes_results());
    }

    #[test]
    fn flat_text_renders_tool_payloads() {
        let call = Message::ToolCall {
            id: "c1".into(),
            name: "exec".into(),
            input: serde_json::json!({"cmd": "ls"}),
        };
        assert!(call.flat_text().contains("exec"));
        assert!(call.flat_text().contains("ls"));
    }
}
