use crate::message::{Message, Role, Turn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Canonical ordered log of a session's conversation. Single-writer: the
/// Agent Loop appends, the Context Manager truncates in place.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageHistory {
    turns: Vec<Turn>,
}

/// An invariant the history must never violate. Construction/mutation
/// methods return this instead of panicking so a caller can surface
/// `invariant_violation` (§7) rather than crash the process.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum HistoryInvariantError {
    #[error("turn {0} is empty")]
    EmptyTurn(usize),
    #[error("tool call {0} has no matching tool result and is not the trailing pending call")]
    OrphanToolCall(String),
    #[error("tool result {0} has no matching tool call")]
    OrphanToolResult(String),
    #[error("more than one pending tool call in the trailing turn")]
    MultiplePendingToolCalls,
    #[error("turn {0} has a thinking block after its text result or tool call")]
    ThinkingAfterResult(usize),
    #[error("turn {index} breaks role alternation: expected {expected:?}, got {actual:?}")]
    AlternationBroken {
        index: usize,
        expected: Role,
        actual: Role,
    },
}

impl MessageHistory {
    pub fn new() -> Self {
        Self { turns: Vec::new() }
    }

    pub fn from_turns(turns: Vec<Turn>) -> Self {
        Self { turns }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Append a turn, rejecting it (leaving the history untouched) if doing
    /// so would immediately violate an invariant.
    pub fn push(&mut self, turn: Turn) -> Result<(), HistoryInvariantError> {
        if turn.messages.is_empty() {
            return Err(HistoryInvariantError::EmptyTurn(self.turns.len()));
        }
        if !turn.thinking_precedes_results() {
            return Err(HistoryInvariantError::ThinkingAfterResult(self.turns.len()));
        }
        self.turns.push(turn);
        Ok(())
    }

    /// The trailing `ToolCall` awaiting a `ToolResult`, if any. Per the
    /// agent-loop invariant, at most one can exist at a time.
    pub fn pending_tool_call(&self) -> Option<&Message> {
        let last = self.turns.last()?;
        last.pending_tool_calls().into_iter().next()
    }

    pub fn has_pending_tool_call(&self) -> bool {
        self.pending_tool_call().is_some()
    }

    /// Index of the last turn containing a `TextPrompt`, used by Context
    /// Manager Strategy A to find a safe cut boundary.
    pub fn last_text_prompt_index(&self) -> Option<usize> {
        self.turns
            .iter()
            .enumerate()
            .rev()
            .find(|(_, t)| t.messages.iter().any(Message::is_text_prompt))
            .map(|(i, _)| i)
    }

    /// `true` if any turn carries a thinking block — selects Strategy A vs B.
    pub fn contains_thinking_blocks(&self) -> bool {
        self.turns.iter().any(|t| t.messages.iter().any(Message::is_thinking))
    }

    /// Replace the turn range `[start, end)` with a single synthetic turn,
    /// used by both truncation strategies and `/compact`.
    pub fn replace_range(&mut self, start: usize, end: usize, replacement: Turn) {
        let end = end.min(self.turns.len());
        if start >= end {
            self.turns.insert(start.min(self.turns.len()), replacement);
            return;
        }
        self.turns.splice(start..end, std::iter::once(replacement));
    }

    /// Truncate the history back through (and including) the last user
    /// turn, for `edit_query`'s atomic rewrite semantics.
    pub fn truncate_to_last_user_turn(&mut self) {
        if let Some(idx) = self.turns.iter().rposition(|t| t.role == Role::User) {
            self.turns.truncate(idx);
        } else {
            self.turns.clear();
        }
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Validate every invariant in §3 over the full history. Used in tests
    /// and defensively after a truncation pass.
    pub fn validate(&self) -> Result<(), HistoryInvariantError> {
        // id -> index of the turn that opened it, so an unresolved call can
        // be blamed on the right turn once we know it isn't the trailing one.
        let mut open_calls: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
        let last_idx = self.turns.len().saturating_sub(1);

        for (i, turn) in self.turns.iter().enumerate() {
            if turn.messages.is_empty() {
                return Err(HistoryInvariantError::EmptyTurn(i));
            }
            if !turn.thinking_precedes_results() {
                return Err(HistoryInvariantError::ThinkingAfterResult(i));
            }
            for msg in &turn.messages {
                match msg {
                    Message::ToolCall { id, .. } => {
                        open_calls.insert(id.as_str(), i);
                    }
                    Message::ToolResult { id, .. } => {
                        if open_calls.remove(id.as_str()).is_none() {
                            return Err(HistoryInvariantError::OrphanToolResult(id.clone()));
                        }
                    }
                    _ => {}
                }
            }
        }

        // Every surviving open call must have been opened in the trailing
        // turn; anything older is an orphan that was never resolved.
        for (id, opened_at) in &open_calls {
            if *opened_at != last_idx {
                return Err(HistoryInvariantError::OrphanToolCall((*id).to_string()));
            }
        }

        if open_calls.len() > 1 {
            return Err(HistoryInvariantError::MultiplePendingToolCalls);
        }

        if let Some(first) = self.turns.first() {
            if first.role != Role::User {
                return Err(HistoryInvariantError::AlternationBroken {
                    index: 0,
                    expected: Role::User,
                    actual: first.role,
                });
            }
        }
        let mut expected = Role::User;
        for (i, turn) in self.turns.iter().enumerate() {
            if turn.role != expected {
                return Err(HistoryInvariantError::AlternationBroken {
                    index: i,
                    expected,
                    actual: turn.role,
                });
            }
            expected = match expected {
                Role::User => Role::Assistant,
                Role::Assistant => Role::User,
            };
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    fn call(id: &str) -> Message {
        Message::ToolCall {
            id: id.into(),
            name: "exec".into(),
            input: serde_json::json!({}),
        }
    }

    fn result(id: &str) -> Message {
        Message::ToolResult {
            id: id.into(),
            name: "exec".into(),
            output: "ok".into(),
        }
    }

    #[test]
    fn empty_history_is_valid() {
        assert!(MessageHistory::new().validate().is_ok());
    }

    #[test]
    fn paired_tool_call_and_result_is_valid() {
        let history = MessageHistory::from_turns(vec![
            Turn::user_text("do it"),
            Turn::new(Role::Assistant, vec![call("c1")]),
            Turn::new(Role::User, vec![result("c1")]),
            Turn::assistant_text("done"),
        ]);
        assert!(history.validate().is_ok());
    }

    #[test]
    fn trailing_pending_tool_call_is_valid() {
        let history = MessageHistory::from_turns(vec![
            Turn::user_text("do it"),
            Turn::new(Role::Assistant, vec![call("c1")]),
        ]);
        assert!(history.validate().is_ok());
        assert!(history.has_pending_tool_call());
    }

    #[test]
    fn non_trailing_orphan_tool_call_is_invalid() {
        let history = MessageHistory::from_turns(vec![
            Turn::user_text("do it"),
            Turn::new(Role::Assistant, vec![call("c1")]),
            Turn::user_text("another message instead of a result"),
        ]);
        assert!(matches!(
            history.validate(),
            Err(HistoryInvariantError::OrphanToolCall(_))
        ));
    }

    #[test]
    fn orphan_tool_result_is_invalid() {
        let history = MessageHistory::from_turns(vec![
            Turn::user_text("do it"),
            Turn::new(Role::User, vec![result("nonexistent")]),
        ]);
        assert!(matches!(
            history.validate(),
            Err(HistoryInvariantError::AlternationBroken { .. })
                | Err(HistoryInvariantError::OrphanToolResult(_))
        ));
    }

    #[test]
    fn alternation_must_start_with_user() {
        let history = MessageHistory::from_turns(vec![Turn::assistant_text("hi")]);
        assert!(matches!(
            history.validate(),
            Err(HistoryInvariantError::AlternationBroken { index: 0, .. })
        ));
    }

    #[test]
    fn push_rejects_empty_turn() {
        let mut history = MessageHistory::new();
        let err = history.push(Turn::new(Role::User, vec![])).unwrap_err();
        assert_eq!(err, HistoryInvariantError::EmptyTurn(0));
    }

    #[test]
    fn truncate_to_last_user_turn_drops_tail() {
        let mut history = MessageHistory::from_turns(vec![
            Turn::user_text("first"),
            Turn::assistant_text("reply"),
            Turn::user_text("second"),
            Turn::assistant_text("reply2"),
        ]);
        history.truncate_to_last_user_turn();
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn replace_range_collapses_into_one_turn() {
        let mut history = MessageHistory::from_turns(vec![
            Turn::user_text("first"),
            Turn::assistant_text("a"),
            Turn::user_text("second"),
            Turn::assistant_text("b"),
        ]);
        history.replace_range(1, 3, Turn::assistant_text("Conversation Summary: ..."));
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn last_text_prompt_index_finds_most_recent() {
        let history = MessageHistory::from_turns(vec![
            Turn::user_text("first"),
            Turn::assistant_text("a"),
            Turn::user_text("second"),
        ]);
        assert_eq!(history.last_text_prompt_index(), Some(2));
    }
}
