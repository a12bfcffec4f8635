use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A connected client's execution context: workspace, device, and (once
/// created) sandbox. Destroyed only by explicit administrative action —
/// a websocket disconnect does not delete it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub workspace_dir: String,
    pub device_id: String,
    /// Derived from the first non-empty `query.text`, truncated to 100 chars.
    /// `None` until that first message arrives.
    pub name: Option<String>,
    pub sandbox_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(workspace_dir: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            workspace_dir: workspace_dir.into(),
            device_id: device_id.into(),
            name: None,
            sandbox_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn resume(id: Uuid, workspace_dir: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            id,
            workspace_dir: workspace_dir.into(),
            device_id: device_id.into(),
            name: None,
            sandbox_id: None,
            created_at: Utc::now(),
        }
    }

    /// Apply the first-message naming rule. No-op once a name is set.
    pub fn set_name_from_first_message(&mut self, text: &str) {
        if self.name.is_some() {
            return;
        }
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return;
        }
        let truncated: String = trimmed.chars().take(100).collect();
        self.name = Some(truncated);
    }
}

/// Gateway-owned summary row for listing/lifecycle purposes — distinct from
/// the in-memory `MessageHistory` snapshot. `session_key` is a stable
/// external identity (e.g. device id); `session_id` is the UUID minted or
/// rotated on reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEntry {
    pub session_key: String,
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub context_tokens: u64,
    pub sandbox_id: Option<String>,
}

impl SessionEntry {
    pub fn new(session_key: impl Into<String>, session_id: Uuid, model: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_key: session_key.into(),
            session_id,
            created_at: now,
            updated_at: now,
            model: model.into(),
            input_tokens: 0,
            output_tokens: 0,
            total_tokens: 0,
            context_tokens: 0,
            sandbox_id: None,
        }
    }

    pub fn record_usage(&mut self, input_tokens: u64, output_tokens: u64) {
        self.input_tokens += input_tokens;
        self.output_tokens += output_tokens;
        self.total_tokens += input_tokens + output_tokens;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_message_sets_name_once() {
        let mut session = Session::new("/ws", "device-1");
        session.set_name_from_first_message("build me a parser");
        session.set_name_from_first_message("this should not overwrite");
        assert_eq!(session.name.as_deref(), Some("build me a parser"));
    }

    #[test]
    fn name_is_truncated_to_100_chars() {
        let mut session = Session::new("/ws", "device-1");
        let long = "x".repeat(150);
        session.set_name_from_first_message(&long);
        assert_eq!(session.name.unwrap().chars().count(), 100);
    }

    #[test]
    fn empty_first_message_does_not_set_name() {
        let mut session = Session::new("/ws", "device-1");
        session.set_name_from_first_message("   ");
        assert!(session.name.is_none());
    }

    #[test]
    fn record_usage_accumulates_totals() {
        let mut entry = SessionEntry::new("device-1", Uuid::new_v4(), "claude-main");
        entry.record_usage(100, 50);
        entry.record_usage(10, 5);
        assert_eq!(entry.input_tokens, 110);
        assert_eq!(entry.output_tokens, 55);
        assert_eq!(entry.total_tokens, 165);
    }
}
