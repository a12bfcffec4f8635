//! Persisted `session` table (§3/§6): one row per connected client, keyed by
//! UUID, plus the gateway-owned `SessionEntry` summary keyed by a stable
//! external `session_key`. Backed by a single JSON file — a `sessions.json`
//! row map, flushed periodically and on clean shutdown, mirroring the
//! teacher's session-store-as-a-JSON-map approach.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ac_domain::error::{Error, Result};
use ac_domain::session::{Session, SessionEntry};
use parking_lot::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, Default)]
struct SessionFile {
    #[serde(default)]
    sessions: HashMap<Uuid, Session>,
    #[serde(default)]
    entries: HashMap<String, SessionEntry>,
}

/// In-memory session table backed by a JSON file at `<root>/sessions.json`.
pub struct SessionStore {
    path: PathBuf,
    sessions: RwLock<HashMap<Uuid, Session>>,
    entries: RwLock<HashMap<String, SessionEntry>>,
}

impl SessionStore {
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        std::fs::create_dir_all(root).map_err(Error::Io)?;
        let path = root.join("sessions.json");

        let file = if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(Error::Io)?;
            serde_json::from_str(&raw).unwrap_or_default()
        } else {
            SessionFile::default()
        };

        Ok(Self {
            path,
            sessions: RwLock::new(file.sessions),
            entries: RwLock::new(file.entries),
        })
    }

    /// Create a fresh session row (new UUID), or resume one with a
    /// client-supplied UUID if it doesn't already exist.
    pub fn create(&self, workspace_dir: impl Into<String>, device_id: impl Into<String>) -> Session {
        let session = Session::new(workspace_dir, device_id);
        self.sessions.write().insert(session.id, session.clone());
        session
    }

    pub fn resume_or_create(
        &self,
        id: Uuid,
        workspace_dir: impl Into<String>,
        device_id: impl Into<String>,
    ) -> Session {
        if let Some(existing) = self.sessions.read().get(&id).cloned() {
            return existing;
        }
        let session = Session::resume(id, workspace_dir, device_id);
        self.sessions.write().insert(id, session.clone());
        session
    }

    pub fn get(&self, id: &Uuid) -> Option<Session> {
        self.sessions.read().get(id).cloned()
    }

    pub fn update(&self, session: Session) {
        self.sessions.write().insert(session.id, session);
    }

    pub fn list(&self) -> Vec<Session> {
        self.sessions.read().values().cloned().collect()
    }

    /// Look up or mint a [`SessionEntry`] for a stable external `session_key`.
    /// Returns the entry and whether it was newly created.
    pub fn resolve_or_create_entry(&self, session_key: &str, model: &str) -> (SessionEntry, bool) {
        if let Some(existing) = self.entries.read().get(session_key).cloned() {
            return (existing, false);
        }
        let entry = SessionEntry::new(session_key, Uuid::new_v4(), model);
        self.entries
            .write()
            .insert(session_key.to_string(), entry.clone());
        (entry, true)
    }

    /// Rotate a session entry's `session_id`, discarding accumulated usage.
    pub fn reset_entry(&self, session_key: &str, model: &str) -> SessionEntry {
        let entry = SessionEntry::new(session_key, Uuid::new_v4(), model);
        self.entries
            .write()
            .insert(session_key.to_string(), entry.clone());
        entry
    }

    pub fn record_usage(&self, session_key: &str, input_tokens: u64, output_tokens: u64) {
        if let Some(entry) = self.entries.write().get_mut(session_key) {
            entry.record_usage(input_tokens, output_tokens);
        }
    }

    pub fn get_entry(&self, session_key: &str) -> Option<SessionEntry> {
        self.entries.read().get(session_key).cloned()
    }

    pub fn list_entries(&self) -> Vec<SessionEntry> {
        self.entries.read().values().cloned().collect()
    }

    /// Serialize the current table to disk. Cheap enough to call from a
    /// periodic background task; also called on graceful shutdown.
    pub async fn flush(&self) -> Result<()> {
        let file = SessionFile {
            sessions: self.sessions.read().clone(),
            entries: self.entries.read().clone(),
        };
        let json = serde_json::to_string_pretty(&file).map_err(Error::Json)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || std::fs::write(&path, json))
            .await
            .map_err(|e| Error::Other(e.to_string()))?
            .map_err(Error::Io)
    }
}

pub type SharedSessionStore = Arc<SessionStore>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_or_create_entry_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();
        let (a, is_new_a) = store.resolve_or_create_entry("device-1", "claude-main");
        assert!(is_new_a);
        let (b, is_new_b) = store.resolve_or_create_entry("device-1", "claude-main");
        assert!(!is_new_b);
        assert_eq!(a.session_id, b.session_id);
    }

    #[test]
    fn reset_entry_rotates_session_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();
        let (before, _) = store.resolve_or_create_entry("device-1", "claude-main");
        let after = store.reset_entry("device-1", "claude-main");
        assert_ne!(before.session_id, after.session_id);
    }

    #[tokio::test]
    async fn flush_then_reload_preserves_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_path_buf();
        {
            let store = SessionStore::new(&path).unwrap();
            store.resolve_or_create_entry("device-1", "claude-main");
            store.flush().await.unwrap();
        }
        let reloaded = SessionStore::new(&path).unwrap();
        assert!(reloaded.get_entry("device-1").is_some());
    }
}
