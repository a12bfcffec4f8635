//! Persisted `event` table (§3/§6): one append-only `<session_id>.jsonl` log
//! per session, indexed implicitly by file-order (== `(session_id,
//! timestamp)` order). Grounded on the append-only JSONL transcript pattern
//! used elsewhere in this codebase for session-scoped logs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ac_domain::error::{Error, Result};
use ac_domain::event::Event;
use parking_lot::Mutex;
use uuid::Uuid;

/// Append-only, per-session JSONL event log.
pub struct EventStore {
    dir: PathBuf,
    /// One lock per session keeps concurrent appends to different sessions
    /// from blocking each other while still serializing writes to the same
    /// file (a session's Agent Loop is its log's single writer anyway).
    locks: Mutex<std::collections::HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl EventStore {
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let dir = root.as_ref().join("events");
        std::fs::create_dir_all(&dir).map_err(Error::Io)?;
        Ok(Self {
            dir,
            locks: Mutex::new(std::collections::HashMap::new()),
        })
    }

    fn path_for(&self, session_id: Uuid) -> PathBuf {
        self.dir.join(format!("{session_id}.jsonl"))
    }

    fn lock_for(&self, session_id: Uuid) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .entry(session_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Append one event to its session's log.
    pub async fn append(&self, event: &Event) -> Result<()> {
        let path = self.path_for(event.session_id);
        let guard = self.lock_for(event.session_id);
        let line = serde_json::to_string(event).map_err(Error::Json)?;

        tokio::task::spawn_blocking(move || {
            let _held = guard.lock();
            use std::io::Write;
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(Error::Io)?;
            writeln!(file, "{line}").map_err(Error::Io)
        })
        .await
        .map_err(|e| Error::Other(e.to_string()))?
    }

    /// Read the full event log for a session, in production order.
    pub fn read_all(&self, session_id: Uuid) -> Vec<Event> {
        let path = self.path_for(session_id);
        let Ok(raw) = std::fs::read_to_string(&path) else {
            return Vec::new();
        };
        raw.lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    /// Delete the event tail at and after `cutoff_id` (inclusive), used by
    /// `edit_query` to drop the most recent turn's events from storage
    /// before a fresh query begins. Rewrites the file with the surviving
    /// prefix.
    pub async fn delete_tail_from(&self, session_id: Uuid, cutoff_id: Uuid) -> Result<()> {
        let mut events = self.read_all(session_id);
        if let Some(pos) = events.iter().position(|e| e.id == cutoff_id) {
            events.truncate(pos);
        }
        let path = self.path_for(session_id);
        let guard = self.lock_for(session_id);

        tokio::task::spawn_blocking(move || {
            let _held = guard.lock();
            let mut out = String::new();
            for event in &events {
                if let Ok(line) = serde_json::to_string(event) {
                    out.push_str(&line);
                    out.push('\n');
                }
            }
            std::fs::write(&path, out).map_err(Error::Io)
        })
        .await
        .map_err(|e| Error::Other(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ac_domain::event::EventKind;

    #[tokio::test]
    async fn append_then_read_all_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::new(dir.path()).unwrap();
        let sid = Uuid::new_v4();
        let e1 = Event::new(sid, EventKind::Processing);
        let e2 = Event::new(sid, EventKind::Pong);
        store.append(&e1).await.unwrap();
        store.append(&e2).await.unwrap();

        let all = store.read_all(sid);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, e1.id);
        assert_eq!(all[1].id, e2.id);
    }

    #[tokio::test]
    async fn delete_tail_from_truncates_at_cutoff() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::new(dir.path()).unwrap();
        let sid = Uuid::new_v4();
        let e1 = Event::new(sid, EventKind::UserMessage { text: "a".into() });
        let e2 = Event::new(sid, EventKind::AssistantText { text: "b".into() });
        let e3 = Event::new(sid, EventKind::UserMessage { text: "c".into() });
        store.append(&e1).await.unwrap();
        store.append(&e2).await.unwrap();
        store.append(&e3).await.unwrap();

        store.delete_tail_from(sid, e2.id).await.unwrap();

        let remaining = store.read_all(sid);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, e1.id);
    }
}
