//! MessageHistory snapshot/restore (§6): serialized on disconnect and on
//! normal turn completion, restored on reconnect with an existing session
//! UUID. Backed by a pluggable store — local directory or in-memory —
//! selected once at startup from [`FileStoreConfig`], the same sum-type
//! shape the Tool-Op Client uses to choose local vs. remote at runtime.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use ac_domain::config::{FileStoreConfig, FileStoreKind};
use ac_domain::error::{Error, Result};
use ac_domain::history::MessageHistory;
use parking_lot::RwLock;
use uuid::Uuid;

/// Where MessageHistory snapshots live.
pub enum HistoryStore {
    Local { root: PathBuf },
    Memory { blobs: RwLock<HashMap<Uuid, String>> },
}

impl HistoryStore {
    pub fn from_config(cfg: &FileStoreConfig) -> Result<Self> {
        match cfg.kind {
            FileStoreKind::Local => {
                std::fs::create_dir_all(&cfg.root).map_err(Error::Io)?;
                Ok(Self::Local {
                    root: cfg.root.clone(),
                })
            }
            FileStoreKind::Memory => Ok(Self::Memory {
                blobs: RwLock::new(HashMap::new()),
            }),
        }
    }

    fn path_for(root: &std::path::Path, session_id: Uuid) -> PathBuf {
        root.join(format!("{session_id}.history.json"))
    }

    /// Serialize `history` and persist it under `session_id`.
    pub fn save(&self, session_id: Uuid, history: &MessageHistory) -> Result<()> {
        let json = serde_json::to_string(history.turns()).map_err(Error::Json)?;
        match self {
            Self::Local { root } => {
                let path = Self::path_for(root, session_id);
                std::fs::write(&path, json).map_err(Error::Io)
            }
            Self::Memory { blobs } => {
                blobs.write().insert(session_id, json);
                Ok(())
            }
        }
    }

    /// Restore a previously saved history, if any.
    pub fn load(&self, session_id: Uuid) -> Result<Option<MessageHistory>> {
        let raw = match self {
            Self::Local { root } => {
                let path = Self::path_for(root, session_id);
                if !path.exists() {
                    return Ok(None);
                }
                Some(std::fs::read_to_string(&path).map_err(Error::Io)?)
            }
            Self::Memory { blobs } => blobs.read().get(&session_id).cloned(),
        };

        let Some(raw) = raw else { return Ok(None) };
        let turns = serde_json::from_str(&raw).map_err(Error::Json)?;
        Ok(Some(MessageHistory::from_turns(turns)))
    }
}

pub type SharedHistoryStore = Arc<HistoryStore>;

#[cfg(test)]
mod tests {
    use super::*;
    use ac_domain::message::Turn;

    fn cfg_memory() -> FileStoreConfig {
        FileStoreConfig {
            kind: FileStoreKind::Memory,
            root: PathBuf::from("unused"),
        }
    }

    #[test]
    fn save_then_load_roundtrips_in_memory() {
        let store = HistoryStore::from_config(&cfg_memory()).unwrap();
        let sid = Uuid::new_v4();
        let history = MessageHistory::from_turns(vec![Turn::user_text("hi")]);
        store.save(sid, &history).unwrap();

        let loaded = store.load(sid).unwrap().expect("snapshot present");
        assert_eq!(loaded.turns(), history.turns());
    }

    #[test]
    fn load_missing_session_returns_none() {
        let store = HistoryStore::from_config(&cfg_memory()).unwrap();
        assert!(store.load(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn save_then_load_roundtrips_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = FileStoreConfig {
            kind: FileStoreKind::Local,
            root: dir.path().to_path_buf(),
        };
        let store = HistoryStore::from_config(&cfg).unwrap();
        let sid = Uuid::new_v4();
        let history = MessageHistory::from_turns(vec![Turn::user_text("hello")]);
        store.save(sid, &history).unwrap();

        let loaded = store.load(sid).unwrap().expect("snapshot present");
        assert_eq!(loaded.turns(), history.turns());
    }
}
