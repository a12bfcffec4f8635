use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Workspace & file store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Host-side root under which per-session workspace directories are created.
    #[serde(default = "d_ws_path")]
    pub path: PathBuf,
    /// Where session rows, transcripts, and other durable state live.
    #[serde(default = "d_state_path")]
    pub state_path: PathBuf,
    /// Backing store for session/file persistence.
    #[serde(default)]
    pub file_store: FileStoreConfig,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            path: d_ws_path(),
            state_path: d_state_path(),
            file_store: FileStoreConfig::default(),
        }
    }
}

/// Where durable rows (sessions, history snapshots) are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileStoreConfig {
    #[serde(default)]
    pub kind: FileStoreKind,
    #[serde(default = "d_store_root")]
    pub root: PathBuf,
}

impl Default for FileStoreConfig {
    fn default() -> Self {
        Self {
            kind: FileStoreKind::default(),
            root: d_store_root(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStoreKind {
    /// One JSON file per session row under `root`, atomic tmp-then-rename writes.
    #[default]
    Local,
    /// In-memory only; rows are lost on restart. Used in tests.
    Memory,
}

// ── serde default helpers ───────────────────────────────────────────

fn d_ws_path() -> PathBuf {
    PathBuf::from("./workspace")
}
fn d_state_path() -> PathBuf {
    PathBuf::from("./data/state")
}
fn d_store_root() -> PathBuf {
    PathBuf::from("./data/sessions")
}
