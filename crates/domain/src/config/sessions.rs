use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sessions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Session persistence and idle-lifecycle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Directory transcripts and history snapshots are written under,
    /// one subdirectory per session id.
    #[serde(default = "d_transcript_dir")]
    pub transcript_dir: PathBuf,
    /// A session with no inbound message for this many minutes is moved to
    /// `Draining` and its sandbox becomes eligible for cleanup. `None` disables
    /// idle eviction.
    #[serde(default)]
    pub idle_timeout_minutes: Option<u32>,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            transcript_dir: d_transcript_dir(),
            idle_timeout_minutes: Some(60),
        }
    }
}

fn d_transcript_dir() -> PathBuf {
    PathBuf::from("./data/transcripts")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_idle_timeout_is_one_hour() {
        assert_eq!(SessionsConfig::default().idle_timeout_minutes, Some(60));
    }
}
