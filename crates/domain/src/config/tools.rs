use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tools (terminal / file-edit)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub exec: ExecConfig,
    #[serde(default)]
    pub exec_security: ExecSecurityConfig,
    #[serde(default)]
    pub file_edit: FileEditConfig,
}

/// Terminal Session Manager (C2) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecConfig {
    /// Default foreground timeout for a shell command, caller-overridable.
    #[serde(default = "d_timeout_sec")]
    pub timeout_sec: u64,
    /// TTL for a finished terminal session before its buffer is dropped.
    #[serde(default = "d_cleanup_ms")]
    pub cleanup_ms: u64,
    /// Max output chars retained per terminal session's ring buffer.
    #[serde(default = "d_max_output_chars")]
    pub max_output_chars: usize,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            timeout_sec: d_timeout_sec(),
            cleanup_ms: d_cleanup_ms(),
            max_output_chars: d_max_output_chars(),
        }
    }
}

/// Security configuration for the terminal tool — audit logging and command denylist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecSecurityConfig {
    #[serde(default = "d_true")]
    pub audit_log: bool,
    /// Regex patterns that are denied outright.
    #[serde(default = "d_denied_patterns")]
    pub denied_patterns: Vec<String>,
}

impl Default for ExecSecurityConfig {
    fn default() -> Self {
        Self {
            audit_log: true,
            denied_patterns: d_denied_patterns(),
        }
    }
}

/// File-Edit Manager (C3) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEditConfig {
    /// Tool output longer than this is truncated with a "response clipped" notice.
    #[serde(default = "d_max_response_chars")]
    pub max_response_chars: usize,
    /// Line radius rendered around a successful edit in the snippet preview.
    #[serde(default = "d_snippet_lines")]
    pub snippet_lines: usize,
    /// Directory names never traversed when containment-checking a path.
    #[serde(default = "d_excluded_dirs")]
    pub excluded_dirs: Vec<String>,
}

impl Default for FileEditConfig {
    fn default() -> Self {
        Self {
            max_response_chars: d_max_response_chars(),
            snippet_lines: d_snippet_lines(),
            excluded_dirs: d_excluded_dirs(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_timeout_sec() -> u64 {
    30
}
fn d_cleanup_ms() -> u64 {
    1_800_000
}
fn d_max_output_chars() -> usize {
    1_000_000
}
fn d_true() -> bool {
    true
}
fn d_denied_patterns() -> Vec<String> {
    vec![
        r"rm\s+-rf\s+/".into(),
        r"mkfs\.".into(),
        r"dd\s+if=.+of=/dev/".into(),
    ]
}
fn d_max_response_chars() -> usize {
    200_000
}
fn d_snippet_lines() -> usize {
    4
}
fn d_excluded_dirs() -> Vec<String> {
    vec![".git".into(), "node_modules".into(), "__pycache__".into()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_constants() {
        let cfg = FileEditConfig::default();
        assert_eq!(cfg.max_response_chars, 200_000);
        assert_eq!(cfg.snippet_lines, 4);
    }

    #[test]
    fn default_exec_timeout_is_thirty_seconds() {
        assert_eq!(ExecConfig::default().timeout_sec, 30);
    }
}
