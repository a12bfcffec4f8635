//! Terminal Session Manager (C2) — long-lived interactive shell sessions
//! addressed by a string id. Each session owns a child shell process whose
//! prompt is set to a sentinel pair (`[CMD_BEGIN]` / `[CMD_END]`) so command
//! output and the resulting working directory can be parsed deterministically
//! from plain stdio, without a real pseudo-terminal.
//!
//! A `tmux`-backed implementation could be registered alongside this one
//! behind the same `TerminalBackend` trait; only the sentinel-driven backend
//! is provided here.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::{mpsc, Notify};
use tokio::time::{Duration, Instant};

use crate::exec::is_dangerous_env_var;

const START_SENTINEL: &str = "[CMD_BEGIN]";
const END_SENTINEL: &str = "[CMD_END]";
const WORKING_DIR_PLACEHOLDER: &str = ".WORKING_DIR";
const TAIL_CHARS: usize = 5_000;
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Ready,
    Running,
    Completed,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResult {
    pub success: bool,
    pub output: String,
}

fn ansi_escape_re() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\x1B\[[0-?]*[ -/]*[@-~]").expect("static ansi pattern"))
}

fn strip_ansi(text: &str) -> String {
    let cleaned = ansi_escape_re().replace_all(text, "");
    cleaned.strip_prefix('\r').map(str::to_string).unwrap_or_else(|| cleaned.into_owned())
}

struct Inner {
    state: SessionState,
    current_directory: String,
    last_command: Option<String>,
    history: Vec<String>,
    raw: String,
    consumed_pos: usize,
}

pub struct TerminalSession {
    pub id: String,
    inner: RwLock<Inner>,
    notify: Arc<Notify>,
    stdin_tx: Option<mpsc::Sender<Vec<u8>>>,
    kill_tx: Option<mpsc::Sender<()>>,
}

/// Manages named terminal sessions. `use_relative_path`, when set, rewrites
/// occurrences of the real workspace root in output to a fixed placeholder
/// so host paths never leak to a caller.
pub struct TerminalManager {
    sessions: RwLock<HashMap<String, Arc<TerminalSession>>>,
    shell: String,
    default_timeout_sec: u64,
    use_relative_path: bool,
    workspace_root: Option<PathBuf>,
}

impl TerminalManager {
    pub fn new(shell: impl Into<String>, default_timeout_sec: u64, use_relative_path: bool, workspace_root: Option<PathBuf>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            shell: shell.into(),
            default_timeout_sec,
            use_relative_path,
            workspace_root,
        }
    }

    fn rewrite_path(&self, text: &str) -> String {
        if !self.use_relative_path {
            return text.to_string();
        }
        match &self.workspace_root {
            Some(root) => text.replace(&root.display().to_string(), WORKING_DIR_PLACEHOLDER),
            None => text.to_string(),
        }
    }

    pub async fn create_session(&self, id: &str) -> SessionResult {
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-i").arg("--noprofile").arg("--norc");
        cmd.stdin(std::process::Stdio::piped());
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());
        for (key, _) in std::env::vars() {
            if is_dangerous_env_var(&key) {
                cmd.env_remove(&key);
            }
        }

        let mut child = match cmd.spawn() {
            Ok(c) => c,
            Err(e) => return SessionResult { success: false, output: format!("failed to spawn shell: {e}") },
        };

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let stdin = child.stdin.take();

        let inner = RwLock::new(Inner {
            state: SessionState::Idle,
            current_directory: String::new(),
            last_command: None,
            history: Vec::new(),
            raw: String::new(),
            consumed_pos: 0,
        });
        let notify = Arc::new(Notify::new());
        let (stdin_tx, mut stdin_rx) = mpsc::channel::<Vec<u8>>(32);
        let (kill_tx, mut kill_rx) = mpsc::channel::<()>(1);

        let session = Arc::new(TerminalSession {
            id: id.to_string(),
            inner,
            notify: notify.clone(),
            stdin_tx: Some(stdin_tx.clone()),
            kill_tx: Some(kill_tx),
        });

        spawn_readers(stdout, stderr, session.clone());

        tokio::spawn(async move {
            if let Some(mut stdin) = stdin {
                loop {
                    tokio::select! {
                        msg = stdin_rx.recv() => {
                            match msg {
                                Some(bytes) => {
                                    if stdin.write_all(&bytes).await.is_err() { break; }
                                    if stdin.flush().await.is_err() { break; }
                                }
                                None => break,
                            }
                        }
                        _ = kill_rx.recv() => {
                            let _ = child.kill().await;
                            break;
                        }
                    }
                }
            }
        });

        self.sessions.write().insert(id.to_string(), session.clone());

        // Set PS1/PS2 to the sentinel pair, then wait for the first prompt.
        let prompt_setup = format!("export PS1=\"{START_SENTINEL}\\n\\u@\\h:\\w\\n{END_SENTINEL}\\n\"; export PS2=\"\"\n");
        if stdin_tx.send(prompt_setup.into_bytes()).await.is_err() {
            return SessionResult { success: false, output: "failed to write to shell stdin".into() };
        }

        match expect_end(&session, Duration::from_secs(self.default_timeout_sec)).await {
            Ok(before) => {
                let current_directory = extract_current_directory(&before);
                let mut guard = session.inner.write();
                guard.current_directory = self.rewrite_path(&current_directory);
                guard.state = SessionState::Ready;
                drop(guard);
                SessionResult { success: true, output: format!("session {id} ready") }
            }
            Err(_) => {
                session.inner.write().state = SessionState::Error;
                SessionResult { success: false, output: format!("session {id} failed to initialize (no prompt detected)") }
            }
        }
    }

    async fn ensure_session(&self, id: &str) -> Arc<TerminalSession> {
        if let Some(s) = self.sessions.read().get(id).cloned() {
            return s;
        }
        self.create_session(id).await;
        self.sessions.read().get(id).cloned().unwrap_or_else(|| {
            Arc::new(TerminalSession {
                id: id.to_string(),
                inner: RwLock::new(Inner {
                    state: SessionState::Error,
                    current_directory: String::new(),
                    last_command: None,
                    history: Vec::new(),
                    raw: String::new(),
                    consumed_pos: 0,
                }),
                notify: Arc::new(Notify::new()),
                stdin_tx: None,
                kill_tx: None,
            })
        })
    }

    /// Try to finish a still-running previous command with a short 1-second
    /// re-expect, matching the reference's "grace period" before refusing a
    /// new `shell_exec` outright.
    async fn try_complete_running(&self, session: &Arc<TerminalSession>) -> Result<(), String> {
        let is_running = session.inner.read().state == SessionState::Running;
        if !is_running {
            return Ok(());
        }
        match expect_end(session, Duration::from_secs(1)).await {
            Ok(before) => {
                self.record_completion(session, &before);
                Ok(())
            }
            Err(partial) => Err(partial),
        }
    }

    fn record_completion(&self, session: &Arc<TerminalSession>, before: &str) {
        let mut guard = session.inner.write();
        let cleaned = strip_ansi(before);
        let command = guard.last_command.clone().unwrap_or_default();
        let (command_output, new_directory) = split_on_start_sentinel(&cleaned, &command);
        if let Some(dir) = new_directory {
            guard.current_directory = self.rewrite_path(&dir);
        }
        let formatted = format_completed(&guard.current_directory, &command, &command_output);
        guard.history.push(formatted);
        guard.state = SessionState::Completed;
    }

    pub async fn shell_exec(&self, id: &str, command: &str, exec_dir: Option<&str>, timeout_sec: u64) -> SessionResult {
        let command = match exec_dir {
            Some(dir) => format!("cd {dir} && {command}"),
            None => command.to_string(),
        };

        let session = self.ensure_session(id).await;
        if let Err(partial) = self.try_complete_running(&session).await {
            let prev = session.inner.read().last_command.clone().unwrap_or_default();
            return SessionResult {
                success: false,
                output: format!("previous command still running: {prev}\n{}", strip_ansi(&partial)),
            };
        }

        let Some(stdin_tx) = session.stdin_tx.clone() else {
            return SessionResult { success: false, output: format!("session {id} not ready") };
        };

        {
            let mut guard = session.inner.write();
            guard.last_command = Some(command.clone());
            guard.state = SessionState::Running;
        }
        if stdin_tx.send(format!("{command}\n").into_bytes()).await.is_err() {
            return SessionResult { success: false, output: format!("session {id} stdin closed") };
        }

        match expect_end(&session, Duration::from_secs(timeout_sec)).await {
            Ok(before) => {
                self.record_completion(&session, &before);
                let guard = session.inner.read();
                SessionResult {
                    success: true,
                    output: format!("{}\n{}$", guard.history.last().cloned().unwrap_or_default(), guard.current_directory),
                }
            }
            Err(partial) => {
                session.inner.write().state = SessionState::Running;
                let cleaned = strip_ansi(&partial);
                let guard = session.inner.read();
                let formatted = format_timeout(&guard.current_directory, &command, &cleaned, timeout_sec, false);
                SessionResult { success: false, output: formatted }
            }
        }
    }

    pub async fn shell_view(&self, id: &str) -> SessionResult {
        let Some(session) = self.sessions.read().get(id).cloned() else {
            return SessionResult { success: false, output: format!("session {id} not found") };
        };

        let state = session.inner.read().state;
        if matches!(state, SessionState::Completed | SessionState::Ready) {
            let guard = session.inner.read();
            return SessionResult {
                success: true,
                output: format!("{}\n{}$", guard.history.join("\n"), guard.current_directory),
            };
        }

        match expect_end(&session, Duration::from_secs(1)).await {
            Ok(before) => {
                self.record_completion(&session, &before);
                let guard = session.inner.read();
                SessionResult {
                    success: true,
                    output: format!("{}\n{}$", guard.history.join("\n"), guard.current_directory),
                }
            }
            Err(partial) => {
                let cleaned = strip_ansi(&partial);
                let guard = session.inner.read();
                let command = guard.last_command.clone().unwrap_or_default();
                let formatted = format_timeout(&guard.current_directory, &command, &cleaned, 1, true);
                let mut combined = guard.history.clone();
                combined.push(formatted);
                SessionResult { success: true, output: combined.join("\n") }
            }
        }
    }

    pub async fn shell_wait(&self, id: &str, seconds: u64) -> SessionResult {
        if self.sessions.read().get(id).is_none() {
            return SessionResult { success: false, output: format!("session {id} not found") };
        }
        tokio::time::sleep(Duration::from_secs(seconds)).await;
        SessionResult { success: true, output: format!("finished waiting for {seconds} seconds") }
    }

    pub async fn shell_write_to_process(&self, id: &str, text: &str, press_enter: bool) -> SessionResult {
        let Some(session) = self.sessions.read().get(id).cloned() else {
            return SessionResult { success: false, output: format!("session {id} not found") };
        };
        let Some(stdin_tx) = session.stdin_tx.clone() else {
            return SessionResult { success: false, output: format!("no active process in session {id}") };
        };

        let payload = if press_enter { format!("{text}\n") } else { text.to_string() };
        if stdin_tx.send(payload.into_bytes()).await.is_err() {
            return SessionResult { success: false, output: format!("session {id} stdin closed") };
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
        match expect_end(&session, Duration::from_secs(3)).await {
            Ok(before) => {
                self.record_completion(&session, &before);
                let guard = session.inner.read();
                SessionResult {
                    success: true,
                    output: format!("{}\n{}$", guard.history.last().cloned().unwrap_or_default(), guard.current_directory),
                }
            }
            Err(partial) => {
                let cleaned = strip_ansi(&partial);
                let guard = session.inner.read();
                let command = guard.last_command.clone().unwrap_or_default();
                SessionResult { success: false, output: format_timeout(&guard.current_directory, &command, &cleaned, 3, false) }
            }
        }
    }

    pub async fn shell_kill_process(&self, id: &str) -> SessionResult {
        let Some(session) = self.sessions.write().remove(id) else {
            return SessionResult { success: false, output: format!("session {id} not found") };
        };
        if let Some(kill_tx) = &session.kill_tx {
            let _ = kill_tx.send(()).await;
        }
        SessionResult { success: true, output: format!("killed process in session {id}") }
    }
}

fn spawn_readers(stdout: Option<tokio::process::ChildStdout>, stderr: Option<tokio::process::ChildStderr>, session: Arc<TerminalSession>) {
    if let Some(mut stdout) = stdout {
        let session = session.clone();
        tokio::spawn(async move {
            let mut buf = [0u8; 4096];
            loop {
                match stdout.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        let chunk = String::from_utf8_lossy(&buf[..n]);
                        session.inner.write().raw.push_str(&chunk);
                        session.notify.notify_waiters();
                    }
                }
            }
        });
    }
    if let Some(mut stderr) = stderr {
        tokio::spawn(async move {
            let mut buf = [0u8; 4096];
            loop {
                match stderr.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        let chunk = String::from_utf8_lossy(&buf[..n]);
                        session.inner.write().raw.push_str(&chunk);
                        session.notify.notify_waiters();
                    }
                }
            }
        });
    }
}

/// Wait for `[CMD_END]` to appear in unconsumed output, returning everything
/// since the last consumption point. On timeout, returns the partial output
/// accumulated so far as `Err` without consuming it (mirroring pexpect's
/// `TIMEOUT` exception, which leaves `child.before` available for the next
/// call).
async fn expect_end(session: &Arc<TerminalSession>, timeout_dur: Duration) -> Result<String, String> {
    let deadline = Instant::now() + timeout_dur;
    loop {
        {
            let mut guard = session.inner.write();
            if let Some(rel_idx) = guard.raw[guard.consumed_pos..].find(END_SENTINEL) {
                let idx = guard.consumed_pos + rel_idx;
                let before = guard.raw[guard.consumed_pos..idx].to_string();
                guard.consumed_pos = idx + END_SENTINEL.len();
                return Ok(before);
            }
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            let guard = session.inner.read();
            return Err(guard.raw[guard.consumed_pos..].to_string());
        }
        let _ = tokio::time::timeout(remaining.min(POLL_INTERVAL), session.notify.notified()).await;
    }
}

fn extract_current_directory(before: &str) -> String {
    match before.split(START_SENTINEL).nth(1) {
        Some(rest) => rest.replace(['\n', '\r'], "").trim().to_string(),
        None => before.trim().to_string(),
    }
}

/// Split raw `expect` output on `[CMD_BEGIN]`, returning `(command_output,
/// new_directory)`. Strips an echoed command line if present, matching the
/// reference's defensive handling of shells that still echo input.
fn split_on_start_sentinel(raw: &str, command: &str) -> (String, Option<String>) {
    if let Some(idx) = raw.find(START_SENTINEL) {
        let command_output = strip_echoed_command(raw[..idx].trim(), command);
        let new_directory = raw[idx + START_SENTINEL.len()..].replace(['\n', '\r'], "");
        (truncate_tail(&command_output), Some(new_directory.trim().to_string()))
    } else {
        (truncate_tail(&strip_echoed_command(raw.trim(), command)), None)
    }
}

fn strip_echoed_command(output: &str, command: &str) -> String {
    let mut lines = output.split('\n');
    match lines.next() {
        Some(first) if first.trim() == command.trim() => lines.collect::<Vec<_>>().join("\n"),
        _ => output.to_string(),
    }
}

fn truncate_tail(text: &str) -> String {
    if text.chars().count() > TAIL_CHARS {
        let tail: String = text.chars().rev().take(TAIL_CHARS).collect::<Vec<_>>().into_iter().rev().collect();
        format!("[Content Truncated]{tail}")
    } else {
        text.to_string()
    }
}

fn format_completed(current_directory: &str, command: &str, command_output: &str) -> String {
    let header = format!("{current_directory}$ {command}");
    if command_output.is_empty() {
        header
    } else {
        format!("{header}\n{command_output}")
    }
}

fn format_timeout(current_directory: &str, command: &str, raw: &str, timeout_sec: u64, view: bool) -> String {
    let command_output = truncate_tail(&strip_echoed_command(raw.trim(), command));
    let header = format!("{current_directory}$ {command}");
    let message = if view {
        "Process running. Output so far:".to_string()
    } else {
        format!("The command is still running after {timeout_sec} seconds. Output so far:")
    };
    if command_output.is_empty() {
        format!("{header}\n{message}")
    } else {
        format!("{header}\n{message}\n{command_output}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_ansi_removes_escape_sequences() {
        let input = "\u{1b}[31mred\u{1b}[0m text";
        assert_eq!(strip_ansi(input), "red text");
    }

    #[test]
    fn extract_current_directory_reads_text_after_start_sentinel() {
        let before = "output\n[CMD_BEGIN]\nroot@host:/workspace\n";
        assert_eq!(extract_current_directory(before), "root@host:/workspace");
    }

    #[test]
    fn split_on_start_sentinel_separates_output_and_directory() {
        let raw = "hello\n[CMD_BEGIN]\nroot@host:/tmp\n";
        let (output, dir) = split_on_start_sentinel(raw, "echo hello");
        assert_eq!(output, "hello");
        assert_eq!(dir.as_deref(), Some("root@host:/tmp"));
    }

    #[test]
    fn split_on_start_sentinel_strips_echoed_command() {
        let raw = "echo hello\nhello\n[CMD_BEGIN]\nroot@host:/tmp\n";
        let (output, _) = split_on_start_sentinel(raw, "echo hello");
        assert_eq!(output, "hello");
    }

    #[test]
    fn truncate_tail_keeps_last_n_chars_with_marker() {
        let long = "a".repeat(TAIL_CHARS + 10);
        let truncated = truncate_tail(&long);
        assert!(truncated.starts_with("[Content Truncated]"));
        assert_eq!(truncated.len() - "[Content Truncated]".len(), TAIL_CHARS);
    }

    #[test]
    fn truncate_tail_passes_short_text_through() {
        assert_eq!(truncate_tail("short"), "short");
    }

    #[test]
    fn format_timeout_uses_view_message_when_requested() {
        let msg = format_timeout("/tmp", "sleep 5", "partial", 30, true);
        assert!(msg.contains("Process running. Output so far:"));
    }

    #[test]
    fn format_timeout_uses_elapsed_message_otherwise() {
        let msg = format_timeout("/tmp", "sleep 5", "partial", 30, false);
        assert!(msg.contains("still running after 30 seconds"));
    }

    #[tokio::test]
    async fn create_session_then_exec_echo_roundtrip() {
        let manager = TerminalManager::new("/bin/bash", 5, false, None);
        let create = manager.create_session("s1").await;
        assert!(create.success, "{}", create.output);

        let result = manager.shell_exec("s1", "echo hello-world", None, 5).await;
        assert!(result.success, "{}", result.output);
        assert!(result.output.contains("hello-world"));

        manager.shell_kill_process("s1").await;
    }

    #[tokio::test]
    async fn shell_kill_process_removes_unknown_session_gracefully() {
        let manager = TerminalManager::new("/bin/bash", 5, false, None);
        let result = manager.shell_kill_process("missing").await;
        assert!(!result.success);
    }
}
