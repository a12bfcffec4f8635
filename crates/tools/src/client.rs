//! Tool-Op Client (C1) — a uniform RPC facade for shell and file-edit
//! operations. `Local` dispatches straight into the in-process managers;
//! `Remote` proxies the same operations as JSON-over-HTTP calls to a
//! sandbox's exposed tool service, so the Agent Loop never needs to know
//! which sandbox backend a session is running on.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::file_edit::{EditCommand, FileEditManager, FileEditResponse};
use crate::terminal::{SessionResult, TerminalManager};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellExecRequest {
    pub id: String,
    pub command: String,
    #[serde(default)]
    pub exec_dir: Option<String>,
    pub timeout_sec: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEditRequest {
    pub path: String,
    pub command: EditCommand,
}

/// Dispatches shell-session and file-edit operations either to in-process
/// managers (when the sandbox is this process, e.g. `SandboxMode::Local`)
/// or over HTTP to a remote sandbox's tool endpoint.
pub enum ToolClient {
    Local {
        terminal: Arc<TerminalManager>,
        file_edit: Arc<FileEditManager>,
    },
    Remote {
        client: reqwest::Client,
        base_url: String,
        timeout: Duration,
    },
}

impl ToolClient {
    pub fn local(terminal: Arc<TerminalManager>, file_edit: Arc<FileEditManager>) -> Self {
        Self::Local { terminal, file_edit }
    }

    pub fn remote(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self::Remote { client: reqwest::Client::new(), base_url: base_url.into(), timeout }
    }

    pub async fn create_session(&self, id: &str) -> SessionResult {
        match self {
            Self::Local { terminal, .. } => terminal.create_session(id).await,
            Self::Remote { .. } => {
                self.post_remote("/api/terminal/create_session", &serde_json::json!({ "id": id })).await
            }
        }
    }

    pub async fn shell_exec(&self, req: ShellExecRequest) -> SessionResult {
        match self {
            Self::Local { terminal, .. } => {
                terminal.shell_exec(&req.id, &req.command, req.exec_dir.as_deref(), req.timeout_sec).await
            }
            Self::Remote { .. } => self.post_remote("/api/terminal/shell_exec", &req).await,
        }
    }

    pub async fn shell_view(&self, id: &str) -> SessionResult {
        match self {
            Self::Local { terminal, .. } => terminal.shell_view(id).await,
            Self::Remote { .. } => self.post_remote("/api/terminal/shell_view", &serde_json::json!({ "id": id })).await,
        }
    }

    pub async fn shell_wait(&self, id: &str, seconds: u64) -> SessionResult {
        match self {
            Self::Local { terminal, .. } => terminal.shell_wait(id, seconds).await,
            Self::Remote { .. } => {
                self.post_remote("/api/terminal/shell_wait", &serde_json::json!({ "id": id, "seconds": seconds })).await
            }
        }
    }

    pub async fn shell_write_to_process(&self, id: &str, text: &str, press_enter: bool) -> SessionResult {
        match self {
            Self::Local { terminal, .. } => terminal.shell_write_to_process(id, text, press_enter).await,
            Self::Remote { .. } => {
                self.post_remote(
                    "/api/terminal/shell_write_to_process",
                    &serde_json::json!({ "id": id, "text": text, "press_enter": press_enter }),
                )
                .await
            }
        }
    }

    pub async fn shell_kill_process(&self, id: &str) -> SessionResult {
        match self {
            Self::Local { terminal, .. } => terminal.shell_kill_process(id).await,
            Self::Remote { .. } => {
                self.post_remote("/api/terminal/shell_kill_process", &serde_json::json!({ "id": id })).await
            }
        }
    }

    pub async fn file_edit(&self, path: &str, command: EditCommand) -> FileEditResponse {
        match self {
            Self::Local { file_edit, .. } => file_edit.dispatch(path, command).await,
            Self::Remote { .. } => {
                let op = command.op_name();
                let req = FileEditRequest { path: path.to_string(), command };
                match self.post_json(&format!("/api/str_replace/{op}"), &req).await {
                    Ok(resp) => resp,
                    Err(e) => FileEditResponse { success: false, content: e },
                }
            }
        }
    }

    async fn post_remote<T: Serialize>(&self, path: &str, body: &T) -> SessionResult {
        match self.post_json(path, body).await {
            Ok(resp) => resp,
            Err(e) => SessionResult { success: false, output: e },
        }
    }

    async fn post_json<T: Serialize, R: for<'de> Deserialize<'de>>(&self, path: &str, body: &T) -> Result<R, String> {
        let Self::Remote { client, base_url, timeout } = self else {
            unreachable!("post_json is only called on the Remote variant")
        };
        let url = format!("{}{path}", base_url.trim_end_matches('/'));
        let response = client
            .post(&url)
            .timeout(*timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| format!("remote tool call to {url} failed: {e}"))?;

        if !response.status().is_success() {
            return Err(format!("remote tool call to {url} returned {}", response.status()));
        }
        response.json::<R>().await.map_err(|e| format!("failed to decode response from {url}: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_edit::EditCommand;
    use std::path::PathBuf;

    #[tokio::test]
    async fn local_client_dispatches_file_edit_directly() {
        let ws = tempfile::TempDir::new().unwrap();
        let file_edit = Arc::new(FileEditManager::new(ws.path().to_path_buf(), ac_domain::config::FileEditConfig::default()));
        let terminal = Arc::new(TerminalManager::new("/bin/bash", 5, false, None::<PathBuf>));
        let client = ToolClient::local(terminal, file_edit);

        let resp = client.file_edit("a.txt", EditCommand::Create { file_text: "hi".into() }).await;
        assert!(resp.success, "{}", resp.content);
    }

    #[test]
    fn remote_client_constructs_with_trimmed_base_url() {
        let client = ToolClient::remote("http://example.com/", Duration::from_secs(5));
        match client {
            ToolClient::Remote { base_url, .. } => assert_eq!(base_url, "http://example.com/"),
            ToolClient::Local { .. } => panic!("expected remote client"),
        }
    }
}
