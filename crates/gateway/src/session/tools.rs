//! Built-in tool catalog and dispatch (C1 facade, bound to one session's
//! [`ToolClient`]). The spec scopes the full tool catalog (browser, media
//! generation, search) out — only the shell and file-edit families, plus
//! the termination tool, are implemented here (§1, §2).

use std::sync::Arc;

use ac_domain::error::{Error, Result};
use ac_domain::tool::{ToolCatalog, ToolDefinition, TERMINATION_TOOL_MAIN};
use ac_tools::client::{ShellExecRequest, ToolClient};
use ac_tools::file_edit::EditCommand;
use regex::RegexSet;
use serde::Deserialize;

/// Build the fixed set of tools advertised to the LLM on every turn.
pub fn builtin_catalog() -> ToolCatalog {
    let defs = vec![
        ToolDefinition {
            name: "shell_exec".into(),
            description: "Run a shell command in the session's persistent terminal.".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "command": {"type": "string"},
                    "exec_dir": {"type": "string"},
                    "timeout_sec": {"type": "integer"}
                },
                "required": ["command"]
            }),
        },
        ToolDefinition {
            name: "shell_view".into(),
            description: "View the current output of the session's terminal.".into(),
            input_schema: serde_json::json!({"type": "object", "properties": {}}),
        },
        ToolDefinition {
            name: "shell_wait".into(),
            description: "Wait for the in-flight shell command to finish.".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {"seconds": {"type": "integer"}},
                "required": ["seconds"]
            }),
        },
        ToolDefinition {
            name: "shell_write_to_process".into(),
            description: "Write text to the terminal's running process' stdin.".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {"text": {"type": "string"}, "press_enter": {"type": "boolean"}},
                "required": ["text"]
            }),
        },
        ToolDefinition {
            name: "shell_kill_process".into(),
            description: "Kill the terminal's currently running process.".into(),
            input_schema: serde_json::json!({"type": "object", "properties": {}}),
        },
        ToolDefinition {
            name: "str_replace_editor".into(),
            description: "View, create, or edit a file under the session workspace.".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string"},
                    "command": {"type": "string", "enum": ["view", "create", "str_replace", "insert", "undo_edit", "read_file", "write_file"]}
                },
                "required": ["path", "command"]
            }),
        },
        ToolDefinition {
            name: TERMINATION_TOOL_MAIN.into(),
            description: "Return control to the user with a final answer.".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {"text": {"type": "string"}},
                "required": ["text"]
            }),
        },
    ];
    ToolCatalog::build(defs).expect("builtin tool names are unique by construction")
}

#[derive(Debug, Deserialize)]
struct ShellExecInput {
    command: String,
    #[serde(default)]
    exec_dir: Option<String>,
    #[serde(default)]
    timeout_sec: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ShellWaitInput {
    seconds: u64,
}

#[derive(Debug, Deserialize)]
struct ShellWriteInput {
    text: String,
    #[serde(default)]
    press_enter: bool,
}

#[derive(Debug, Deserialize)]
struct EditorInput {
    path: String,
    #[serde(flatten)]
    command: EditCommand,
}

/// Dispatches a single named tool call against one session's [`ToolClient`],
/// enforcing the configured denied-command patterns ahead of `shell_exec`.
pub struct ToolDispatcher {
    client: Arc<ToolClient>,
    denied: Arc<RegexSet>,
    terminal_id: String,
    default_timeout_sec: u64,
}

impl ToolDispatcher {
    pub fn new(client: Arc<ToolClient>, denied: Arc<RegexSet>, terminal_id: String, default_timeout_sec: u64) -> Self {
        Self { client, denied, terminal_id, default_timeout_sec }
    }

    /// Run `name` with `input`, returning the text to feed back as the tool
    /// result. Validation and tool-internal failures are both reported as
    /// `ToolResult` text (per §4.2 the loop never crashes on a bad call);
    /// only a malformed call (unknown tool, unparseable input) surfaces as
    /// an `Error`.
    pub async fn dispatch(&self, name: &str, input: &serde_json::Value) -> Result<String> {
        match name {
            "shell_exec" => {
                let req: ShellExecInput = serde_json::from_value(input.clone()).map_err(|_| Error::Validation(format!("invalid input for tool call: {name}")))?;
                if self.denied.is_match(&req.command) {
                    return Ok(format!("command rejected: \"{}\" matches a denied pattern", req.command));
                }
                self.client.create_session(&self.terminal_id).await;
                let result = self
                    .client
                    .shell_exec(ShellExecRequest {
                        id: self.terminal_id.clone(),
                        command: req.command,
                        exec_dir: req.exec_dir,
                        timeout_sec: req.timeout_sec.unwrap_or(self.default_timeout_sec),
                    })
                    .await;
                Ok(result.output)
            }
            "shell_view" => Ok(self.client.shell_view(&self.terminal_id).await.output),
            "shell_wait" => {
                let req: ShellWaitInput = serde_json::from_value(input.clone()).map_err(|_| Error::Validation(format!("invalid input for tool call: {name}")))?;
                Ok(self.client.shell_wait(&self.terminal_id, req.seconds).await.output)
            }
            "shell_write_to_process" => {
                let req: ShellWriteInput = serde_json::from_value(input.clone()).map_err(|_| Error::Validation(format!("invalid input for tool call: {name}")))?;
                Ok(self
                    .client
                    .shell_write_to_process(&self.terminal_id, &req.text, req.press_enter)
                    .await
                    .output)
            }
            "shell_kill_process" => Ok(self.client.shell_kill_process(&self.terminal_id).await.output),
            "str_replace_editor" => {
                let req: EditorInput = serde_json::from_value(input.clone()).map_err(|_| Error::Validation(format!("invalid input for tool call: {name}")))?;
                let resp = self.client.file_edit(&req.path, req.command).await;
                Ok(resp.content)
            }
            other => Err(Error::ToolError(format!("unknown tool \"{other}\""))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_has_unique_names() {
        let catalog = builtin_catalog();
        assert!(catalog.contains("shell_exec"));
        assert!(catalog.contains(TERMINATION_TOOL_MAIN));
        assert_eq!(catalog.len(), 7);
    }
}
