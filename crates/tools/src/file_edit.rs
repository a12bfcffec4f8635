//! File-Edit Manager (C3) — safe view/create/replace/insert/undo on files
//! inside a session's workspace, with a per-file undo stack and
//! indentation-tolerant `str_replace` matching.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use ac_domain::config::FileEditConfig;

use crate::file_ops::validate_path;

const TRUNCATED_NOTICE: &str = "<response clipped><NOTE>To save on context only part of this file has been shown to you. You should retry this tool after you have searched inside the file with `grep -n` in order to find the line numbers of what you are looking for.</NOTE>";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum EditCommand {
    View {
        #[serde(default)]
        view_range: Option<[i64; 2]>,
    },
    Create {
        file_text: String,
    },
    StrReplace {
        old_str: String,
        #[serde(default)]
        new_str: Option<String>,
        #[serde(default)]
        ignore_indentation: bool,
    },
    Insert {
        insert_line: usize,
        new_str: String,
    },
    UndoEdit,
    ReadFile,
    WriteFile {
        content: String,
    },
}

impl EditCommand {
    /// The `/api/str_replace/{op}` path segment for this command, per the
    /// sandbox tool-service's external interface.
    pub fn op_name(&self) -> &'static str {
        match self {
            EditCommand::View { .. } => "view",
            EditCommand::Create { .. } => "create",
            EditCommand::StrReplace { .. } => "str_replace",
            EditCommand::Insert { .. } => "insert",
            EditCommand::UndoEdit => "undo_edit",
            EditCommand::ReadFile => "read_file",
            EditCommand::WriteFile { .. } => "write_file",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEditResponse {
    pub success: bool,
    pub content: String,
}

impl FileEditResponse {
    fn ok(content: impl Into<String>) -> Self {
        Self { success: true, content: content.into() }
    }

    fn err(content: impl Into<String>) -> Self {
        Self { success: false, content: content.into() }
    }
}

fn truncate_response(content: &str, max_chars: usize) -> String {
    if content.len() <= max_chars {
        return content.to_string();
    }
    let mut boundary = max_chars;
    while boundary > 0 && !content.is_char_boundary(boundary) {
        boundary -= 1;
    }
    format!("{}{TRUNCATED_NOTICE}", &content[..boundary])
}

/// `cat -n`-style rendering of `content`, with absolute line numbers
/// starting at `init_line`, truncated to the configured response cap.
fn make_output(content: &str, descriptor: &str, total_lines: usize, init_line: usize, max_chars: usize) -> String {
    let content = truncate_response(content, max_chars);
    let numbered: String = content
        .split('\n')
        .enumerate()
        .map(|(i, line)| format!("{:>6}\t{line}", i + init_line))
        .collect::<Vec<_>>()
        .join("\n");
    format!("Here's the result of running `cat -n` on {descriptor}:\n{numbered}\nTotal lines in file: {total_lines}\n")
}

/// Manages view/create/replace/insert/undo operations on files within one
/// session's workspace. Each file gets its own undo stack; the stack
/// survives for the lifetime of the manager (one per session).
pub struct FileEditManager {
    workspace_root: PathBuf,
    config: FileEditConfig,
    history: RwLock<HashMap<PathBuf, Vec<String>>>,
}

impl FileEditManager {
    pub fn new(workspace_root: PathBuf, config: FileEditConfig) -> Self {
        Self {
            workspace_root,
            config,
            history: RwLock::new(HashMap::new()),
        }
    }

    async fn resolve(&self, path_str: &str, command: &EditCommand) -> Result<PathBuf, String> {
        let resolved = validate_path(&self.workspace_root, path_str)?;
        let exists = resolved.exists();

        match command {
            EditCommand::Create { .. } => {
                if exists {
                    let content = tokio::fs::read_to_string(&resolved).await.unwrap_or_default();
                    if !content.trim().is_empty() {
                        return Err(format!(
                            "File already exists and is not empty at: {path_str}. Cannot overwrite non empty files using command `create`."
                        ));
                    }
                }
            }
            _ => {
                if !exists {
                    return Err(format!("The path {path_str} does not exist. Please provide a valid path."));
                }
            }
        }

        if exists && resolved.is_dir() && !matches!(command, EditCommand::View { .. }) {
            return Err(format!(
                "The path {path_str} is a directory and only the `view` command can be used on directories"
            ));
        }

        Ok(resolved)
    }

    pub async fn dispatch(&self, path_str: &str, command: EditCommand) -> FileEditResponse {
        let resolved = match self.resolve(path_str, &command).await {
            Ok(p) => p,
            Err(e) => return FileEditResponse::err(e),
        };

        match command {
            EditCommand::View { view_range } => self.view(&resolved, path_str, view_range).await,
            EditCommand::Create { file_text } => self.create(&resolved, path_str, file_text).await,
            EditCommand::StrReplace { old_str, new_str, ignore_indentation } => {
                if ignore_indentation {
                    self.str_replace_ignore_indent(&resolved, path_str, &old_str, new_str.as_deref()).await
                } else {
                    self.str_replace(&resolved, path_str, &old_str, new_str.as_deref()).await
                }
            }
            EditCommand::Insert { insert_line, new_str } => self.insert(&resolved, path_str, insert_line, &new_str).await,
            EditCommand::UndoEdit => self.undo_edit(&resolved, path_str).await,
            EditCommand::ReadFile => self.read_file(&resolved, path_str).await,
            EditCommand::WriteFile { content } => self.write_file(&resolved, path_str, content).await,
        }
    }

    async fn read_content(&self, path: &Path, display_path: &str) -> Result<String, String> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Ran into {e} while trying to read {display_path}"))
    }

    async fn write_content(&self, path: &Path, content: &str, display_path: &str) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| format!("Ran into {e} while trying to write to {display_path}"))?;
        }
        tokio::fs::write(path, content)
            .await
            .map_err(|e| format!("Ran into {e} while trying to write to {display_path}"))
    }

    fn push_history(&self, path: &Path, old_content: String) {
        self.history.write().entry(path.to_path_buf()).or_default().push(old_content);
    }

    async fn view(&self, path: &Path, display_path: &str, view_range: Option<[i64; 2]>) -> FileEditResponse {
        if path.is_dir() {
            if view_range.is_some() {
                return FileEditResponse::err("The `view_range` parameter is not allowed when `path` points to a directory.");
            }
            return self.view_directory(path, display_path).await;
        }

        let content = match self.read_content(path, display_path).await {
            Ok(c) => c,
            Err(e) => return FileEditResponse::err(e),
        };
        let lines: Vec<&str> = content.split('\n').collect();
        let n_lines = lines.len();

        let (init_line, slice) = match view_range {
            None => (1, content.as_str()),
            Some([start, end]) => {
                if start < 1 || start as usize > n_lines {
                    return FileEditResponse::err(format!(
                        "Invalid `view_range`: [{start}, {end}]. Its first element `{start}` should be within the range of lines of the file: [1, {n_lines}]"
                    ));
                }
                if end != -1 && (end as usize) > n_lines {
                    return FileEditResponse::err(format!(
                        "Invalid `view_range`: [{start}, {end}]. Its second element `{end}` should be smaller than the number of lines in the file: `{n_lines}`"
                    ));
                }
                if end != -1 && end < start {
                    return FileEditResponse::err(format!(
                        "Invalid `view_range`: [{start}, {end}]. Its second element `{end}` should be larger or equal than its first `{start}`"
                    ));
                }
                let end_idx = if end == -1 { n_lines } else { end as usize };
                let joined = lines[(start as usize - 1)..end_idx].join("\n");
                return FileEditResponse::ok(make_output(&joined, display_path, n_lines, start as usize, self.config.max_response_chars));
            }
        };

        FileEditResponse::ok(make_output(slice, display_path, n_lines, init_line, self.config.max_response_chars))
    }

    async fn view_directory(&self, path: &Path, display_path: &str) -> FileEditResponse {
        let mut listing = Vec::new();
        self.walk_depth(path, 0, &mut listing).await;
        listing.sort();
        let body = listing.join("\n");
        FileEditResponse::ok(format!(
            "Here's the files and directories up to 2 levels deep in {display_path}, excluding hidden items:\n{body}\n"
        ))
    }

    fn walk_depth<'a>(
        &'a self,
        dir: &'a Path,
        depth: usize,
        out: &'a mut Vec<String>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + 'a>> {
        Box::pin(async move {
            if depth > 2 {
                return;
            }
            let Ok(mut entries) = tokio::fs::read_dir(dir).await else { return };
            while let Ok(Some(entry)) = entries.next_entry().await {
                let name = entry.file_name().to_string_lossy().to_string();
                if name.starts_with('.') || self.config.excluded_dirs.iter().any(|d| d == &name) {
                    continue;
                }
                out.push(entry.path().display().to_string());
                if depth < 2 && entry.path().is_dir() {
                    self.walk_depth(&entry.path(), depth + 1, out).await;
                }
            }
        })
    }

    async fn create(&self, path: &Path, display_path: &str, file_text: String) -> FileEditResponse {
        let old_content = tokio::fs::read_to_string(path).await.ok();
        if let Some(old) = old_content {
            self.push_history(path, old);
        }
        if let Err(e) = self.write_content(path, &file_text, display_path).await {
            return FileEditResponse::err(e);
        }

        let total_lines = file_text.split('\n').count();
        let mut msg = format!("The file {display_path} has been edited. Here's the new content:\n{file_text}");
        msg.push_str(&make_output(&file_text, display_path, total_lines, 1, self.config.max_response_chars));
        msg.push_str("Review the changes and make sure they are as expected. Edit the file again if necessary.");
        FileEditResponse::ok(msg)
    }

    async fn str_replace(&self, path: &Path, display_path: &str, old_str: &str, new_str: Option<&str>) -> FileEditResponse {
        let new_str = new_str.unwrap_or("");
        let content = match self.read_content(path, display_path).await {
            Ok(c) => c,
            Err(e) => return FileEditResponse::err(e),
        };

        if old_str.trim().is_empty() {
            if !content.trim().is_empty() {
                return FileEditResponse::err(format!(
                    "No replacement was performed, old_str is empty which is only allowed when the file is empty. The file {display_path} is not empty."
                ));
            }
            self.push_history(path, content);
            if let Err(e) = self.write_content(path, new_str, display_path).await {
                return FileEditResponse::err(e);
            }
            let total_lines = new_str.split('\n').count();
            let mut msg = format!("The file {display_path} has been edited. Here's the new content:\n{new_str}");
            msg.push_str(&make_output(new_str, display_path, total_lines, 1, self.config.max_response_chars));
            msg.push_str("Review the changes and make sure they are as expected. Edit the file again if necessary.");
            return FileEditResponse::ok(msg);
        }

        let occurrences = content.matches(old_str).count();
        if occurrences == 0 {
            return FileEditResponse::err(format!(
                "No replacement was performed, old_str \n ```\n{old_str}\n```\n did not appear verbatim in {display_path}."
            ));
        }
        if occurrences > 1 {
            let lines: Vec<usize> = content
                .split('\n')
                .enumerate()
                .filter(|(_, line)| line.contains(old_str))
                .map(|(i, _)| i + 1)
                .collect();
            return FileEditResponse::err(format!(
                "No replacement was performed. Multiple occurrences of old_str \n ```\n{old_str}\n```\n in lines {lines:?}. Please ensure it is unique"
            ));
        }

        let new_content = content.replacen(old_str, new_str, 1);
        let replacement_line = content.split(old_str).next().unwrap_or("").matches('\n').count();
        self.push_history(path, content);
        if let Err(e) = self.write_content(path, &new_content, display_path).await {
            return FileEditResponse::err(e);
        }

        let radius = self.config.snippet_lines;
        let start_line = replacement_line.saturating_sub(radius);
        let end_line = replacement_line + radius + new_str.matches('\n').count();
        let new_lines: Vec<&str> = new_content.split('\n').collect();
        let snippet = new_lines[start_line..(end_line + 1).min(new_lines.len())].join("\n");

        let mut msg = format!("The file {display_path} has been edited. ");
        msg.push_str(&make_output(
            &snippet,
            &format!("a snippet of {display_path}"),
            new_lines.len(),
            start_line + 1,
            self.config.max_response_chars,
        ));
        msg.push_str("Review the changes and make sure they are as expected. Edit the file again if necessary.");
        FileEditResponse::ok(msg)
    }

    /// Line-wise replace that compares `old_str` against `content` after
    /// stripping leading/trailing whitespace from each line, then
    /// re-indents `new_str` to the first matched line's leading whitespace.
    /// A deliberately simpler re-indentation than the original's per-line
    /// indent transfer, but preserves the same match semantics.
    async fn str_replace_ignore_indent(
        &self,
        path: &Path,
        display_path: &str,
        old_str: &str,
        new_str: Option<&str>,
    ) -> FileEditResponse {
        let new_str = new_str.unwrap_or("");
        let content = match self.read_content(path, display_path).await {
            Ok(c) => c,
            Err(e) => return FileEditResponse::err(e),
        };

        let content_lines: Vec<&str> = content.split('\n').collect();
        let stripped_content: Vec<&str> = content_lines.iter().map(|l| l.trim()).collect();
        let stripped_old: Vec<&str> = old_str.split('\n').map(|l| l.trim()).collect();

        if stripped_old.is_empty() || stripped_content.len() < stripped_old.len() {
            return FileEditResponse::err(format!(
                "No replacement was performed, old_str \n ```\n{old_str}\n```\n did not appear in {display_path}."
            ));
        }

        let mut matches = Vec::new();
        for i in 0..=(stripped_content.len() - stripped_old.len()) {
            let is_match = (0..stripped_old.len()).all(|j| stripped_content[i + j] == stripped_old[j]);
            if is_match {
                matches.push(i);
            }
        }

        if matches.is_empty() {
            return FileEditResponse::err(format!(
                "No replacement was performed, old_str \n ```\n{old_str}\n```\n did not appear in {display_path}."
            ));
        }
        if matches.len() > 1 {
            let match_lines: Vec<usize> = matches.iter().map(|i| i + 1).collect();
            return FileEditResponse::err(format!(
                "No replacement was performed. Multiple occurrences of old_str \n ```\n{old_str}\n```\n starting at lines {match_lines:?}. Please ensure it is unique"
            ));
        }

        let match_start = matches[0];
        let match_end = match_start + stripped_old.len();
        let indent: String = content_lines[match_start].chars().take_while(|c| c.is_whitespace()).collect();
        let indented_new: String = new_str.split('\n').map(|l| format!("{indent}{l}")).collect::<Vec<_>>().join("\n");

        let mut new_lines: Vec<&str> = content_lines[..match_start].to_vec();
        let indented_new_lines: Vec<&str> = indented_new.split('\n').collect();
        new_lines.extend(indented_new_lines.iter());
        new_lines.extend(content_lines[match_end..].iter());
        let new_content = new_lines.join("\n");

        self.push_history(path, content);
        if let Err(e) = self.write_content(path, &new_content, display_path).await {
            return FileEditResponse::err(e);
        }

        let radius = self.config.snippet_lines;
        let start_line = match_start.saturating_sub(radius);
        let end_line = match_start + radius + new_str.matches('\n').count();
        let snippet = new_lines[start_line..(end_line + 1).min(new_lines.len())].join("\n");

        let mut msg = format!("The file {display_path} has been edited. ");
        msg.push_str(&make_output(
            &snippet,
            &format!("a snippet of {display_path}"),
            new_lines.len(),
            start_line + 1,
            self.config.max_response_chars,
        ));
        msg.push_str("Review the changes and make sure they are as expected. Edit the file again if necessary.");
        FileEditResponse::ok(msg)
    }

    async fn insert(&self, path: &Path, display_path: &str, insert_line: usize, new_str: &str) -> FileEditResponse {
        let content = match self.read_content(path, display_path).await {
            Ok(c) => c,
            Err(e) => return FileEditResponse::err(e),
        };

        let lines: Vec<&str> = content.split('\n').collect();
        let n_lines = lines.len();
        if insert_line > n_lines {
            return FileEditResponse::err(format!(
                "Invalid `insert_line` parameter: {insert_line}. It should be within the range of lines of the file: [0, {n_lines}]"
            ));
        }

        let new_lines: Vec<&str> = new_str.split('\n').collect();
        let mut new_file_lines: Vec<&str> = lines[..insert_line].to_vec();
        new_file_lines.extend(new_lines.iter());
        new_file_lines.extend(lines[insert_line..].iter());

        let radius = self.config.snippet_lines;
        let snippet_start = insert_line.saturating_sub(radius);
        let snippet_end = (insert_line + radius).min(lines.len());
        let mut snippet_lines: Vec<&str> = lines[snippet_start..insert_line].to_vec();
        snippet_lines.extend(new_lines.iter());
        snippet_lines.extend(lines[insert_line..snippet_end].iter());

        let new_file_text = new_file_lines.join("\n");
        let snippet = snippet_lines.join("\n");

        self.push_history(path, content);
        if let Err(e) = self.write_content(path, &new_file_text, display_path).await {
            return FileEditResponse::err(e);
        }

        let mut msg = format!("The file {display_path} has been edited. ");
        msg.push_str(&make_output(
            &snippet,
            "a snippet of the edited file",
            new_file_lines.len(),
            snippet_start.max(insert_line.saturating_sub(radius)) + 1,
            self.config.max_response_chars,
        ));
        msg.push_str("Review the changes and make sure they are as expected (correct indentation, no duplicate lines, etc). Edit the file again if necessary.");
        FileEditResponse::ok(msg)
    }

    async fn undo_edit(&self, path: &Path, display_path: &str) -> FileEditResponse {
        let popped = self.history.write().get_mut(path).and_then(|stack| stack.pop());
        let Some(old_text) = popped else {
            return FileEditResponse::err(format!("No edit history found for {display_path}."));
        };
        if let Err(e) = self.write_content(path, &old_text, display_path).await {
            return FileEditResponse::err(e);
        }
        let total_lines = old_text.split('\n').count();
        let mut msg = format!("Last edit to {display_path} undone successfully.\n");
        msg.push_str(&make_output(&old_text, display_path, total_lines, 1, self.config.max_response_chars));
        FileEditResponse::ok(msg)
    }

    async fn read_file(&self, path: &Path, display_path: &str) -> FileEditResponse {
        match self.read_content(path, display_path).await {
            Ok(content) => FileEditResponse::ok(content),
            Err(e) => FileEditResponse::err(e),
        }
    }

    async fn write_file(&self, path: &Path, display_path: &str, content: String) -> FileEditResponse {
        if let Ok(old) = self.read_content(path, display_path).await {
            self.push_history(path, old);
        }
        match self.write_content(path, &content, display_path).await {
            Ok(()) => FileEditResponse::ok(content),
            Err(e) => FileEditResponse::err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager(ws: &TempDir) -> FileEditManager {
        FileEditManager::new(ws.path().to_path_buf(), FileEditConfig::default())
    }

    #[tokio::test]
    async fn create_then_view_roundtrip() {
        let ws = TempDir::new().unwrap();
        let m = manager(&ws);
        let resp = m.dispatch("a.txt", EditCommand::Create { file_text: "hello\nworld".into() }).await;
        assert!(resp.success);

        let resp = m.dispatch("a.txt", EditCommand::View { view_range: None }).await;
        assert!(resp.success);
        assert!(resp.content.contains("hello"));
        assert!(resp.content.contains("Total lines in file: 2"));
    }

    #[tokio::test]
    async fn create_rejects_nonempty_existing_file() {
        let ws = TempDir::new().unwrap();
        std::fs::write(ws.path().join("a.txt"), "not empty").unwrap();
        let m = manager(&ws);
        let resp = m.dispatch("a.txt", EditCommand::Create { file_text: "new".into() }).await;
        assert!(!resp.success);
        assert!(resp.content.contains("already exists"));
    }

    #[tokio::test]
    async fn str_replace_unique_match_succeeds() {
        let ws = TempDir::new().unwrap();
        let m = manager(&ws);
        m.dispatch("a.txt", EditCommand::Create { file_text: "foo\nbar\nbaz".into() }).await;
        let resp = m
            .dispatch("a.txt", EditCommand::StrReplace { old_str: "bar".into(), new_str: Some("qux".into()), ignore_indentation: false })
            .await;
        assert!(resp.success, "{}", resp.content);

        let view = m.dispatch("a.txt", EditCommand::View { view_range: None }).await;
        assert!(view.content.contains("qux"));
        assert!(!view.content.contains("bar"));
    }

    #[tokio::test]
    async fn str_replace_zero_occurrences_fails() {
        let ws = TempDir::new().unwrap();
        let m = manager(&ws);
        m.dispatch("a.txt", EditCommand::Create { file_text: "foo".into() }).await;
        let resp = m
            .dispatch("a.txt", EditCommand::StrReplace { old_str: "missing".into(), new_str: Some("x".into()), ignore_indentation: false })
            .await;
        assert!(!resp.success);
        assert!(resp.content.contains("did not appear"));
    }

    #[tokio::test]
    async fn str_replace_multiple_occurrences_fails() {
        let ws = TempDir::new().unwrap();
        let m = manager(&ws);
        m.dispatch("a.txt", EditCommand::Create { file_text: "foo\nfoo".into() }).await;
        let resp = m
            .dispatch("a.txt", EditCommand::StrReplace { old_str: "foo".into(), new_str: Some("bar".into()), ignore_indentation: false })
            .await;
        assert!(!resp.success);
        assert!(resp.content.contains("Multiple occurrences"));
    }

    #[tokio::test]
    async fn empty_old_str_only_legal_on_empty_file() {
        let ws = TempDir::new().unwrap();
        let m = manager(&ws);
        m.dispatch("a.txt", EditCommand::Create { file_text: String::new() }).await;
        let resp = m
            .dispatch("a.txt", EditCommand::StrReplace { old_str: "".into(), new_str: Some("whole file".into()), ignore_indentation: false })
            .await;
        assert!(resp.success, "{}", resp.content);

        let resp2 = m
            .dispatch("a.txt", EditCommand::StrReplace { old_str: "".into(), new_str: Some("again".into()), ignore_indentation: false })
            .await;
        assert!(!resp2.success);
    }

    #[tokio::test]
    async fn insert_at_zero_prepends() {
        let ws = TempDir::new().unwrap();
        let m = manager(&ws);
        m.dispatch("a.txt", EditCommand::Create { file_text: "second".into() }).await;
        let resp = m.dispatch("a.txt", EditCommand::Insert { insert_line: 0, new_str: "first".into() }).await;
        assert!(resp.success, "{}", resp.content);

        let view = m.dispatch("a.txt", EditCommand::View { view_range: None }).await;
        let first_idx = view.content.find("first").unwrap();
        let second_idx = view.content.find("second").unwrap();
        assert!(first_idx < second_idx);
    }

    #[tokio::test]
    async fn undo_restores_prior_content() {
        let ws = TempDir::new().unwrap();
        let m = manager(&ws);
        m.dispatch("a.txt", EditCommand::Create { file_text: "x".into() }).await;
        m.dispatch(
            "a.txt",
            EditCommand::StrReplace { old_str: "x".into(), new_str: Some("y".into()), ignore_indentation: false },
        )
        .await;
        let resp = m.dispatch("a.txt", EditCommand::UndoEdit).await;
        assert!(resp.success);

        let view = m.dispatch("a.txt", EditCommand::View { view_range: None }).await;
        assert!(view.content.contains(" x\n") || view.content.ends_with('x') || view.content.contains("\tx"));
    }

    #[tokio::test]
    async fn undo_with_empty_history_fails() {
        let ws = TempDir::new().unwrap();
        let m = manager(&ws);
        m.dispatch("a.txt", EditCommand::Create { file_text: "x".into() }).await;
        let resp = m.dispatch("a.txt", EditCommand::UndoEdit).await;
        assert!(!resp.success);
        assert!(resp.content.contains("No edit history"));
    }

    #[tokio::test]
    async fn nonexistent_path_for_non_create_fails() {
        let ws = TempDir::new().unwrap();
        let m = manager(&ws);
        let resp = m.dispatch("missing.txt", EditCommand::View { view_range: None }).await;
        assert!(!resp.success);
        assert!(resp.content.contains("does not exist"));
    }

    #[tokio::test]
    async fn view_rejects_directory_with_range() {
        let ws = TempDir::new().unwrap();
        std::fs::create_dir(ws.path().join("subdir")).unwrap();
        let m = manager(&ws);
        let resp = m.dispatch("subdir", EditCommand::View { view_range: Some([1, 2]) }).await;
        assert!(!resp.success);
        assert!(resp.content.contains("view_range"));
    }

    #[tokio::test]
    async fn directory_view_excludes_hidden_and_excluded_dirs() {
        let ws = TempDir::new().unwrap();
        std::fs::create_dir(ws.path().join(".git")).unwrap();
        std::fs::create_dir(ws.path().join("node_modules")).unwrap();
        std::fs::write(ws.path().join("visible.txt"), "x").unwrap();
        let m = manager(&ws);
        let resp = m.dispatch(".", EditCommand::View { view_range: None }).await;
        assert!(resp.success);
        assert!(resp.content.contains("visible.txt"));
        assert!(!resp.content.contains(".git"));
        assert!(!resp.content.contains("node_modules"));
    }

    #[test]
    fn truncate_response_appends_notice_past_limit() {
        let big = "a".repeat(100);
        let truncated = truncate_response(&big, 10);
        assert!(truncated.starts_with(&"a".repeat(10)));
        assert!(truncated.contains("response clipped"));
    }
}
