use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A tool descriptor as advertised to the LLM. The `handler` lives outside
/// this crate (tools crate owns dispatch); here we only carry what the
/// catalog needs to describe and uniquely identify a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's input.
    pub input_schema: serde_json::Value,
}

/// The distinguished tools that end an agent loop (§4.2).
pub const TERMINATION_TOOL_MAIN: &str = "return_control_to_user";
pub const TERMINATION_TOOL_MAIN_ALIAS: &str = "complete";
pub const TERMINATION_TOOL_REVIEWER: &str = "return_control_to_general_agent";

pub fn is_termination_tool(name: &str) -> bool {
    matches!(
        name,
        TERMINATION_TOOL_MAIN | TERMINATION_TOOL_MAIN_ALIAS | TERMINATION_TOOL_REVIEWER
    )
}

/// Mapping from tool name to descriptor. Construction enforces the
/// uniqueness invariant (§3) once, at bind time, rather than on every
/// lookup — a duplicate name is a fatal construction error (§4.2).
#[derive(Debug, Clone, Default)]
pub struct ToolCatalog {
    tools: HashMap<String, ToolDefinition>,
}

#[derive(Debug, thiserror::Error)]
#[error("duplicate tool name \"{0}\" — tool names must be globally unique")]
pub struct DuplicateToolError(pub String);

impl ToolCatalog {
    pub fn new() -> Self {
        Self { tools: HashMap::new() }
    }

    pub fn build(defs: Vec<ToolDefinition>) -> Result<Self, DuplicateToolError> {
        let mut catalog = Self::new();
        for def in defs {
            catalog.insert(def)?;
        }
        Ok(catalog)
    }

    pub fn insert(&mut self, def: ToolDefinition) -> Result<(), DuplicateToolError> {
        if self.tools.contains_key(&def.name) {
            return Err(DuplicateToolError(def.name));
        }
        self.tools.insert(def.name.clone(), def);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn definitions(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.tools.values()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(name: &str) -> ToolDefinition {
        ToolDefinition {
            name: name.into(),
            description: "a tool".into(),
            input_schema: serde_json::json!({"type": "object"}),
        }
    }

    #[test]
    fn unique_names_build_ok() {
        let catalog = ToolCatalog::build(vec![def("exec"), def("str_replace")]).unwrap();
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = ToolCatalog::build(vec![def("exec"), def("exec")]).unwrap_err();
        assert_eq!(err.0, "exec");
    }

    #[test]
    fn termination_tools_are_recognized() {
        assert!(is_termination_tool("return_control_to_user"));
        assert!(is_termination_tool("complete"));
        assert!(is_termination_tool("return_control_to_general_agent"));
        assert!(!is_termination_tool("exec"));
    }
}
