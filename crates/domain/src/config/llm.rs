use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM model registry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Top-level LLM configuration: a flat registry of named models plus the
/// retry/timeout shape shared by every provider call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Per-call timeout before a request is treated as `llm_transient`.
    #[serde(default = "d_timeout_ms")]
    pub default_timeout_ms: u64,
    /// Local retry budget for transient failures (jittered exponential backoff)
    /// before a call is surfaced as `llm_fatal`.
    #[serde(default = "d_max_retries")]
    pub max_retries: u32,
    /// `model_name` used in `init_agent` resolves into this list.
    #[serde(default)]
    pub models: Vec<ModelConfig>,
    /// Model used when the Context Manager needs to summarize; falls back to
    /// the session's own model when unset.
    #[serde(default)]
    pub summarization_model: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: d_timeout_ms(),
            max_retries: d_max_retries(),
            models: Vec::new(),
            summarization_model: None,
        }
    }
}

impl LlmConfig {
    pub fn model(&self, name: &str) -> Option<&ModelConfig> {
        self.models.iter().find(|m| m.id == name)
    }
}

/// One entry in the model registry: everything needed to dial a single model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Name referenced by `init_agent.content.model_name`.
    pub id: String,
    #[serde(rename = "api_type")]
    pub api_type: ApiType,
    pub base_url: String,
    /// Environment variable holding the API key. The key itself is never
    /// logged or echoed back in any response.
    pub api_key_env: String,
    /// Extended-thinking token budget; `None` disables thinking for this model.
    #[serde(default)]
    pub thinking_budget_tokens: Option<u32>,
    /// Per-model override of `LlmConfig::max_retries`.
    #[serde(default)]
    pub max_retries: Option<u32>,
}

/// Wire dialect spoken by a model's provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiType {
    Anthropic,
    Openai,
    Gemini,
}

// ── serde default helpers ───────────────────────────────────────────

fn d_timeout_ms() -> u64 {
    60_000
}
fn d_max_retries() -> u32 {
    3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_lookup_by_id() {
        let cfg = LlmConfig {
            models: vec![ModelConfig {
                id: "claude-main".into(),
                api_type: ApiType::Anthropic,
                base_url: "https://api.anthropic.com".into(),
                api_key_env: "ANTHROPIC_API_KEY".into(),
                thinking_budget_tokens: Some(4096),
                max_retries: None,
            }],
            ..LlmConfig::default()
        };
        assert!(cfg.model("claude-main").is_some());
        assert!(cfg.model("missing").is_none());
    }

    #[test]
    fn defaults_are_sane() {
        let cfg = LlmConfig::default();
        assert_eq!(cfg.max_retries, 3);
        assert!(cfg.models.is_empty());
    }
}
