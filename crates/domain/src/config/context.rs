use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Context Manager budgets
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Truncate once `token_count(history)` exceeds this.
    #[serde(default = "d_token_budget")]
    pub token_budget: usize,
    /// Truncate once `turn_count(history)` exceeds this, independent of tokens.
    #[serde(default = "d_max_size")]
    pub max_size: usize,
    /// Per-event clip length used when rendering events into a summarization
    /// prompt; longer events get an `"... [truncated]"` marker.
    #[serde(default = "d_max_event_length")]
    pub max_event_length: usize,
    /// Hard cap on output tokens requested per agent-loop turn.
    #[serde(default = "d_max_output_tokens")]
    pub max_output_tokens_per_turn: u32,
    /// Hard cap on turns taken within a single `query` before the loop yields
    /// control back to the client even without a terminal tool result.
    #[serde(default = "d_max_turns")]
    pub max_turns: u32,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            token_budget: d_token_budget(),
            max_size: d_max_size(),
            max_event_length: d_max_event_length(),
            max_output_tokens_per_turn: d_max_output_tokens(),
            max_turns: d_max_turns(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_token_budget() -> usize {
    120_000
}
fn d_max_size() -> usize {
    100
}
fn d_max_event_length() -> usize {
    10_000
}
fn d_max_output_tokens() -> u32 {
    8_192
}
fn d_max_turns() -> u32 {
    200
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_constants() {
        let cfg = ContextConfig::default();
        assert_eq!(cfg.token_budget, 120_000);
        assert_eq!(cfg.max_size, 100);
        assert_eq!(cfg.max_event_length, 10_000);
    }

    #[test]
    fn deserialize_empty_uses_defaults() {
        let cfg: ContextConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.token_budget, 120_000);
    }
}
