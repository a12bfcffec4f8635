use crate::summarize::{build_summarization_prompt, failed_summary_text, Summarizer};
use crate::token::TokenCounter;
use ac_domain::config::ContextConfig;
use ac_domain::{MessageHistory, Turn};

const KEEP_FIRST: usize = 1;
const SUMMARY_PREFIX: &str = "Conversation Summary:";

/// Report describing what a truncation pass did, used for tracing
/// (`TraceEvent::ContextTruncated`) and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TruncationReport {
    pub strategy: &'static str,
    pub turns_before: usize,
    pub turns_after: usize,
    pub summarized: bool,
}

fn no_op(history: &MessageHistory, strategy: &'static str) -> TruncationReport {
    TruncationReport {
        strategy,
        turns_before: history.len(),
        turns_after: history.len(),
        summarized: false,
    }
}

/// Entry point: truncate `history` in place if either bound in `cfg` is
/// exceeded, selecting Strategy A or B per §4.3. No-op if within budget.
pub async fn truncate_if_needed(
    history: &mut MessageHistory,
    cfg: &ContextConfig,
    counter: &dyn TokenCounter,
    summarizer: &dyn Summarizer,
) -> TruncationReport {
    let over_tokens = counter.count(history) > cfg.token_budget;
    let over_size = history.len() > cfg.max_size;
    if !over_tokens && !over_size {
        return no_op(history, "none");
    }

    if history.contains_thinking_blocks() {
        strategy_a(history, cfg, summarizer).await
    } else {
        strategy_b(history, cfg, summarizer).await
    }
}

/// Widen `[start, end)` outward so neither edge falls between a `ToolCall`
/// and its `ToolResult` — both strategies must preserve this (§4.3).
fn widen_to_safe_boundary(history: &MessageHistory, start: usize, end: usize) -> (usize, usize) {
    let turns = history.turns();
    let mut start = start;
    let mut end = end;

    // If `start` lands after a turn containing an unresolved ToolCall whose
    // ToolResult is inside [start, end), pull start back to include it.
    while start > 0 {
        let prev = &turns[start - 1];
        let opens_call = prev.messages.iter().any(|m| m.is_tool_call());
        if !opens_call {
            break;
        }
        let resolved_inside = turns[start..end.min(turns.len())]
            .iter()
            .any(|t| t.messages.iter().any(|m| m.is_tool_result()));
        if resolved_inside {
            start -= 1;
        } else {
            break;
        }
    }

    // If a ToolResult just past `end` resolves a call still inside the
    // summarized range, extend `end` to include it.
    while end < turns.len() {
        let next = &turns[end];
        let resolves_call = next.messages.iter().any(|m| m.is_tool_result());
        if !resolves_call {
            break;
        }
        let opened_inside = turns[start..end].iter().any(|t| t.messages.iter().any(|m| m.is_tool_call()));
        if opened_inside {
            end += 1;
        } else {
            break;
        }
    }

    (start, end)
}

async fn strategy_a(history: &mut MessageHistory, cfg: &ContextConfig, summarizer: &dyn Summarizer) -> TruncationReport {
    let turns_before = history.len();
    let Some(last_prompt_idx) = history.last_text_prompt_index() else {
        return no_op(history, "a");
    };
    if last_prompt_idx <= KEEP_FIRST {
        return no_op(history, "a");
    }

    let target_size = cfg.max_size.min(history.len()) / 2;
    let end = last_prompt_idx.min(KEEP_FIRST + target_size);
    if end.saturating_sub(KEEP_FIRST) <= 1 {
        return no_op(history, "a");
    }

    let (start, end) = widen_to_safe_boundary(history, KEEP_FIRST, end);
    let range: Vec<Turn> = history.turns()[start..end].to_vec();
    let prompt = build_summarization_prompt(&range, None, cfg.max_event_length);

    let summary = match summarizer.summarize(prompt).await {
        Ok(text) => text,
        Err(e) => failed_summary_text(range.len(), &e),
    };

    let replacement = Turn::assistant_text(format!("{SUMMARY_PREFIX} {summary}"));
    history.replace_range(start, end, replacement);

    TruncationReport {
        strategy: "a",
        turns_before,
        turns_after: history.len(),
        summarized: true,
    }
}

async fn strategy_b(history: &mut MessageHistory, cfg: &ContextConfig, summarizer: &dyn Summarizer) -> TruncationReport {
    let turns_before = history.len();
    let target_size = cfg.max_size.min(history.len()) / 2;
    if target_size <= KEEP_FIRST + 1 {
        return no_op(history, "b");
    }
    let events_from_tail = target_size - KEEP_FIRST - 1;
    if turns_before <= KEEP_FIRST + events_from_tail {
        return no_op(history, "b");
    }

    let mut head_end = KEEP_FIRST;
    let previous_summary = history
        .turns()
        .get(head_end)
        .and_then(|t| t.messages.first())
        .and_then(|m| m.flat_text().strip_prefix(SUMMARY_PREFIX).map(|s| s.trim().to_string()));
    if previous_summary.is_some() {
        head_end += 1;
    }

    let tail_start = turns_before - events_from_tail;
    if tail_start <= head_end {
        return no_op(history, "b");
    }

    let (start, end) = widen_to_safe_boundary(history, head_end, tail_start);
    let range: Vec<Turn> = history.turns()[start..end].to_vec();
    let prompt = build_summarization_prompt(&range, previous_summary.as_deref(), cfg.max_event_length);

    let summary = match summarizer.summarize(prompt).await {
        Ok(text) => text,
        Err(e) => failed_summary_text(range.len(), &e),
    };

    let replacement = Turn::assistant_text(format!("{SUMMARY_PREFIX} {summary}"));
    history.replace_range(start, end, replacement);

    TruncationReport {
        strategy: "b",
        turns_before,
        turns_after: history.len(),
        summarized: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::HeuristicTokenCounter;
    use ac_domain::Role;
    use async_trait::async_trait;

    struct StubSummarizer(&'static str);

    #[async_trait]
    impl Summarizer for StubSummarizer {
        async fn summarize(&self, _prompt: String) -> Result<String, String> {
            Ok(self.0.to_string())
        }
    }

    struct FailingSummarizer;

    #[async_trait]
    impl Summarizer for FailingSummarizer {
        async fn summarize(&self, _prompt: String) -> Result<String, String> {
            Err("upstream timeout".into())
        }
    }

    fn big_history(n: usize) -> MessageHistory {
        let mut history = MessageHistory::new();
        for i in 0..n {
            history.push(Turn::user_text(format!("message {i}"))).unwrap();
            history
                .push(Turn::new(Role::Assistant, vec![ac_domain::Message::Thinking {
                    text: "reasoning".into(),
                }, ac_domain::Message::TextResult {
                    text: format!("reply {i}"),
                }]))
                .unwrap();
        }
        history
    }

    #[tokio::test]
    async fn under_budget_is_a_no_op() {
        let mut history = big_history(2);
        let cfg = ContextConfig::default();
        let report = truncate_if_needed(&mut history, &cfg, &HeuristicTokenCounter, &StubSummarizer("x")).await;
        assert_eq!(report.strategy, "none");
    }

    #[tokio::test]
    async fn over_max_size_with_thinking_blocks_uses_strategy_a() {
        let mut history = big_history(20);
        let cfg = ContextConfig {
            max_size: 4,
            ..ContextConfig::default()
        };
        let report = truncate_if_needed(&mut history, &cfg, &HeuristicTokenCounter, &StubSummarizer("summary text")).await;
        assert_eq!(report.strategy, "a");
        assert!(report.turns_after < report.turns_before);
        assert!(history.validate().is_ok());
    }

    #[tokio::test]
    async fn truncation_preserves_invariants() {
        let mut history = big_history(30);
        let cfg = ContextConfig {
            max_size: 6,
            ..ContextConfig::default()
        };
        truncate_if_needed(&mut history, &cfg, &HeuristicTokenCounter, &StubSummarizer("summary")).await;
        assert!(history.validate().is_ok());
    }

    #[tokio::test]
    async fn summarizer_failure_falls_back_to_failed_summary_text() {
        let mut history = big_history(20);
        let cfg = ContextConfig {
            max_size: 4,
            ..ContextConfig::default()
        };
        let report = truncate_if_needed(&mut history, &cfg, &HeuristicTokenCounter, &FailingSummarizer).await;
        assert!(report.summarized);
        let summary_turn = history
            .turns()
            .iter()
            .find(|t| t.messages.iter().any(|m| m.flat_text().contains("Failed to summarize")));
        assert!(summary_turn.is_some());
    }
}
