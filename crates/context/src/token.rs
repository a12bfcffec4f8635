use ac_domain::MessageHistory;

/// A deterministic, injectable function from history to a token count. The
/// Context Manager's truncation logic depends only on this trait, never on
/// a concrete tokenizer, so a provider-accurate implementation can be
/// substituted without touching §4.3's truncation decisions.
pub trait TokenCounter: Send + Sync {
    fn count(&self, history: &MessageHistory) -> usize;

    /// Count a single turn in isolation, used while deciding how wide a
    /// summarization range needs to be.
    fn count_turn(&self, turn: &ac_domain::Turn) -> usize {
        turn.messages.iter().map(|m| self.count_text(&m.flat_text())).sum()
    }

    fn count_text(&self, text: &str) -> usize;
}

/// Default counter: a byte-length heuristic (~4 characters per token, the
/// common rule of thumb for English prose and JSON). Pure function of the
/// serialized history; no network or model dependency.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicTokenCounter;

const CHARS_PER_TOKEN: usize = 4;

impl TokenCounter for HeuristicTokenCounter {
    fn count(&self, history: &MessageHistory) -> usize {
        history
            .turns()
            .iter()
            .map(|t| self.count_turn(t))
            .sum()
    }

    fn count_text(&self, text: &str) -> usize {
        text.len().div_ceil(CHARS_PER_TOKEN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ac_domain::Turn;

    #[test]
    fn empty_history_counts_zero() {
        let counter = HeuristicTokenCounter;
        assert_eq!(counter.count(&MessageHistory::new()), 0);
    }

    #[test]
    fn longer_text_counts_more_tokens() {
        let counter = HeuristicTokenCounter;
        let short = counter.count_text("hi");
        let long = counter.count_text(&"a".repeat(400));
        assert!(long > short);
        assert_eq!(long, 100);
    }

    #[test]
    fn counts_grow_with_more_turns() {
        let counter = HeuristicTokenCounter;
        let mut history = MessageHistory::new();
        history.push(Turn::user_text("hello")).unwrap();
        let one = counter.count(&history);
        history.push(Turn::assistant_text("a longer reply than the prompt")).unwrap();
        let two = counter.count(&history);
        assert!(two > one);
    }
}
