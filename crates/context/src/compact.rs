use crate::summarize::{build_summarization_prompt, failed_summary_text, Summarizer};
use ac_domain::{Error, MessageHistory, Turn};

const COMPACT_PREFIX: &str =
    "This session is being continued from a previous conversation...\n\n";

/// `/compact`: summarize the entire history into one final summary, clear
/// it, and seed a new user turn with the spec's fixed preamble followed by
/// the seven-section body. Fails cleanly on empty history.
pub async fn compact(history: &mut MessageHistory, max_event_length: usize, summarizer: &dyn Summarizer) -> Result<(), Error> {
    if history.is_empty() {
        return Err(Error::Validation("cannot /compact an empty history".into()));
    }

    let turns: Vec<Turn> = history.turns().to_vec();
    let prompt = build_summarization_prompt(&turns, None, max_event_length);
    let summary = match summarizer.summarize(prompt).await {
        Ok(text) => text,
        Err(e) => failed_summary_text(turns.len(), &e),
    };

    history.clear();
    history
        .push(Turn::user_text(format!("{COMPACT_PREFIX}{summary}")))
        .expect("a freshly cleared history accepts any non-empty turn");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct StubSummarizer;

    #[async_trait]
    impl Summarizer for StubSummarizer {
        async fn summarize(&self, _prompt: String) -> Result<String, String> {
            Ok("Primary Request & Intent: ...".into())
        }
    }

    #[tokio::test]
    async fn compact_rejects_empty_history() {
        let mut history = MessageHistory::new();
        let err = compact(&mut history, 10_000, &StubSummarizer).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn compact_replaces_history_with_single_seeded_turn() {
        let mut history = MessageHistory::new();
        history.push(Turn::user_text("do a thing")).unwrap();
        history.push(Turn::assistant_text("done")).unwrap();
        compact(&mut history, 10_000, &StubSummarizer).await.unwrap();
        assert_eq!(history.len(), 1);
        let text = history.turns()[0].messages[0].flat_text();
        assert!(text.starts_with("This session is being continued"));
        assert!(text.contains("Primary Request & Intent"));
    }
}
