use ac_domain::Turn;
use async_trait::async_trait;

/// The seven sections every summarization response must produce (§4.3).
/// Used both to build the prompt's instructions and, in `/compact`, as the
/// header the synthetic turn is seeded with.
pub const SUMMARY_SECTIONS: &[&str] = &[
    "Primary Request & Intent",
    "Key Technical Concepts",
    "Files & Code Sections",
    "Problem Solving",
    "Pending Tasks",
    "Current Work",
    "Optional Next Step",
];

/// Injected LLM call used to compress a run of turns into prose. Kept
/// separate from the provider client so the Context Manager can be tested
/// without a network dependency.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, prompt: String) -> Result<String, String>;
}

/// Render turns `[start, end)` plus an optional previous summary into the
/// fixed delimiter-block template described in §4.3, clipping each event to
/// `max_event_length` characters.
pub fn build_summarization_prompt(turns: &[Turn], previous_summary: Option<&str>, max_event_length: usize) -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "Summarize the conversation below into exactly these seven sections, in order:\n",
    );
    for section in SUMMARY_SECTIONS {
        prompt.push_str("- ");
        prompt.push_str(section);
        prompt.push('\n');
    }
    prompt.push('\n');

    if let Some(summary) = previous_summary {
        prompt.push_str("<PREVIOUS SUMMARY>\n");
        prompt.push_str(summary);
        prompt.push_str("\n</PREVIOUS SUMMARY>\n\n");
    }

    for (i, turn) in turns.iter().enumerate() {
        prompt.push_str(&format!("<EVENT id={i}>\n"));
        for msg in &turn.messages {
            prompt.push_str(&clip(&msg.flat_text(), max_event_length));
            prompt.push('\n');
        }
        prompt.push_str(&format!("</EVENT id={i}>\n"));
    }

    prompt
}

/// Clip `text` to `max_chars`, breaking on the nearest UTF-8 char boundary
/// at or before the limit, with the spec's exact truncation marker.
pub fn clip(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut boundary = text.len();
    for (count, (idx, _)) in text.char_indices().enumerate() {
        if count == max_chars {
            boundary = idx;
            break;
        }
    }
    format!("{}... [truncated]", &text[..boundary])
}

/// The spec's fallback text when the summarization LLM call itself fails:
/// truncation proceeds anyway to avoid runaway context growth.
pub fn failed_summary_text(events_lost: usize, error: &str) -> String {
    format!("Failed to summarize {events_lost} events due to error: {error}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_leaves_short_text_untouched() {
        assert_eq!(clip("hello", 100), "hello");
    }

    #[test]
    fn clip_truncates_long_text_with_marker() {
        let text = "a".repeat(50);
        let clipped = clip(&text, 10);
        assert!(clipped.starts_with(&"a".repeat(10)));
        assert!(clipped.ends_with("... [truncated]"));
    }

    #[test]
    fn prompt_contains_all_seven_sections() {
        let prompt = build_summarization_prompt(&[Turn::user_text("hi")], None, 1000);
        for section in SUMMARY_SECTIONS {
            assert!(prompt.contains(section), "missing section: {section}");
        }
    }

    #[test]
    fn prompt_wraps_events_in_delimiters() {
        let prompt = build_summarization_prompt(&[Turn::user_text("hi")], None, 1000);
        assert!(prompt.contains("<EVENT id=0>"));
        assert!(prompt.contains("</EVENT id=0>"));
    }

    #[test]
    fn prompt_includes_previous_summary_when_present() {
        let prompt = build_summarization_prompt(&[Turn::user_text("hi")], Some("earlier work"), 1000);
        assert!(prompt.contains("<PREVIOUS SUMMARY>"));
        assert!(prompt.contains("earlier work"));
    }

    #[test]
    fn failed_summary_text_matches_spec_format() {
        let text = failed_summary_text(3, "timeout");
        assert_eq!(text, "Failed to summarize 3 events due to error: timeout");
    }
}
