pub mod compact;
pub mod strategy;
pub mod summarize;
pub mod token;

pub use compact::compact;
pub use strategy::{truncate_if_needed, TruncationReport};
pub use summarize::{Summarizer, SUMMARY_SECTIONS};
pub use token::{HeuristicTokenCounter, TokenCounter};
