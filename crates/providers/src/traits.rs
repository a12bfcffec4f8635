//! The minimal interface the Context Manager (C6) and Agent Loop (C8) need
//! to drive an LLM: given a system prompt, a tool catalog, and the turn
//! history so far, produce (or stream) the next assistant turn.

use ac_domain::error::Result;
use ac_domain::message::Turn;
use ac_domain::stream::{BoxStream, StreamEvent, Usage};
use ac_domain::tool::ToolDefinition;

/// One call to a provider's chat/messages endpoint.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub system_prompt: Option<String>,
    pub history: Vec<Turn>,
    pub tools: Vec<ToolDefinition>,
    pub model: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// Forwarded to providers that support extended/interleaved thinking.
    pub thinking_budget_tokens: Option<u32>,
}

/// A completed (non-streaming) assistant turn.
#[derive(Debug, Clone)]
pub struct GenerateResponse {
    pub turn: Turn,
    pub usage: Option<Usage>,
    pub finish_reason: Option<String>,
}

/// A provider adapter: one implementation per wire format (Anthropic
/// Messages, OpenAI-compatible chat completions, Gemini generateContent).
///
/// Deliberately narrow — no embeddings, no capability negotiation. Anything
/// role-based (planner vs. executor model selection) is the registry's job,
/// not the adapter's.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate(&self, req: GenerateRequest) -> Result<GenerateResponse>;

    async fn generate_stream(
        &self,
        req: GenerateRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>>;

    fn provider_id(&self) -> &str;
}
