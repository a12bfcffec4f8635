//! Agent Loop (C8): the bounded turn loop described in §4.2, plus the
//! `/compact` slash-command (C6).

use std::sync::atomic::Ordering;
use std::sync::Arc;

use ac_context::{HeuristicTokenCounter, Summarizer};
use ac_domain::error::{Error, Result};
use ac_domain::event::EventKind;
use ac_domain::message::{Message, Turn};
use ac_domain::tool::is_termination_tool;
use ac_providers::traits::{GenerateRequest, LlmProvider};
use async_trait::async_trait;

use crate::session::manager::SessionRuntime;

const MAIN_SYSTEM_PROMPT: &str =
    "You are an autonomous coding agent with shell and file-edit tools. \
     Work the task to completion, then call return_control_to_user with your final answer.";

/// Adapts a registered [`LlmProvider`] + model id to [`ac_context`]'s
/// `Summarizer` trait, so truncation and `/compact` can drive the same LLM
/// call the agent loop uses rather than a separate client.
struct LlmSummarizer {
    provider: Arc<dyn LlmProvider>,
    model: String,
    max_tokens: u32,
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, prompt: String) -> std::result::Result<String, String> {
        let req = GenerateRequest {
            system_prompt: None,
            history: vec![Turn::user_text(prompt)],
            tools: vec![],
            model: self.model.clone(),
            max_tokens: Some(self.max_tokens),
            temperature: None,
            thinking_budget_tokens: None,
        };
        let resp = self.provider.generate(req).await.map_err(|e| e.to_string())?;
        Ok(resp
            .turn
            .messages
            .iter()
            .find_map(|m| match m {
                Message::TextResult { text } => Some(text.clone()),
                _ => None,
            })
            .unwrap_or_default())
    }
}

fn summarizer_for(runtime: &SessionRuntime, provider: Arc<dyn LlmProvider>) -> LlmSummarizer {
    let model = runtime
        .config
        .llm
        .summarization_model
        .clone()
        .or_else(|| runtime.model_name())
        .unwrap_or_default();
    LlmSummarizer {
        provider,
        model,
        max_tokens: runtime.config.context.max_output_tokens_per_turn,
    }
}

/// Run one `query`/`edit_query` to completion. `resume` skips re-appending
/// the user turn (the history already ends with it, e.g. after `edit_query`
/// rewound and is replaying). Returns the final answer text.
pub async fn run_turn(runtime: Arc<SessionRuntime>, text: String, resume: bool, _files: Vec<String>) -> Result<String> {
    runtime.running.store(true, Ordering::SeqCst);
    runtime.cancelled.store(false, Ordering::SeqCst);
    let outcome = run_turn_inner(&runtime, text, resume).await;
    runtime.running.store(false, Ordering::SeqCst);
    runtime.turn_done.notify_waiters();
    outcome
}

async fn run_turn_inner(runtime: &Arc<SessionRuntime>, text: String, resume: bool) -> Result<String> {
    runtime.apply_first_message_naming(&text);

    let provider = runtime.llm_provider()?;
    let model = runtime.model_name().unwrap_or_default();
    let summarizer = summarizer_for(runtime, provider.clone());
    let counter = HeuristicTokenCounter;

    if !resume {
        runtime.record_user_message(&text).await;
        let mut history = runtime.history.lock();
        history.push(Turn::user_text(text)).map_err(|e| Error::InvariantViolation(e.to_string()))?;
    }
    runtime.emit(EventKind::Processing).await;

    let max_turns = runtime.config.context.max_turns;
    let tools: Vec<_> = runtime.tools.definitions().cloned().collect();

    for turn_index in 0..max_turns {
        if runtime.cancelled.load(Ordering::SeqCst) {
            interrupt_pending_call(runtime).await;
            return Ok("cancelled".to_string());
        }

        {
            let mut snapshot = runtime.history.lock().clone();
            let report = ac_context::truncate_if_needed(&mut snapshot, &runtime.config.context, &counter, &summarizer).await;
            *runtime.history.lock() = snapshot;
            if report.summarized {
                runtime.emit(EventKind::System { message: format!("context truncated via strategy {}", report.strategy) }).await;
            }
        }

        let snapshot = runtime.history.lock().turns().to_vec();
        let request = GenerateRequest {
            system_prompt: Some(MAIN_SYSTEM_PROMPT.to_string()),
            history: snapshot,
            tools: tools.clone(),
            model: model.clone(),
            max_tokens: Some(runtime.config.context.max_output_tokens_per_turn),
            temperature: None,
            thinking_budget_tokens: None,
        };

        let response = match call_with_retry(provider.as_ref(), request, runtime).await {
            Ok(resp) => resp,
            Err(e) => {
                runtime.emit(EventKind::Error { message: e.to_string(), kind: e.kind().to_string() }).await;
                return Err(e);
            }
        };

        let mut assistant_turn = response.turn;
        if assistant_turn.messages.is_empty() {
            assistant_turn = Turn::assistant_text("No response from model");
        }
        for msg in &assistant_turn.messages {
            match msg {
                Message::TextResult { text } => runtime.emit(EventKind::AssistantText { text: text.clone() }).await,
                Message::Thinking { text } => runtime.emit(EventKind::Thinking { text: text.clone() }).await,
                _ => {}
            }
        }

        let pending: Vec<(String, String, serde_json::Value)> = assistant_turn
            .pending_tool_calls()
            .into_iter()
            .filter_map(|m| match m {
                Message::ToolCall { id, name, input } => Some((id.clone(), name.clone(), input.clone())),
                _ => None,
            })
            .collect();

        runtime
            .history
            .lock()
            .push(assistant_turn)
            .map_err(|e| Error::InvariantViolation(e.to_string()))?;
        runtime.persist_history().await;

        if pending.len() > 1 {
            return Err(Error::InvariantViolation(format!(
                "model emitted {} tool calls in one turn; at most one is allowed",
                pending.len()
            )));
        }

        let Some((call_id, tool_name, input)) = pending.into_iter().next() else {
            if let Some(text) = last_text(runtime).await {
                runtime.emit(EventKind::AgentResponse { text: text.clone() }).await;
                runtime.emit(EventKind::StreamComplete).await;
                return Ok(text);
            }
            runtime.emit(EventKind::StreamComplete).await;
            return Ok(String::new());
        };

        runtime.emit(EventKind::ToolCall { id: call_id.clone(), name: tool_name.clone(), input: input.clone() }).await;

        if runtime.cancelled.load(Ordering::SeqCst) {
            let mut history = runtime.history.lock();
            history
                .push(Turn::tool_result(call_id.clone(), tool_name.clone(), "interrupted"))
                .map_err(|e| Error::InvariantViolation(e.to_string()))?;
            return Ok("cancelled".to_string());
        }

        let output = match runtime.dispatcher.dispatch(&tool_name, &input).await {
            Ok(output) => output,
            Err(e) => format!("tool error: {e}"),
        };

        runtime.emit(EventKind::ToolResult { id: call_id.clone(), name: tool_name.clone(), output: output.clone() }).await;
        runtime
            .history
            .lock()
            .push(Turn::tool_result(call_id.clone(), tool_name.clone(), output.clone()))
            .map_err(|e| Error::InvariantViolation(e.to_string()))?;
        runtime.persist_history().await;

        if is_termination_tool(&tool_name) {
            runtime.emit(EventKind::AgentResponse { text: output.clone() }).await;
            runtime.emit(EventKind::StreamComplete).await;
            return Ok(output);
        }

        let _ = turn_index;
    }

    let message = "max turns reached".to_string();
    runtime.emit(EventKind::Error { message: message.clone(), kind: "invariant_violation".into() }).await;
    Err(Error::InvariantViolation(message))
}

async fn last_text(runtime: &SessionRuntime) -> Option<String> {
    let history = runtime.history.lock();
    history.turns().last().and_then(|t| {
        t.messages.iter().rev().find_map(|m| match m {
            Message::TextResult { text } => Some(text.clone()),
            _ => None,
        })
    })
}

async fn interrupt_pending_call(runtime: &Arc<SessionRuntime>) {
    let pending = {
        let history = runtime.history.lock();
        history.pending_tool_call().and_then(|m| match m {
            Message::ToolCall { id, name, .. } => Some((id.clone(), name.clone())),
            _ => None,
        })
    };
    if let Some((id, name)) = pending {
        let mut history = runtime.history.lock();
        let _ = history.push(Turn::tool_result(id, name, "interrupted"));
    }
}

/// Retry transient LLM failures locally, jittered exponential backoff, up to
/// `max_retries` before surfacing `llm_fatal` — the same retry shape the
/// provider registry's own HTTP clients use (§4.2).
async fn call_with_retry(
    provider: &dyn LlmProvider,
    request: GenerateRequest,
    runtime: &Arc<SessionRuntime>,
) -> Result<ac_providers::traits::GenerateResponse> {
    let max_retries = runtime.config.llm.max_retries;
    let mut attempt: u32 = 0;
    loop {
        match provider.generate(request.clone()).await {
            Ok(resp) => return Ok(resp),
            Err(Error::LlmTransient(msg)) if attempt < max_retries => {
                attempt += 1;
                runtime.emit(EventKind::System { message: format!("llm retry {attempt}/{max_retries}: {msg}") }).await;
                let backoff_ms = 200u64.saturating_mul(1 << attempt.min(6)) + (attempt as u64 * 37) % 100;
                tokio::time::sleep(std::time::Duration::from_millis(backoff_ms)).await;
            }
            Err(Error::LlmTransient(msg)) => return Err(Error::LlmFatal(format!("exhausted {max_retries} retries: {msg}"))),
            Err(e) => return Err(e),
        }
    }
}

/// `/compact`: summarize the whole history into one synthetic turn.
pub async fn run_compact(runtime: Arc<SessionRuntime>) -> Result<()> {
    let provider = runtime.llm_provider()?;
    let summarizer = summarizer_for(&runtime, provider);
    let mut snapshot = runtime.history.lock().clone();
    let result = ac_context::compact(&mut snapshot, runtime.config.context.max_event_length, &summarizer).await;
    if result.is_ok() {
        *runtime.history.lock() = snapshot;
    }
    result
}
