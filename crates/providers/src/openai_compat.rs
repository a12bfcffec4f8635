//! OpenAI-compatible adapter.
//!
//! Works with OpenAI, Ollama, vLLM, LM Studio, Together, and any other
//! endpoint that follows the OpenAI chat completions contract.

use crate::traits::{GenerateRequest, GenerateResponse, LlmProvider};
use crate::util::{from_reqwest, resolve_api_key};
use ac_domain::config::ModelConfig;
use ac_domain::error::{Error, Result};
use ac_domain::message::{Message, Role, Turn};
use ac_domain::stream::{BoxStream, StreamEvent, Usage};
use ac_domain::tool::ToolDefinition;
use serde_json::Value;

/// An LLM provider adapter for any OpenAI-compatible chat completions API.
pub struct OpenAiCompatProvider {
    id: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    pub fn from_config(cfg: &ModelConfig) -> Result<Self> {
        let api_key = resolve_api_key(cfg)?;
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            id: cfg.id.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    fn authed_post(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
    }

    fn build_chat_body(&self, req: &GenerateRequest, stream: bool) -> Value {
        let mut messages: Vec<Value> = Vec::new();
        if let Some(ref system) = req.system_prompt {
            messages.push(serde_json::json!({"role": "system", "content": system}));
        }
        for turn in &req.history {
            messages.extend(turn_to_openai(turn));
        }

        let mut body = serde_json::json!({
            "model": req.model,
            "messages": messages,
            "stream": stream,
        });

        if !req.tools.is_empty() {
            let tools: Vec<Value> = req.tools.iter().map(tool_to_openai).collect();
            body["tools"] = Value::Array(tools);
        }
        if let Some(temp) = req.temperature {
            body["temperature"] = serde_json::json!(temp);
        }
        if let Some(max) = req.max_tokens {
            body["max_tokens"] = serde_json::json!(max);
        }
        if stream {
            body["stream_options"] = serde_json::json!({"include_usage": true});
        }
        body
    }
}

// ── Outbound: Turn/Message -> OpenAI chat messages ──────────────────
//
// A Turn can expand into more than one wire message: an assistant turn's
// text and tool calls collapse into one `assistant` message, but each
// `ToolResult` becomes its own `role: tool` message (OpenAI has no way to
// carry multiple tool results in a single message the way Anthropic does).

fn turn_to_openai(turn: &Turn) -> Vec<Value> {
    match turn.role {
        Role::User => turn.messages.iter().map(user_message_to_openai).collect(),
        Role::Assistant => vec![assistant_turn_to_openai(turn)],
    }
}

fn user_message_to_openai(msg: &Message) -> Value {
    match msg {
        Message::ToolResult { id, output, .. } => serde_json::json!({
            "role": "tool",
            "tool_call_id": id,
            "content": output,
        }),
        other => serde_json::json!({"role": "user", "content": other.flat_text()}),
    }
}

fn assistant_turn_to_openai(turn: &Turn) -> Value {
    let mut text_parts = Vec::new();
    let mut tool_calls = Vec::new();
    for msg in &turn.messages {
        match msg {
            Message::TextResult { text } => text_parts.push(text.clone()),
            Message::ToolCall { id, name, input } => tool_calls.push(serde_json::json!({
                "id": id,
                "type": "function",
                "function": {"name": name, "arguments": input.to_string()},
            })),
            // Reasoning content has no standard slot in the OpenAI wire
            // format; it is simply not replayed on the next turn.
            Message::Thinking { .. } | Message::RedactedThinking { .. } => {}
            _ => {}
        }
    }

    let mut obj = serde_json::json!({"role": "assistant"});
    obj["content"] = if text_parts.is_empty() { Value::Null } else { Value::String(text_parts.join("\n")) };
    if !tool_calls.is_empty() {
        obj["tool_calls"] = Value::Array(tool_calls);
    }
    obj
}

fn tool_to_openai(tool: &ToolDefinition) -> Value {
    serde_json::json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.input_schema,
        }
    })
}

// ── Inbound: OpenAI response -> Turn/Message ────────────────────────

fn parse_chat_response(body: &Value) -> Result<GenerateResponse> {
    let choice = body
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first())
        .ok_or_else(|| Error::LlmFatal("openai_compat response had no choices".into()))?;

    let message = choice
        .get("message")
        .ok_or_else(|| Error::LlmFatal("openai_compat choice had no message".into()))?;

    let mut messages = Vec::new();
    if let Some(text) = message.get("content").and_then(|v| v.as_str()) {
        if !text.is_empty() {
            messages.push(Message::TextResult { text: text.to_string() });
        }
    }
    messages.extend(parse_openai_tool_calls(message));

    let finish_reason = choice.get("finish_reason").and_then(|v| v.as_str()).map(String::from);
    let usage = body.get("usage").and_then(parse_openai_usage);

    Ok(GenerateResponse { turn: Turn::new(Role::Assistant, messages), usage, finish_reason })
}

fn parse_openai_tool_calls(message: &Value) -> Vec<Message> {
    let arr = match message.get("tool_calls").and_then(|v| v.as_array()) {
        Some(a) => a,
        None => return Vec::new(),
    };
    arr.iter()
        .filter_map(|tc| {
            let id = tc.get("id")?.as_str()?.to_string();
            let func = tc.get("function")?;
            let name = func.get("name")?.as_str()?.to_string();
            let args_str = func.get("arguments")?.as_str().unwrap_or("{}");
            let input: Value = serde_json::from_str(args_str).unwrap_or(Value::Object(Default::default()));
            Some(Message::ToolCall { id, name, input })
        })
        .collect()
}

fn parse_openai_usage(v: &Value) -> Option<Usage> {
    Some(Usage {
        prompt_tokens: v.get("prompt_tokens")?.as_u64()? as u32,
        completion_tokens: v.get("completion_tokens")?.as_u64()? as u32,
        total_tokens: v.get("total_tokens")?.as_u64()? as u32,
    })
}

// ── Streaming ────────────────────────────────────────────────────────

fn parse_sse_data_vec(data: &str) -> Vec<Result<StreamEvent>> {
    if data.trim() == "[DONE]" {
        return vec![Ok(StreamEvent::Done { usage: None, finish_reason: Some("stop".into()) })];
    }

    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => return vec![Err(Error::Json(e))],
    };

    let choice = v.get("choices").and_then(|c| c.as_array()).and_then(|a| a.first());
    let choice = match choice {
        Some(c) => c,
        None => {
            if let Some(usage) = v.get("usage").and_then(parse_openai_usage) {
                return vec![Ok(StreamEvent::Done { usage: Some(usage), finish_reason: None })];
            }
            return Vec::new();
        }
    };
    let delta = choice.get("delta").unwrap_or(&Value::Null);

    if let Some(fr) = choice.get("finish_reason").and_then(|f| f.as_str()) {
        let usage = v.get("usage").and_then(parse_openai_usage);
        return vec![Ok(StreamEvent::Done { usage, finish_reason: Some(fr.to_string()) })];
    }

    let mut events = Vec::new();
    if let Some(tc_arr) = delta.get("tool_calls").and_then(|v| v.as_array()) {
        for tc in tc_arr {
            if let Some(id) = tc.get("id").and_then(|v| v.as_str()) {
                let name = tc.get("function").and_then(|f| f.get("name")).and_then(|v| v.as_str()).unwrap_or("");
                events.push(Ok(StreamEvent::ToolCallStarted { call_id: id.to_string(), tool_name: name.to_string() }));
            }
            if let Some(args) = tc.get("function").and_then(|f| f.get("arguments")).and_then(|v| v.as_str()) {
                let idx = tc.get("index").and_then(|v| v.as_u64()).unwrap_or(0).to_string();
                events.push(Ok(StreamEvent::ToolCallDelta { call_id: idx, delta: args.to_string() }));
            }
        }
    }
    if let Some(text) = delta.get("content").and_then(|v| v.as_str()) {
        if !text.is_empty() {
            events.push(Ok(StreamEvent::Token { text: text.to_string() }));
        }
    }
    events
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiCompatProvider {
    async fn generate(&self, req: GenerateRequest) -> Result<GenerateResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_chat_body(&req, false);

        tracing::debug!(provider = %self.id, url = %url, "openai_compat generate request");

        let resp = self.authed_post(&url).json(&body).send().await.map_err(from_reqwest)?;
        let status = resp.status();
        let resp_text = resp.text().await.map_err(from_reqwest)?;

        if !status.is_success() {
            return Err(Error::LlmTransient(format!("openai_compat {} returned HTTP {}: {}", self.id, status.as_u16(), resp_text)));
        }

        let resp_json: Value = serde_json::from_str(&resp_text)?;
        parse_chat_response(&resp_json)
    }

    async fn generate_stream(&self, req: GenerateRequest) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_chat_body(&req, true);
        let provider_id = self.id.clone();

        tracing::debug!(provider = %self.id, url = %url, "openai_compat stream request");

        let resp = self.authed_post(&url).json(&body).send().await.map_err(from_reqwest)?;
        let status = resp.status();
        if !status.is_success() {
            let err_text = resp.text().await.map_err(from_reqwest)?;
            return Err(Error::LlmTransient(format!("openai_compat {} returned HTTP {}: {}", provider_id, status.as_u16(), err_text)));
        }

        Ok(crate::sse::sse_response_stream(resp, parse_sse_data_vec))
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assistant_turn_collapses_text_and_tool_calls_into_one_message() {
        let turn = Turn::new(
            Role::Assistant,
            vec![
                Message::TextResult { text: "ok".into() },
                Message::ToolCall { id: "c1".into(), name: "exec".into(), input: serde_json::json!({}) },
            ],
        );
        let msgs = turn_to_openai(&turn);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0]["content"], "ok");
        assert_eq!(msgs[0]["tool_calls"][0]["function"]["name"], "exec");
    }

    #[test]
    fn tool_result_becomes_its_own_tool_role_message() {
        let turn = Turn::tool_result("c1", "exec", "output");
        let msgs = turn_to_openai(&turn);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0]["role"], "tool");
        assert_eq!(msgs[0]["tool_call_id"], "c1");
    }

    #[test]
    fn parse_response_extracts_text_and_tool_calls() {
        let body = serde_json::json!({
            "choices": [{
                "finish_reason": "tool_calls",
                "message": {
                    "content": "let me check",
                    "tool_calls": [{"id": "c1", "type": "function", "function": {"name": "exec", "arguments": "{\"cmd\":\"ls\"}"}}]
                }
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        });
        let resp = parse_chat_response(&body).unwrap();
        assert_eq!(resp.turn.messages.len(), 2);
        assert_eq!(resp.finish_reason.as_deref(), Some("tool_calls"));
    }

    #[test]
    fn sse_done_sentinel_emits_done_event() {
        let events = parse_sse_data_vec("[DONE]");
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0].as_ref().unwrap(), StreamEvent::Done { .. }));
    }

    #[test]
    fn sse_content_delta_emits_token_event() {
        let events = parse_sse_data_vec(r#"{"choices":[{"delta":{"content":"hi"}}]}"#);
        assert_eq!(events.len(), 1);
        match events[0].as_ref().unwrap() {
            StreamEvent::Token { text } => assert_eq!(text, "hi"),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
