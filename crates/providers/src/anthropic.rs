//! Anthropic-native adapter.
//!
//! Implements the Anthropic Messages API including tool use, streaming, and
//! the Anthropic-specific message structure where the system prompt goes in
//! a separate top-level `system` field.

use crate::traits::{GenerateRequest, GenerateResponse, LlmProvider};
use crate::util::{from_reqwest, resolve_api_key};
use ac_domain::config::ModelConfig;
use ac_domain::error::{Error, Result};
use ac_domain::message::{Message, Role, Turn};
use ac_domain::stream::{BoxStream, StreamEvent, Usage};
use ac_domain::tool::ToolDefinition;
use serde_json::Value;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// An LLM provider adapter for the Anthropic Messages API.
pub struct AnthropicProvider {
    id: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
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
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
    }

    fn build_messages_body(&self, req: &GenerateRequest, stream: bool) -> Value {
        let api_messages: Vec<Value> = req.history.iter().map(turn_to_anthropic).collect();

        let mut body = serde_json::json!({
            "model": req.model,
            "messages": api_messages,
            "stream": stream,
        });

        if let Some(ref system) = req.system_prompt {
            body["system"] = Value::String(system.clone());
        }
        if !req.tools.is_empty() {
            let tools: Vec<Value> = req.tools.iter().map(tool_to_anthropic).collect();
            body["tools"] = Value::Array(tools);
        }
        if let Some(temp) = req.temperature {
            body["temperature"] = serde_json::json!(temp);
        }
        if let Some(budget) = req.thinking_budget_tokens {
            body["thinking"] = serde_json::json!({"type": "enabled", "budget_tokens": budget});
        }
        body["max_tokens"] = serde_json::json!(req.max_tokens.unwrap_or(4096));

        body
    }
}

// ── Outbound: Turn/Message -> Anthropic content blocks ──────────────

fn turn_to_anthropic(turn: &Turn) -> Value {
    let role = match turn.role {
        Role::User => "user",
        Role::Assistant => "assistant",
    };
    let content: Vec<Value> = turn.messages.iter().filter_map(message_to_anthropic_block).collect();
    serde_json::json!({ "role": role, "content": content })
}

fn message_to_anthropic_block(msg: &Message) -> Option<Value> {
    match msg {
        Message::TextPrompt { text } | Message::TextResult { text } => {
            Some(serde_json::json!({"type": "text", "text": text}))
        }
        Message::Thinking { text } => Some(serde_json::json!({"type": "thinking", "thinking": text})),
        Message::RedactedThinking { data } => {
            Some(serde_json::json!({"type": "redacted_thinking", "data": data}))
        }
        Message::ToolCall { id, name, input } => Some(serde_json::json!({
            "type": "tool_use",
            "id": id,
            "name": name,
            "input": input,
        })),
        Message::ToolResult { id, output, .. } => Some(serde_json::json!({
            "type": "tool_result",
            "tool_use_id": id,
            "content": output,
        })),
    }
}

fn tool_to_anthropic(tool: &ToolDefinition) -> Value {
    serde_json::json!({
        "name": tool.name,
        "description": tool.description,
        "input_schema": tool.input_schema,
    })
}

// ── Inbound: Anthropic content blocks -> Turn/Message ───────────────

fn parse_anthropic_response(body: &Value) -> Result<GenerateResponse> {
    let content_arr = body.get("content").and_then(|v| v.as_array()).cloned().unwrap_or_default();

    let mut messages = Vec::new();
    for block in &content_arr {
        if let Some(msg) = anthropic_block_to_message(block) {
            messages.push(msg);
        }
    }

    let finish_reason = body
        .get("stop_reason")
        .and_then(|v| v.as_str())
        .map(normalize_stop_reason);
    let usage = body.get("usage").and_then(parse_anthropic_usage);

    Ok(GenerateResponse {
        turn: Turn::new(Role::Assistant, messages),
        usage,
        finish_reason,
    })
}

fn anthropic_block_to_message(block: &Value) -> Option<Message> {
    let block_type = block.get("type").and_then(|v| v.as_str()).unwrap_or("");
    match block_type {
        "text" => Some(Message::TextResult {
            text: block.get("text").and_then(|v| v.as_str()).unwrap_or("").to_string(),
        }),
        "thinking" => Some(Message::Thinking {
            text: block.get("thinking").and_then(|v| v.as_str()).unwrap_or("").to_string(),
        }),
        "redacted_thinking" => Some(Message::RedactedThinking {
            data: block.get("data").and_then(|v| v.as_str()).unwrap_or("").to_string(),
        }),
        "tool_use" => Some(Message::ToolCall {
            id: block.get("id").and_then(|v| v.as_str()).unwrap_or("").to_string(),
            name: block.get("name").and_then(|v| v.as_str()).unwrap_or("").to_string(),
            input: block.get("input").cloned().unwrap_or(Value::Object(Default::default())),
        }),
        _ => None,
    }
}

fn normalize_stop_reason(s: &str) -> String {
    match s {
        "end_turn" => "stop".to_string(),
        "tool_use" => "tool_calls".to_string(),
        other => other.to_string(),
    }
}

fn parse_anthropic_usage(v: &Value) -> Option<Usage> {
    let input = v.get("input_tokens")?.as_u64()? as u32;
    let output = v.get("output_tokens")?.as_u64()? as u32;
    Some(Usage {
        prompt_tokens: input,
        completion_tokens: output,
        total_tokens: input + output,
    })
}

// ── Streaming ────────────────────────────────────────────────────────

/// Assembles tool-call deltas as streaming content blocks arrive. Thinking
/// blocks are not split into streaming events (the domain's `StreamEvent`
/// has no thinking variant); they only appear in the non-streaming
/// [`parse_anthropic_response`] path.
struct StreamState {
    active_tool_calls: std::collections::HashMap<u64, (String, String, String)>,
    usage: Option<Usage>,
    done_emitted: bool,
}

impl StreamState {
    fn new() -> Self {
        Self { active_tool_calls: std::collections::HashMap::new(), usage: None, done_emitted: false }
    }
}

fn parse_anthropic_sse(data: &str, state: &mut StreamState) -> Vec<Result<StreamEvent>> {
    let mut events = Vec::new();

    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            events.push(Err(Error::Json(e)));
            return events;
        }
    };

    let event_type = v.get("type").and_then(|v| v.as_str()).unwrap_or("");

    match event_type {
        "message_start" => {
            if let Some(msg) = v.get("message") {
                state.usage = msg.get("usage").and_then(parse_anthropic_usage);
            }
        }
        "content_block_start" => {
            let idx = v.get("index").and_then(|v| v.as_u64()).unwrap_or(0);
            if let Some(block) = v.get("content_block") {
                if block.get("type").and_then(|v| v.as_str()) == Some("tool_use") {
                    let call_id = block.get("id").and_then(|v| v.as_str()).unwrap_or("").to_string();
                    let name = block.get("name").and_then(|v| v.as_str()).unwrap_or("").to_string();
                    events.push(Ok(StreamEvent::ToolCallStarted { call_id: call_id.clone(), tool_name: name.clone() }));
                    state.active_tool_calls.insert(idx, (call_id, name, String::new()));
                }
            }
        }
        "content_block_delta" => {
            let idx = v.get("index").and_then(|v| v.as_u64()).unwrap_or(0);
            if let Some(delta) = v.get("delta") {
                match delta.get("type").and_then(|v| v.as_str()).unwrap_or("") {
                    "text_delta" => {
                        if let Some(text) = delta.get("text").and_then(|v| v.as_str()) {
                            if !text.is_empty() {
                                events.push(Ok(StreamEvent::Token { text: text.to_string() }));
                            }
                        }
                    }
                    "input_json_delta" => {
                        if let Some(partial) = delta.get("partial_json").and_then(|v| v.as_str()) {
                            if let Some(tc) = state.active_tool_calls.get_mut(&idx) {
                                tc.2.push_str(partial);
                                events.push(Ok(StreamEvent::ToolCallDelta { call_id: tc.0.clone(), delta: partial.to_string() }));
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        "content_block_stop" => {
            let idx = v.get("index").and_then(|v| v.as_u64()).unwrap_or(0);
            if let Some((call_id, tool_name, args_str)) = state.active_tool_calls.remove(&idx) {
                let arguments: Value = serde_json::from_str(&args_str).unwrap_or(Value::Object(Default::default()));
                events.push(Ok(StreamEvent::ToolCallFinished { call_id, tool_name, arguments }));
            }
        }
        "message_delta" => {
            if let Some(output) = v.get("usage").and_then(|u| u.get("output_tokens")).and_then(|v| v.as_u64()) {
                if let Some(ref mut u) = state.usage {
                    u.completion_tokens = output as u32;
                    u.total_tokens = u.prompt_tokens + u.completion_tokens;
                }
            }
            let stop_reason = v
                .get("delta")
                .and_then(|d| d.get("stop_reason"))
                .and_then(|v| v.as_str())
                .map(normalize_stop_reason);
            if stop_reason.is_some() {
                state.done_emitted = true;
                events.push(Ok(StreamEvent::Done { usage: state.usage.clone(), finish_reason: stop_reason }));
            }
        }
        "message_stop" => {
            if !state.done_emitted {
                state.done_emitted = true;
                events.push(Ok(StreamEvent::Done { usage: state.usage.clone(), finish_reason: Some("stop".into()) }));
            }
        }
        "error" => {
            let msg = v.get("error").and_then(|e| e.get("message")).and_then(|v| v.as_str()).unwrap_or("unknown error");
            events.push(Ok(StreamEvent::Error { message: msg.to_string() }));
        }
        _ => {}
    }

    events
}

#[async_trait::async_trait]
impl LlmProvider for AnthropicProvider {
    async fn generate(&self, req: GenerateRequest) -> Result<GenerateResponse> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.build_messages_body(&req, false);

        tracing::debug!(provider = %self.id, url = %url, "anthropic generate request");

        let resp = self.authed_post(&url).json(&body).send().await.map_err(from_reqwest)?;
        let status = resp.status();
        let resp_text = resp.text().await.map_err(from_reqwest)?;

        if !status.is_success() {
            return Err(Error::LlmTransient(format!("anthropic {} returned HTTP {}: {}", self.id, status.as_u16(), resp_text)));
        }

        let resp_json: Value = serde_json::from_str(&resp_text)?;
        parse_anthropic_response(&resp_json)
    }

    async fn generate_stream(&self, req: GenerateRequest) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.build_messages_body(&req, true);
        let provider_id = self.id.clone();

        tracing::debug!(provider = %self.id, url = %url, "anthropic stream request");

        let resp = self.authed_post(&url).json(&body).send().await.map_err(from_reqwest)?;
        let status = resp.status();
        if !status.is_success() {
            let err_text = resp.text().await.map_err(from_reqwest)?;
            return Err(Error::LlmTransient(format!("anthropic {} returned HTTP {}: {}", provider_id, status.as_u16(), err_text)));
        }

        let mut state = StreamState::new();
        Ok(crate::sse::sse_response_stream(resp, move |data| parse_anthropic_sse(data, &mut state)))
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_turn_with_tool_result_maps_to_tool_result_block() {
        let turn = Turn::tool_result("call-1", "exec", "output text");
        let value = turn_to_anthropic(&turn);
        assert_eq!(value["role"], "user");
        assert_eq!(value["content"][0]["type"], "tool_result");
        assert_eq!(value["content"][0]["tool_use_id"], "call-1");
    }

    #[test]
    fn assistant_turn_with_tool_call_maps_to_tool_use_block() {
        let turn = Turn::new(
            Role::Assistant,
            vec![Message::ToolCall { id: "c1".into(), name: "exec".into(), input: serde_json::json!({"cmd": "ls"}) }],
        );
        let value = turn_to_anthropic(&turn);
        assert_eq!(value["content"][0]["type"], "tool_use");
        assert_eq!(value["content"][0]["name"], "exec");
    }

    #[test]
    fn parse_response_collects_text_and_tool_use_blocks() {
        let body = serde_json::json!({
            "model": "claude-x",
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 10, "output_tokens": 5},
            "content": [
                {"type": "text", "text": "thinking out loud"},
                {"type": "tool_use", "id": "call-1", "name": "exec", "input": {"cmd": "ls"}}
            ]
        });
        let resp = parse_anthropic_response(&body).unwrap();
        assert_eq!(resp.turn.messages.len(), 2);
        assert!(!resp.turn.messages[0].is_tool_call());
        assert!(resp.turn.messages[1].is_tool_call());
        assert_eq!(resp.finish_reason.as_deref(), Some("tool_calls"));
        assert_eq!(resp.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn stop_reason_normalizes_end_turn_to_stop() {
        assert_eq!(normalize_stop_reason("end_turn"), "stop");
        assert_eq!(normalize_stop_reason("max_tokens"), "max_tokens");
    }

    #[test]
    fn streaming_text_delta_emits_token_event() {
        let mut state = StreamState::new();
        let events = parse_anthropic_sse(
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"hi"}}"#,
            &mut state,
        );
        assert_eq!(events.len(), 1);
        match events.into_iter().next().unwrap().unwrap() {
            StreamEvent::Token { text } => assert_eq!(text, "hi"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn streaming_tool_use_assembles_across_deltas() {
        let mut state = StreamState::new();
        parse_anthropic_sse(
            r#"{"type":"content_block_start","index":0,"content_block":{"type":"tool_use","id":"call-1","name":"exec"}}"#,
            &mut state,
        );
        parse_anthropic_sse(
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"input_json_delta","partial_json":"{\"cmd\""}}"#,
            &mut state,
        );
        parse_anthropic_sse(
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"input_json_delta","partial_json":":\"ls\"}"}}"#,
            &mut state,
        );
        let events = parse_anthropic_sse(r#"{"type":"content_block_stop","index":0}"#, &mut state);
        match events.into_iter().next().unwrap().unwrap() {
            StreamEvent::ToolCallFinished { call_id, tool_name, arguments } => {
                assert_eq!(call_id, "call-1");
                assert_eq!(tool_name, "exec");
                assert_eq!(arguments["cmd"], "ls");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
