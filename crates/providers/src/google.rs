//! Google Gemini adapter.
//!
//! Implements the Gemini `generateContent` and `streamGenerateContent` APIs.
//! Auth is an API key passed as a query parameter (`key={api_key}`).

use crate::traits::{GenerateRequest, GenerateResponse, LlmProvider};
use crate::util::{from_reqwest, resolve_api_key};
use ac_domain::config::ModelConfig;
use ac_domain::error::{Error, Result};
use ac_domain::message::{Message, Role, Turn};
use ac_domain::stream::{BoxStream, StreamEvent, Usage};
use ac_domain::tool::ToolDefinition;
use serde_json::Value;

/// An LLM provider adapter for the Google Gemini API.
pub struct GoogleProvider {
    id: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GoogleProvider {
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

    fn generate_url(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent?key={}", self.base_url, model, self.api_key)
    }

    fn stream_url(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:streamGenerateContent?alt=sse&key={}", self.base_url, model, self.api_key)
    }

    fn build_body(&self, req: &GenerateRequest) -> Value {
        let contents: Vec<Value> = req.history.iter().map(turn_to_gemini).collect();
        let mut body = serde_json::json!({ "contents": contents });

        if let Some(ref system) = req.system_prompt {
            body["systemInstruction"] = serde_json::json!({"parts": [{"text": system}]});
        }
        if !req.tools.is_empty() {
            let function_declarations: Vec<Value> = req.tools.iter().map(tool_to_gemini).collect();
            body["tools"] = serde_json::json!([{ "functionDeclarations": function_declarations }]);
        }

        let mut gen_config = serde_json::json!({});
        if let Some(temp) = req.temperature {
            gen_config["temperature"] = serde_json::json!(temp);
        }
        if let Some(max) = req.max_tokens {
            gen_config["maxOutputTokens"] = serde_json::json!(max);
        }
        if gen_config.as_object().is_some_and(|o| !o.is_empty()) {
            body["generationConfig"] = gen_config;
        }

        body
    }
}

/// Redact the API key from a URL for safe logging.
fn redact_url_key(url: &str) -> String {
    if let Some(idx) = url.find("key=") {
        let prefix = &url[..idx + 4];
        let rest = &url[idx + 4..];
        let end = rest.find('&').unwrap_or(rest.len());
        format!("{prefix}[REDACTED]{}", &rest[end..])
    } else {
        url.to_string()
    }
}

// ── Outbound: Turn/Message -> Gemini contents ───────────────────────
//
// Gemini has no tool-call id on the wire; a `functionCall`/`functionResponse`
// pair is matched by function name. We carry the tool name through as the
// domain `ToolCall`/`ToolResult` id, which holds since the agent loop allows
// at most one pending tool call per turn.

fn turn_to_gemini(turn: &Turn) -> Value {
    let role = match turn.role {
        Role::User => "user",
        Role::Assistant => "model",
    };
    let parts: Vec<Value> = turn.messages.iter().filter_map(message_to_gemini_part).collect();
    serde_json::json!({ "role": role, "parts": parts })
}

fn message_to_gemini_part(msg: &Message) -> Option<Value> {
    match msg {
        Message::TextPrompt { text } | Message::TextResult { text } => Some(serde_json::json!({"text": text})),
        Message::Thinking { .. } | Message::RedactedThinking { .. } => None,
        Message::ToolCall { name, input, .. } => Some(serde_json::json!({
            "functionCall": {"name": name, "args": input},
        })),
        Message::ToolResult { name, output, .. } => Some(serde_json::json!({
            "functionResponse": {"name": name, "response": {"content": output}},
        })),
    }
}

fn tool_to_gemini(tool: &ToolDefinition) -> Value {
    serde_json::json!({
        "name": tool.name,
        "description": tool.description,
        "parameters": tool.input_schema,
    })
}

// ── Inbound: Gemini response -> Turn/Message ────────────────────────

fn normalize_finish_reason(s: &str) -> String {
    match s {
        "STOP" => "stop".to_string(),
        "MAX_TOKENS" => "length".to_string(),
        other => other.to_lowercase(),
    }
}

fn parse_gemini_response(body: &Value) -> Result<GenerateResponse> {
    let candidate = body
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first())
        .ok_or_else(|| Error::LlmFatal("gemini response had no candidates".into()))?;

    let mut messages = Vec::new();
    if let Some(parts) = candidate.get("content").and_then(|c| c.get("parts")).and_then(|p| p.as_array()) {
        for part in parts {
            if let Some(text) = part.get("text").and_then(|v| v.as_str()) {
                if !text.is_empty() {
                    messages.push(Message::TextResult { text: text.to_string() });
                }
            }
            if let Some(fc) = part.get("functionCall") {
                let name = fc.get("name").and_then(|v| v.as_str()).unwrap_or("").to_string();
                let input = fc.get("args").cloned().unwrap_or(Value::Object(Default::default()));
                messages.push(Message::ToolCall { id: name.clone(), name, input });
            }
        }
    }

    let finish_reason = candidate.get("finishReason").and_then(|v| v.as_str()).map(normalize_finish_reason);
    let usage = body.get("usageMetadata").and_then(parse_gemini_usage);

    Ok(GenerateResponse { turn: Turn::new(Role::Assistant, messages), usage, finish_reason })
}

fn parse_gemini_usage(v: &Value) -> Option<Usage> {
    let prompt = v.get("promptTokenCount")?.as_u64()? as u32;
    let completion = v.get("candidatesTokenCount").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
    let total = v.get("totalTokenCount").and_then(|v| v.as_u64()).unwrap_or((prompt + completion) as u64) as u32;
    Some(Usage { prompt_tokens: prompt, completion_tokens: completion, total_tokens: total })
}

// ── Streaming ────────────────────────────────────────────────────────

fn parse_gemini_sse_data(data: &str) -> Vec<Result<StreamEvent>> {
    let mut events = Vec::new();

    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            events.push(Err(Error::Json(e)));
            return events;
        }
    };

    let candidate = match v.get("candidates").and_then(|c| c.as_array()).and_then(|a| a.first()) {
        Some(c) => c,
        None => return events,
    };

    if let Some(parts) = candidate.get("content").and_then(|c| c.get("parts")).and_then(|p| p.as_array()) {
        for part in parts {
            if let Some(text) = part.get("text").and_then(|v| v.as_str()) {
                if !text.is_empty() {
                    events.push(Ok(StreamEvent::Token { text: text.to_string() }));
                }
            }
            if let Some(fc) = part.get("functionCall") {
                let name = fc.get("name").and_then(|v| v.as_str()).unwrap_or("").to_string();
                let arguments = fc.get("args").cloned().unwrap_or(Value::Object(Default::default()));
                events.push(Ok(StreamEvent::ToolCallStarted { call_id: name.clone(), tool_name: name.clone() }));
                events.push(Ok(StreamEvent::ToolCallFinished { call_id: name.clone(), tool_name: name, arguments }));
            }
        }
    }

    if let Some(fr) = candidate.get("finishReason").and_then(|v| v.as_str()) {
        let usage = v.get("usageMetadata").and_then(parse_gemini_usage);
        events.push(Ok(StreamEvent::Done { usage, finish_reason: Some(normalize_finish_reason(fr)) }));
    }

    events
}

#[async_trait::async_trait]
impl LlmProvider for GoogleProvider {
    async fn generate(&self, req: GenerateRequest) -> Result<GenerateResponse> {
        let url = self.generate_url(&req.model);
        let body = self.build_body(&req);

        tracing::debug!(provider = %self.id, url = %redact_url_key(&url), "google generate request");

        let resp = self.client.post(&url).header("Content-Type", "application/json").json(&body).send().await.map_err(from_reqwest)?;
        let status = resp.status();
        let resp_text = resp.text().await.map_err(from_reqwest)?;

        if !status.is_success() {
            return Err(Error::LlmTransient(format!("google {} returned HTTP {}: {}", self.id, status.as_u16(), resp_text)));
        }

        let resp_json: Value = serde_json::from_str(&resp_text)?;
        parse_gemini_response(&resp_json)
    }

    async fn generate_stream(&self, req: GenerateRequest) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let url = self.stream_url(&req.model);
        let body = self.build_body(&req);
        let provider_id = self.id.clone();

        tracing::debug!(provider = %self.id, url = %redact_url_key(&url), "google stream request");

        let resp = self.client.post(&url).header("Content-Type", "application/json").json(&body).send().await.map_err(from_reqwest)?;
        let status = resp.status();
        if !status.is_success() {
            let err_text = resp.text().await.map_err(from_reqwest)?;
            return Err(Error::LlmTransient(format!("google {} returned HTTP {}: {}", provider_id, status.as_u16(), err_text)));
        }

        Ok(crate::sse::sse_response_stream(resp, |data| parse_gemini_sse_data(data)))
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_api_key_from_url() {
        let url = "https://example.com/v1beta/models/x:generateContent?key=secret123&alt=sse";
        assert_eq!(redact_url_key(url), "https://example.com/v1beta/models/x:generateContent?key=[REDACTED]&alt=sse");
    }

    #[test]
    fn assistant_turn_tool_call_maps_to_function_call_part() {
        let turn = Turn::new(Role::Assistant, vec![Message::ToolCall { id: "exec".into(), name: "exec".into(), input: serde_json::json!({"cmd": "ls"}) }]);
        let value = turn_to_gemini(&turn);
        assert_eq!(value["role"], "model");
        assert_eq!(value["parts"][0]["functionCall"]["name"], "exec");
    }

    #[test]
    fn parse_response_extracts_text_and_function_call() {
        let body = serde_json::json!({
            "candidates": [{
                "finishReason": "STOP",
                "content": {"parts": [{"text": "done"}, {"functionCall": {"name": "exec", "args": {"cmd": "ls"}}}]}
            }],
            "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 5, "totalTokenCount": 15}
        });
        let resp = parse_gemini_response(&body).unwrap();
        assert_eq!(resp.turn.messages.len(), 2);
        assert_eq!(resp.finish_reason.as_deref(), Some("stop"));
        assert_eq!(resp.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn streaming_function_call_emits_started_then_finished() {
        let data = r#"{"candidates":[{"content":{"parts":[{"functionCall":{"name":"exec","args":{"cmd":"ls"}}}]}}]}"#;
        let events = parse_gemini_sse_data(data);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0].as_ref().unwrap(), StreamEvent::ToolCallStarted { .. }));
        assert!(matches!(events[1].as_ref().unwrap(), StreamEvent::ToolCallFinished { .. }));
    }
}
