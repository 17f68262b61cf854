//! Anthropic provider (spec §4.5: "messages endpoint with system prompt
//! separated").
//!
//! Grounded on forge-agent's `api/anthropic.rs` request shape, translated to
//! the gateway's provider-neutral `ChatRequest`/`ChatResponse` types.

use super::classify_status;
use crate::config::LlmConfig;
use crate::error::{CoreResult, LlmError};
use crate::llm::{
    ChatRequest, ChatResponse, Message, Role, StopReason, StreamEvent, ToolCall, Usage,
};
use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::{json, Value};

const ANTHROPIC_VERSION: &str = "2023-06-01";

fn split_system(request: &ChatRequest) -> (Option<String>, Vec<&Message>) {
    let mut system = None;
    let mut rest = Vec::new();
    for m in &request.messages {
        if m.role == Role::System && system.is_none() {
            system = Some(m.content.clone());
        } else {
            rest.push(m);
        }
    }
    (system, rest)
}

fn build_body(request: &ChatRequest) -> Value {
    let (system, rest) = split_system(request);

    let messages: Vec<Value> = rest
        .iter()
        .map(|m| {
            let role = match m.role {
                Role::Assistant => "assistant",
                Role::Tool => "user",
                _ => "user",
            };
            if let Some(id) = &m.tool_call_id {
                json!({
                    "role": "user",
                    "content": [{ "type": "tool_result", "tool_use_id": id, "content": m.content }]
                })
            } else if !m.tool_calls.is_empty() {
                let blocks: Vec<Value> = m
                    .tool_calls
                    .iter()
                    .map(|c| json!({ "type": "tool_use", "id": c.id, "name": c.name, "input": c.arguments }))
                    .collect();
                json!({ "role": role, "content": blocks })
            } else {
                json!({ "role": role, "content": m.content })
            }
        })
        .collect();

    let mut body = json!({
        "model": request.model,
        "messages": messages,
        "max_tokens": request.max_output_tokens,
        "temperature": request.temperature,
        "stream": request.stream,
    });

    if let Some(system) = system {
        body["system"] = json!(system);
    }

    if !request.tools.is_empty() {
        body["tools"] = json!(request
            .tools
            .iter()
            .map(|t| json!({ "name": t.name, "description": t.description, "input_schema": t.parameters }))
            .collect::<Vec<_>>());
    }

    body
}

fn parse_response(body: &Value) -> CoreResult<ChatResponse> {
    let blocks = body["content"].as_array().cloned().unwrap_or_default();
    let mut text = String::new();
    let mut tool_calls = Vec::new();

    for block in &blocks {
        match block["type"].as_str() {
            Some("text") => text.push_str(block["text"].as_str().unwrap_or_default()),
            Some("tool_use") => {
                if let (Some(id), Some(name)) = (block["id"].as_str(), block["name"].as_str()) {
                    tool_calls.push(ToolCall {
                        id: id.to_string(),
                        name: name.to_string(),
                        arguments: block["input"].clone(),
                    });
                }
            }
            _ => {}
        }
    }

    let stop_reason = match body["stop_reason"].as_str() {
        Some("tool_use") => StopReason::ToolCalls,
        Some("max_tokens") => StopReason::MaxTokens,
        Some("end_turn") | Some("stop_sequence") => StopReason::EndTurn,
        _ => StopReason::Other,
    };

    let usage = Usage {
        prompt_tokens: body["usage"]["input_tokens"].as_u64().unwrap_or(0) as u32,
        completion_tokens: body["usage"]["output_tokens"].as_u64().unwrap_or(0) as u32,
    };

    Ok(ChatResponse {
        message: Message { role: Role::Assistant, content: text, tool_calls, tool_call_id: None },
        stop_reason,
        usage,
    })
}

pub(in crate::llm) async fn chat(
    client: &reqwest::Client,
    config: &LlmConfig,
    request: &ChatRequest,
) -> CoreResult<ChatResponse> {
    let url = format!("{}/v1/messages", config.endpoint.trim_end_matches('/'));
    let body = build_body(request);

    let resp = client
        .post(&url)
        .header("x-api-key", &config.api_key)
        .header("anthropic-version", ANTHROPIC_VERSION)
        .json(&body)
        .send()
        .await
        .map_err(LlmError::from)?;

    let status = resp.status();
    let text = resp.text().await.map_err(LlmError::from)?;
    if !status.is_success() {
        return Err(classify_status(status, &text).into());
    }

    let parsed: Value = serde_json::from_str(&text)
        .map_err(|e| LlmError::MalformedResponse(format!("invalid JSON: {e}")))?;
    parse_response(&parsed)
}

pub(in crate::llm) async fn chat_stream(
    client: &reqwest::Client,
    config: &LlmConfig,
    request: &ChatRequest,
) -> CoreResult<BoxStream<'static, CoreResult<StreamEvent>>> {
    let url = format!("{}/v1/messages", config.endpoint.trim_end_matches('/'));
    let mut body = build_body(request);
    body["stream"] = json!(true);

    let resp = client
        .post(&url)
        .header("x-api-key", &config.api_key)
        .header("anthropic-version", ANTHROPIC_VERSION)
        .json(&body)
        .send()
        .await
        .map_err(LlmError::from)?;

    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        return Err(classify_status(status, &text).into());
    }

    let byte_stream = resp.bytes_stream();
    let events = byte_stream.map(|chunk| -> CoreResult<Vec<StreamEvent>> {
        let bytes = chunk.map_err(LlmError::from)?;
        Ok(decode_sse_chunk(&bytes))
    });

    let flattened = events.flat_map(|r| match r {
        Ok(v) => futures::stream::iter(v.into_iter().map(Ok)).boxed(),
        Err(e) => futures::stream::iter(vec![Err(e)]).boxed(),
    });

    Ok(flattened.boxed())
}

/// Decodes Anthropic's `content_block_delta`/`message_delta` SSE events.
fn decode_sse_chunk(bytes: &[u8]) -> Vec<StreamEvent> {
    let text = String::from_utf8_lossy(bytes);
    let mut out = Vec::new();
    for line in text.lines() {
        let Some(data) = line.strip_prefix("data: ") else { continue };
        let Ok(v) = serde_json::from_str::<Value>(data) else { continue };
        match v["type"].as_str() {
            Some("content_block_delta") => {
                if let Some(t) = v["delta"]["text"].as_str() {
                    out.push(StreamEvent::TextDelta(t.to_string()));
                }
            }
            Some("message_delta") => {
                let stop_reason = match v["delta"]["stop_reason"].as_str() {
                    Some("tool_use") => StopReason::ToolCalls,
                    Some("max_tokens") => StopReason::MaxTokens,
                    _ => StopReason::EndTurn,
                };
                let usage = Usage {
                    prompt_tokens: 0,
                    completion_tokens: v["usage"]["output_tokens"].as_u64().unwrap_or(0) as u32,
                };
                out.push(StreamEvent::Done { stop_reason, usage });
            }
            _ => {}
        }
    }
    out
}
