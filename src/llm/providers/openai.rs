//! OpenAI-compatible chat-completions provider (spec §4.5).
//!
//! Grounded on forge-agent's `api/openai.rs`: build an OpenAI-format
//! messages array, POST via `reqwest::Client`, parse `choices[0].message`.

use super::classify_status;
use crate::config::LlmConfig;
use crate::error::{CoreResult, LlmError};
use crate::llm::{ChatRequest, ChatResponse, Message, Role, StopReason, StreamEvent, ToolCall, Usage};
use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::{json, Value};

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

pub(in crate::llm::providers) fn build_body(config: &LlmConfig, request: &ChatRequest, model: &str) -> Value {
    let messages: Vec<Value> = request
        .messages
        .iter()
        .map(|m| {
            let mut v = json!({ "role": role_str(m.role), "content": m.content });
            if let Some(id) = &m.tool_call_id {
                v["tool_call_id"] = json!(id);
            }
            if !m.tool_calls.is_empty() {
                v["tool_calls"] = json!(m
                    .tool_calls
                    .iter()
                    .map(|c| json!({
                        "id": c.id,
                        "type": "function",
                        "function": { "name": c.name, "arguments": c.arguments.to_string() }
                    }))
                    .collect::<Vec<_>>());
            }
            v
        })
        .collect();

    let mut body = json!({
        "model": model,
        "messages": messages,
        "temperature": request.temperature,
        "max_tokens": request.max_output_tokens,
        "stream": request.stream,
    });

    if !request.tools.is_empty() {
        body["tools"] = json!(request
            .tools
            .iter()
            .map(|t| json!({
                "type": "function",
                "function": { "name": t.name, "description": t.description, "parameters": t.parameters }
            }))
            .collect::<Vec<_>>());
    }

    let _ = config;
    body
}

/// Deployment id is passed separately from the model field on Azure; the
/// wire body is otherwise identical to the OpenAI chat-completions format.
pub(in crate::llm::providers) fn build_body_for_azure(config: &LlmConfig, request: &ChatRequest) -> Value {
    build_body(config, request, &request.model)
}

pub(in crate::llm::providers) fn parse_response_pub(body: &Value) -> CoreResult<ChatResponse> {
    parse_response(body)
}

fn parse_response(body: &Value) -> CoreResult<ChatResponse> {
    let choice = body["choices"].get(0).ok_or_else(|| LlmError::MalformedResponse("no choices".into()))?;
    let msg = &choice["message"];
    let content = msg["content"].as_str().unwrap_or_default().to_string();

    let tool_calls: Vec<ToolCall> = msg["tool_calls"]
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|tc| {
                    let id = tc["id"].as_str()?.to_string();
                    let name = tc["function"]["name"].as_str()?.to_string();
                    let args_str = tc["function"]["arguments"].as_str().unwrap_or("{}");
                    let arguments = serde_json::from_str(args_str).unwrap_or(Value::Null);
                    Some(ToolCall { id, name, arguments })
                })
                .collect()
        })
        .unwrap_or_default();

    let finish_reason = choice["finish_reason"].as_str().unwrap_or("stop");
    let stop_reason = match finish_reason {
        "tool_calls" => StopReason::ToolCalls,
        "length" => StopReason::MaxTokens,
        "stop" => StopReason::EndTurn,
        _ => StopReason::Other,
    };

    let usage = Usage {
        prompt_tokens: body["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
        completion_tokens: body["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
    };

    Ok(ChatResponse {
        message: Message {
            role: Role::Assistant,
            content,
            tool_calls,
            tool_call_id: None,
        },
        stop_reason,
        usage,
    })
}

pub(in crate::llm) async fn chat(
    client: &reqwest::Client,
    config: &LlmConfig,
    request: &ChatRequest,
) -> CoreResult<ChatResponse> {
    let url = format!("{}/chat/completions", config.endpoint.trim_end_matches('/'));
    let body = build_body(config, request, &request.model);

    let resp = client
        .post(&url)
        .bearer_auth(&config.api_key)
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
    let url = format!("{}/chat/completions", config.endpoint.trim_end_matches('/'));
    let mut body = build_body(config, request, &request.model);
    body["stream"] = json!(true);

    let resp = client
        .post(&url)
        .bearer_auth(&config.api_key)
        .json(&body)
        .send()
        .await
        .map_err(LlmError::from)?;

    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        return Err(classify_status(status, &text).into());
    }

    stream_from_response(resp)
}

/// Wraps an already-successful streaming response into the gateway's
/// `StreamEvent` sequence; shared by the Azure provider, whose wire format
/// is identical once the deployment URL has resolved.
pub(in crate::llm::providers) fn stream_from_response(
    resp: reqwest::Response,
) -> CoreResult<BoxStream<'static, CoreResult<StreamEvent>>> {
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

/// Decodes one chunk of an OpenAI-style `text/event-stream` body into zero
/// or more events; a malformed line is skipped rather than aborting the
/// stream.
fn decode_sse_chunk(bytes: &[u8]) -> Vec<StreamEvent> {
    let text = String::from_utf8_lossy(bytes);
    let mut out = Vec::new();
    for line in text.lines() {
        let Some(data) = line.strip_prefix("data: ") else { continue };
        if data == "[DONE]" {
            out.push(StreamEvent::Done { stop_reason: StopReason::EndTurn, usage: Usage::default() });
            continue;
        }
        let Ok(v) = serde_json::from_str::<Value>(data) else { continue };
        let delta = &v["choices"][0]["delta"];
        if let Some(content) = delta["content"].as_str() {
            if !content.is_empty() {
                out.push(StreamEvent::TextDelta(content.to_string()));
            }
        }
        if let Some(calls) = delta["tool_calls"].as_array() {
            for tc in calls {
                if let (Some(id), Some(name)) = (tc["id"].as_str(), tc["function"]["name"].as_str()) {
                    let args_str = tc["function"]["arguments"].as_str().unwrap_or("{}");
                    let arguments = serde_json::from_str(args_str).unwrap_or(Value::Null);
                    out.push(StreamEvent::ToolCall(ToolCall {
                        id: id.to_string(),
                        name: name.to_string(),
                        arguments,
                    }));
                }
            }
        }
    }
    out
}
