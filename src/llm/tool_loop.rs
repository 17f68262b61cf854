//! Generalized tool-call loop (spec §4.5 "Tool-calling loop").
//!
//! Grounded on forge-agent's `Agent::run_prompt` main loop (get completion →
//! execute tool calls → append to transcript → continue) but scoped as a
//! plain library call consumed by the Section Generator (§4.9) instead of a
//! stdin-driven REPL.

use super::{ChatRequest, LlmGateway, Message, Role, StopReason, StreamEvent, ToolCall};
use crate::error::{CoreResult, LlmError};
use async_trait::async_trait;
use futures::StreamExt;

/// Executes one named tool call and returns its JSON result, or a fatal
/// error that should abort the whole loop (spec §4.5 "a tool error marked
/// `fatal`").
#[async_trait]
pub trait ToolDispatcher: Send + Sync {
    async fn dispatch(&self, call: &ToolCall) -> Result<serde_json::Value, ToolError>;
}

#[derive(Debug, Clone)]
pub struct ToolError {
    pub message: String,
    pub fatal: bool,
}

/// Runs the loop: stream a completion from `gateway`, accumulating text
/// deltas into the candidate content and executing tool calls via
/// `dispatcher` as they arrive on the stream (spec §4.9 "tool calls execute
/// as they arrive") → append the assistant turn and tool results to the
/// transcript → re-invoke, terminating on an assistant message without tool
/// calls, on exceeding `hop_cap`, or on a fatal tool error.
pub async fn run_tool_loop(
    gateway: &LlmGateway,
    dispatcher: &dyn ToolDispatcher,
    mut request: ChatRequest,
    hop_cap: usize,
) -> CoreResult<Message> {
    request.stream = true;

    for _hop in 0..hop_cap {
        let mut stream = gateway.chat_stream(request.clone()).await?;

        let mut content = String::new();
        let mut tool_calls = Vec::new();
        let mut tool_results = Vec::new();
        let mut stop_reason = StopReason::EndTurn;

        while let Some(event) = stream.next().await {
            match event? {
                StreamEvent::TextDelta(delta) => content.push_str(&delta),
                StreamEvent::ToolCall(call) => {
                    let result_message = match dispatcher.dispatch(&call).await {
                        Ok(result) => Message {
                            role: Role::Tool,
                            content: result.to_string(),
                            tool_calls: Vec::new(),
                            tool_call_id: Some(call.id.clone()),
                        },
                        Err(e) if e.fatal => return Err(LlmError::FatalTool(e.message).into()),
                        Err(e) => Message {
                            role: Role::Tool,
                            content: serde_json::json!({ "error": e.message }).to_string(),
                            tool_calls: Vec::new(),
                            tool_call_id: Some(call.id.clone()),
                        },
                    };
                    tool_calls.push(call);
                    tool_results.push(result_message);
                }
                StreamEvent::Done { stop_reason: sr, .. } => stop_reason = sr,
            }
        }

        if !tool_calls.is_empty() {
            stop_reason = StopReason::ToolCalls;
        }

        let message = Message { role: Role::Assistant, content, tool_calls, tool_call_id: None };

        if stop_reason != StopReason::ToolCalls || message.tool_calls.is_empty() {
            return Ok(message);
        }

        request.messages.push(message);
        request.messages.extend(tool_results);
    }

    Err(LlmError::HopCapExceeded { cap: hop_cap }.into())
}
