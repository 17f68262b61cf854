//! LLM Gateway (spec §4.5).
//!
//! Grounded on `tharunmarella-forge-ide/forge-agent/src/api/{mod,openai,
//! anthropic}.rs`: a `Message`/`Role` transcript type, one module per
//! provider, `reqwest::Client` calls with a retry loop for 429/5xx. Extended
//! per spec §4.5 with Azure support, streaming, a static token-budget table,
//! and a tool-call loop scoped as a library call rather than forge-agent's
//! stdin-driven REPL.

mod providers;
mod rate_limiter;
mod retry;
mod token_budget;
mod tool_loop;

pub use rate_limiter::RateLimiter;
pub use token_budget::{budget_for_model, reserved_output_tokens};
pub use tool_loop::{run_tool_loop, ToolDispatcher};

use crate::config::{LlmConfig, Provider};
use crate::error::{CoreResult, LlmError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Present on `Role::Tool` messages: the id of the call being answered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into(), tool_calls: Vec::new(), tool_call_id: None }
    }
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into(), tool_calls: Vec::new(), tool_call_id: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub tools: Vec<ToolDef>,
    pub stream: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    ToolCalls,
    MaxTokens,
    Other,
}

#[derive(Debug, Clone, Default)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub message: Message,
    pub stop_reason: StopReason,
    pub usage: Usage,
}

/// A chunk of a streamed response (spec §4.9 "accumulates streamed tokens").
#[derive(Debug, Clone)]
pub enum StreamEvent {
    TextDelta(String),
    ToolCall(ToolCall),
    Done { stop_reason: StopReason, usage: Usage },
}

/// Uniform entry point over OpenAI/Azure/Anthropic (spec §4.5).
pub struct LlmGateway {
    config: LlmConfig,
    client: reqwest::Client,
    rate_limiter: Arc<RateLimiter>,
}

impl LlmGateway {
    pub fn new(config: LlmConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .expect("reqwest client config is static and always valid");
        let rate_limiter =
            Arc::new(RateLimiter::new(config.rate_limit_capacity, config.rate_limit_refill_per_sec));
        Self { config, client, rate_limiter }
    }

    pub(crate) fn estimate_prompt_tokens(request: &ChatRequest) -> usize {
        request.messages.iter().map(|m| m.content.len() / 4).sum()
    }

    /// `chat(request) → response` (spec §4.5), non-streaming path.
    pub async fn chat(&self, request: ChatRequest) -> CoreResult<ChatResponse> {
        self.check_budget(&request)?;
        self.rate_limiter.acquire().await;

        let attempt = || async {
            match self.config.provider {
                Provider::OpenAi => providers::openai::chat(&self.client, &self.config, &request).await,
                Provider::Azure => providers::azure::chat(&self.client, &self.config, &request).await,
                Provider::Anthropic => providers::anthropic::chat(&self.client, &self.config, &request).await,
            }
        };

        retry::with_backoff(self.config.max_retries, attempt).await
    }

    /// `chat(request) → stream` (spec §4.5). Retried only before the first
    /// token, per spec §4.5's streaming retry carve-out.
    pub async fn chat_stream(
        &self,
        request: ChatRequest,
    ) -> CoreResult<futures::stream::BoxStream<'static, CoreResult<StreamEvent>>> {
        self.check_budget(&request)?;
        self.rate_limiter.acquire().await;

        let attempt = || async {
            match self.config.provider {
                Provider::OpenAi => providers::openai::chat_stream(&self.client, &self.config, &request).await,
                Provider::Azure => providers::azure::chat_stream(&self.client, &self.config, &request).await,
                Provider::Anthropic => {
                    providers::anthropic::chat_stream(&self.client, &self.config, &request).await
                }
            }
        };

        retry::with_backoff(self.config.max_retries, attempt).await
    }

    fn check_budget(&self, request: &ChatRequest) -> CoreResult<()> {
        let limit = budget_for_model(&request.model);
        let reserved = reserved_output_tokens(request.max_output_tokens);
        let needed = Self::estimate_prompt_tokens(request);
        if needed + reserved > limit {
            return Err(LlmError::ContextOverflow { needed, budget: limit.saturating_sub(reserved) }.into());
        }
        Ok(())
    }
}
