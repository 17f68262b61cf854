//! Azure OpenAI provider (spec §4.5: "deployment name in place of model id").
//!
//! Grounded on the original Python source's `kernel_factory.py` Azure branch
//! (`AzureChatCompletion(deployment_name=model, endpoint=..., api_key=...)`)
//! translated onto the same request/response shape as the OpenAI provider,
//! since Azure OpenAI's wire format is the OpenAI chat-completions format
//! with the model id moved into the URL path as a deployment name.

use super::classify_status;
use crate::config::LlmConfig;
use crate::error::{CoreResult, LlmError};
use crate::llm::{ChatRequest, ChatResponse, StreamEvent};
use futures::stream::BoxStream;
use serde_json::Value;

const API_VERSION: &str = "2024-06-01";

fn deployment_url(config: &LlmConfig, deployment: &str, streaming: bool) -> String {
    let base = config.endpoint.trim_end_matches('/');
    let op = if streaming { "chat/completions" } else { "chat/completions" };
    format!("{base}/openai/deployments/{deployment}/{op}?api-version={API_VERSION}")
}

pub(in crate::llm) async fn chat(
    client: &reqwest::Client,
    config: &LlmConfig,
    request: &ChatRequest,
) -> CoreResult<ChatResponse> {
    let url = deployment_url(config, &request.model, false);
    let body = super::openai::build_body_for_azure(config, request);

    let resp = client
        .post(&url)
        .header("api-key", &config.api_key)
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
    super::openai::parse_response_pub(&parsed)
}

pub(in crate::llm) async fn chat_stream(
    client: &reqwest::Client,
    config: &LlmConfig,
    request: &ChatRequest,
) -> CoreResult<BoxStream<'static, CoreResult<StreamEvent>>> {
    let url = deployment_url(config, &request.model, true);
    let mut body = super::openai::build_body_for_azure(config, request);
    body["stream"] = serde_json::json!(true);

    let resp = client
        .post(&url)
        .header("api-key", &config.api_key)
        .json(&body)
        .send()
        .await
        .map_err(LlmError::from)?;

    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        return Err(classify_status(status, &text).into());
    }

    super::openai::stream_from_response(resp)
}
