//! One module per provider (spec §4.5): OpenAI-compatible chat-completions,
//! Azure (deployment name in place of model id), Anthropic (messages
//! endpoint, system prompt separated). Grounded on forge-agent's
//! `api/{openai,anthropic}.rs` request/response shapes.

pub mod anthropic;
pub mod azure;
pub mod openai;

use crate::error::LlmError;

/// Maps an HTTP status code to the gateway's transient/fatal split (spec
/// §4.5: "network errors, 429, 500/502/503/504 ... are retried ...
/// Authentication and 4xx validation errors are not retried").
pub(super) fn classify_status(status: reqwest::StatusCode, body: &str) -> LlmError {
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        LlmError::Auth(body.to_string())
    } else if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        LlmError::Transient { status: status.as_u16(), message: body.to_string() }
    } else if status.is_client_error() {
        LlmError::Validation(body.to_string())
    } else {
        LlmError::MalformedResponse(format!("unexpected status {status}: {body}"))
    }
}
