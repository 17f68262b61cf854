//! Overview & Mini-Map Builder (spec §4.10): produces the top-level project
//! overview and the knowledge-graph mini-map tree.
//!
//! Grounded on the teacher's `xml_builder.rs` tag-stripping helpers for the
//! overview's `<blog>`/HTML cleanup, and on the Classifier's tagged-reply
//! parsing convention for the mini-map's structured output.

use crate::classifier::Classification;
use crate::error::CoreResult;
use crate::llm::{ChatRequest, LlmGateway, Message};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static TAG_WRAPPER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)</?(blog|html|body)[^>]*>").unwrap());

const MINI_MAP_OPEN: &str = "<mini_map>";
const MINI_MAP_CLOSE: &str = "</mini_map>";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MiniMapNode {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub children: Vec<MiniMapNode>,
}

/// Strips `<blog>…</blog>` and bare HTML-tag wrappers from a raw overview
/// reply (spec §4.10 "output is cleaned of any `<blog>…</blog>` or
/// HTML-tag wrappers").
fn clean_overview(raw: &str) -> String {
    TAG_WRAPPER.replace_all(raw, "").trim().to_string()
}

/// `build_overview(repository) → cleaned markdown` (spec §4.10).
pub async fn build_overview(
    gateway: &LlmGateway,
    model: &str,
    classification: Classification,
    tree: &str,
    readme: Option<&str>,
) -> CoreResult<String> {
    let system = format!(
        "Write a concise project overview for a {} repository, in markdown.",
        classification.as_str()
    );
    let mut user = format!("Directory tree:\n{tree}\n");
    if let Some(readme) = readme {
        user.push_str(&format!("\nREADME:\n{readme}\n"));
    }

    let request = ChatRequest {
        messages: vec![Message::system(system), Message::user(user)],
        model: model.to_string(),
        temperature: 0.3,
        max_output_tokens: 2048,
        tools: Vec::new(),
        stream: false,
    };

    let response = gateway.chat(request).await?;
    Ok(clean_overview(&response.message.content))
}

/// `build_mini_map(repository) → tree` (spec §4.10). Parse failures are
/// stored as an empty tree and are non-fatal — the overview still
/// completes.
pub async fn build_mini_map(
    gateway: &LlmGateway,
    model: &str,
    classification: Classification,
    tree: &str,
) -> Vec<MiniMapNode> {
    let system = format!(
        "Produce a knowledge-graph mini-map for a {} repository as a JSON tree of \
         {{title, url, children}} nodes, wrapped as {MINI_MAP_OPEN}[...]{MINI_MAP_CLOSE}.",
        classification.as_str()
    );
    let user = format!("Directory tree:\n{tree}\n");

    let request = ChatRequest {
        messages: vec![Message::system(system), Message::user(user)],
        model: model.to_string(),
        temperature: 0.3,
        max_output_tokens: 2048,
        tools: Vec::new(),
        stream: false,
    };

    let reply = match gateway.chat(request).await {
        Ok(response) => response.message.content,
        Err(e) => {
            tracing::warn!(error = %e, "mini-map LLM call failed, storing empty tree");
            return Vec::new();
        }
    };

    match parse_mini_map(&reply) {
        Ok(nodes) => nodes,
        Err(e) => {
            tracing::warn!(error = %e, "mini-map reply failed to parse, storing empty tree");
            Vec::new()
        }
    }
}

fn parse_mini_map(reply: &str) -> Result<Vec<MiniMapNode>, String> {
    let start = reply.find(MINI_MAP_OPEN).ok_or("no <mini_map> tag found")? + MINI_MAP_OPEN.len();
    let end = reply[start..].find(MINI_MAP_CLOSE).ok_or("no closing </mini_map> tag found")? + start;
    serde_json::from_str(reply[start..end].trim()).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_overview_strips_blog_wrapper() {
        assert_eq!(clean_overview("<blog># Title\nbody</blog>"), "# Title\nbody");
    }

    #[test]
    fn clean_overview_strips_bare_html_tags() {
        assert_eq!(clean_overview("<html><body># Title</body></html>"), "# Title");
    }

    #[test]
    fn parse_mini_map_reads_nested_tree() {
        let reply = format!(
            "{MINI_MAP_OPEN}[{{\"title\":\"root\",\"url\":\"/\",\"children\":[{{\"title\":\"a\",\"url\":\"/a\",\"children\":[]}}]}}]{MINI_MAP_CLOSE}"
        );
        let nodes = parse_mini_map(&reply).unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].children.len(), 1);
    }

    #[test]
    fn parse_mini_map_errors_without_tag() {
        assert!(parse_mini_map("no tags here").is_err());
    }
}
