//! Section Generator (spec §4.9): for each leaf CatalogNode, runs an
//! agentic loop (plan → tool calls → markdown content + source citations).
//!
//! Grounded on forge-agent's `Agent::run_prompt` (reused here via
//! [`crate::llm::run_tool_loop`]) and the teacher's `slicer.rs` per-item
//! concurrency-bounded processing loop (`Semaphore`-gated `tokio::spawn`).

use crate::classifier::Classification;
use crate::config::GenerationConfig;
use crate::llm::{run_tool_loop, ChatRequest, LlmGateway, Message};
use crate::model::CatalogNode;
use crate::tools::ToolSurface;
use std::sync::Arc;
use tokio::sync::Semaphore;
use uuid::Uuid;

const DOCS_OPEN: &str = "<docs>";
const DOCS_CLOSE: &str = "</docs>";

/// Outcome of generating one leaf. Failures are independent per leaf (spec
/// §4.9 "A failure on one leaf does not abort siblings"); the orchestrator
/// leaves `is_completed = false` and retries such nodes on a later pass.
pub struct LeafResult {
    pub node_id: Uuid,
    pub outcome: Result<GeneratedSection, String>,
}

pub struct GeneratedSection {
    pub title: String,
    pub content: String,
    pub sources: Vec<String>,
    pub request_tokens: u32,
    pub response_tokens: u32,
}

fn system_prompt(classification: Classification) -> String {
    format!(
        "You are writing one section of the documentation for a {} repository. \
         Use the available tools to inspect the codebase before writing. \
         Wrap your final answer as {DOCS_OPEN}markdown{DOCS_CLOSE}. Cite file paths you relied on.",
        classification.as_str()
    )
}

fn extract_docs(reply: &str) -> String {
    let Some(start) = reply.find(DOCS_OPEN) else { return reply.to_string() };
    let start = start + DOCS_OPEN.len();
    match reply[start..].find(DOCS_CLOSE) {
        Some(end) => reply[start..start + end].trim().to_string(),
        None => reply.to_string(),
    }
}

/// Generates the markdown for a single leaf node (spec §4.9 steps 1-4).
async fn generate_leaf(
    gateway: &LlmGateway,
    model: &str,
    classification: Classification,
    readme: &str,
    tree: &str,
    node: &CatalogNode,
    tool_surface: Arc<ToolSurface>,
    hop_cap: usize,
) -> Result<GeneratedSection, String> {
    let system = system_prompt(classification);
    let user = format!(
        "Section: {}\nGuidance: {}\n\nProject README:\n{}\n\nDirectory tree:\n{}",
        node.title, node.prompt, readme, tree
    );

    let request = ChatRequest {
        messages: vec![Message::system(system), Message::user(user)],
        model: model.to_string(),
        temperature: 0.3,
        max_output_tokens: 4096,
        tools: ToolSurface::tool_defs(),
        stream: true,
    };

    let request_tokens = LlmGateway::estimate_prompt_tokens(&request) as u32;

    let final_message = run_tool_loop(gateway, tool_surface.as_ref(), request, hop_cap)
        .await
        .map_err(|e| e.to_string())?;

    let content = extract_docs(&final_message.content);
    let sources = tool_surface.touched_files();

    Ok(GeneratedSection {
        title: node.title.clone(),
        content,
        sources,
        request_tokens,
        response_tokens: (final_message.content.len() / 4) as u32,
    })
}

/// `generate(leaves) → results` (spec §4.9). Processes leaves under a
/// semaphore bounding concurrency to `config.max_parallel_sections`; a
/// fresh [`ToolSurface`] is built per leaf so touched-file tracking doesn't
/// cross leaves.
pub async fn generate_all<F>(
    gateway: Arc<LlmGateway>,
    model: String,
    classification: Classification,
    readme: String,
    tree: String,
    leaves: Vec<CatalogNode>,
    config: GenerationConfig,
    hop_cap: usize,
    build_tool_surface: F,
) -> Vec<LeafResult>
where
    F: Fn() -> Arc<ToolSurface> + Send + Sync + 'static,
{
    let semaphore = Arc::new(Semaphore::new(config.max_parallel_sections.max(1)));
    let build_tool_surface = Arc::new(build_tool_surface);
    let mut handles = Vec::with_capacity(leaves.len());

    for node in leaves {
        let gateway = Arc::clone(&gateway);
        let model = model.clone();
        let readme = readme.clone();
        let tree = tree.clone();
        let semaphore = Arc::clone(&semaphore);
        let build_tool_surface = Arc::clone(&build_tool_surface);
        let node_id = node.id;

        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire().await.expect("semaphore never closed");
            let tool_surface = build_tool_surface();
            let outcome = generate_leaf(
                &gateway, &model, classification, &readme, &tree, &node, tool_surface, hop_cap,
            )
            .await;
            LeafResult { node_id, outcome }
        }));
    }

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(result) => results.push(result),
            Err(join_err) => results.push(LeafResult {
                node_id: Uuid::nil(),
                outcome: Err(format!("leaf generation task panicked: {join_err}")),
            }),
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_docs_strips_wrapper() {
        let reply = format!("preamble {DOCS_OPEN}# Title\nbody{DOCS_CLOSE} trailer");
        assert_eq!(extract_docs(&reply), "# Title\nbody");
    }

    #[test]
    fn extract_docs_falls_back_to_whole_reply_when_unwrapped() {
        let reply = "# Title\nbody with no wrapper";
        assert_eq!(extract_docs(reply), reply);
    }
}
