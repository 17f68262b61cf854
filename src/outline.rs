//! Outline Planner (spec §4.8): turns a classified repository into a forest
//! of planned CatalogNodes.
//!
//! Grounded on the teacher's `xml_builder.rs` tagged-block convention for
//! structured LLM output, and on `model::catalog_node::build_forest` for the
//! cycle/slug validation this module calls after parsing.

use crate::classifier::Classification;
use crate::error::{CoreError, CoreResult, IntegrityError};
use crate::llm::{ChatRequest, LlmGateway, Message};
use crate::model::catalog_node::{build_forest, CatalogTreeNode};
use crate::model::CatalogNode;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

const MAX_RETRIES: u32 = 3;
const MAX_DEPTH: usize = 5;
const TAG_OPEN: &str = "<documentation_structure>";
const TAG_CLOSE: &str = "</documentation_structure>";

#[derive(Debug, Deserialize)]
struct PlannedNode {
    title: String,
    #[serde(default)]
    prompt: String,
    #[serde(default)]
    children: Vec<PlannedNode>,
}

fn system_prompt(classification: Classification) -> String {
    format!(
        "You plan the documentation structure for a {} repository. \
         Return a JSON forest of nodes, each {{title, prompt, children}}, wrapped as \
         {TAG_OPEN}[...]{TAG_CLOSE}. `prompt` is guidance for the writer of that section. \
         Keep nesting to at most {MAX_DEPTH} levels.",
        classification.as_str()
    )
}

fn extract_json(reply: &str) -> Option<&str> {
    let start = reply.find(TAG_OPEN)? + TAG_OPEN.len();
    let end = reply[start..].find(TAG_CLOSE)? + start;
    Some(reply[start..end].trim())
}

fn slugify(title: &str) -> String {
    let mut slug: String = title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect();
    slug = slug.trim_matches('-').to_string();
    while slug.contains("--") {
        slug = slug.replace("--", "-");
    }
    if slug.is_empty() {
        slug = "section".to_string();
    }
    slug
}

/// Flattens the parsed forest into persistable rows, disambiguating
/// duplicate slugs by suffixing `-2`, `-3`, ... in encounter order.
fn flatten(
    planned: Vec<PlannedNode>,
    repository_id: Uuid,
    parent_id: Option<Uuid>,
    used_slugs: &mut std::collections::HashSet<String>,
    out: &mut Vec<CatalogNode>,
) {
    for (i, p) in planned.into_iter().enumerate() {
        let id = Uuid::new_v4();
        let base_slug = slugify(&p.title);
        let mut slug = base_slug.clone();
        let mut suffix = 2;
        while !used_slugs.insert(slug.clone()) {
            slug = format!("{base_slug}-{suffix}");
            suffix += 1;
        }

        let now = Utc::now();
        out.push(CatalogNode {
            id,
            repository_id,
            parent_id,
            title: p.title,
            slug,
            order_index: i as i32,
            prompt: p.prompt,
            is_completed: false,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        });
        flatten(p.children, repository_id, Some(id), used_slugs, out);
    }
}

fn validate(nodes: &[CatalogNode]) -> Result<Vec<CatalogTreeNode>, String> {
    let forest = build_forest(nodes.to_vec())?;
    let max_depth = forest.iter().map(CatalogTreeNode::depth).max().unwrap_or(0);
    if max_depth > MAX_DEPTH {
        return Err(format!("forest depth {max_depth} exceeds the maximum of {MAX_DEPTH}"));
    }
    Ok(forest)
}

/// `plan(repository_metadata, tree, readme, classification) → forest`
/// (spec §4.8). Retries up to 3 times with the model's prior output appended
/// as context on parse/validation failure; persistent failure surfaces
/// `PLAN_INVALID` for the orchestrator to transition the repository to
/// FAILED.
pub async fn plan(
    gateway: &LlmGateway,
    model: &str,
    repository_id: Uuid,
    classification: Classification,
    tree: &str,
    readme: Option<&str>,
) -> CoreResult<Vec<CatalogNode>> {
    let system = system_prompt(classification);
    let mut base_user = format!("Directory tree:\n{tree}\n");
    if let Some(readme) = readme {
        base_user.push_str(&format!("\nREADME:\n{readme}\n"));
    }

    let mut last_error = String::new();

    for attempt in 0..MAX_RETRIES {
        let mut user = base_user.clone();
        if attempt > 0 {
            user.push_str(&format!(
                "\nYour previous attempt was rejected: {last_error}\nReturn corrected output."
            ));
        }

        let request = ChatRequest {
            messages: vec![Message::system(&system), Message::user(user)],
            model: model.to_string(),
            temperature: 0.2,
            max_output_tokens: 4096,
            tools: Vec::new(),
            stream: false,
        };

        let response = gateway.chat(request).await?;

        let Some(json) = extract_json(&response.message.content) else {
            last_error = "no <documentation_structure> tag found in reply".to_string();
            continue;
        };

        let planned: Vec<PlannedNode> = match serde_json::from_str(json) {
            Ok(p) => p,
            Err(e) => {
                last_error = format!("invalid JSON forest: {e}");
                continue;
            }
        };

        let mut nodes = Vec::new();
        let mut used_slugs = std::collections::HashSet::new();
        flatten(planned, repository_id, None, &mut used_slugs, &mut nodes);

        match validate(&nodes) {
            Ok(_) => return Ok(nodes),
            Err(e) => {
                last_error = e;
                continue;
            }
        }
    }

    Err(CoreError::Integrity(IntegrityError::PlanInvalid(last_error)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_punctuation_and_case() {
        assert_eq!(slugify("Getting Started!!"), "getting-started");
    }

    #[test]
    fn extract_json_locates_tagged_block() {
        let reply = format!("prelude {TAG_OPEN}[{{\"title\":\"A\"}}]{TAG_CLOSE} trailer");
        assert_eq!(extract_json(&reply), Some("[{\"title\":\"A\"}]"));
    }

    #[test]
    fn flatten_disambiguates_duplicate_slugs() {
        let planned = vec![
            PlannedNode { title: "Setup".into(), prompt: "".into(), children: Vec::new() },
            PlannedNode { title: "Setup".into(), prompt: "".into(), children: Vec::new() },
        ];
        let mut out = Vec::new();
        let mut used = std::collections::HashSet::new();
        flatten(planned, Uuid::new_v4(), None, &mut used, &mut out);
        let slugs: Vec<&str> = out.iter().map(|n| n.slug.as_str()).collect();
        assert_eq!(slugs, vec!["setup", "setup-2"]);
    }

    #[test]
    fn validate_rejects_forest_deeper_than_max() {
        let repo_id = Uuid::new_v4();
        let mut nested = PlannedNode { title: "L6".into(), prompt: "".into(), children: Vec::new() };
        for _ in 0..6 {
            nested = PlannedNode { title: "wrap".into(), prompt: "".into(), children: vec![nested] };
        }
        let mut out = Vec::new();
        let mut used = std::collections::HashSet::new();
        flatten(vec![nested], repo_id, None, &mut used, &mut out);
        assert!(validate(&out).is_err());
    }
}
