//! Classifier (spec §4.7): a single-shot, non-retried LLM call that labels
//! a repository from its compact tree and README text.
//!
//! Grounded on the teacher's `universal.rs` single-shot prompt/response
//! pattern, paired with the tagged-output convention `llm::providers::*`
//! already use for structured replies.

use crate::error::CoreResult;
use crate::llm::{ChatRequest, LlmGateway, Message};

/// Repository classification labels (spec §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Framework,
    Library,
    Application,
    CliTool,
    DevelopmentTool,
    Documentation,
    DevopsConfiguration,
    Unknown,
}

impl Classification {
    fn parse(tag: &str) -> Self {
        match tag.trim() {
            "framework" => Classification::Framework,
            "library" => Classification::Library,
            "application" => Classification::Application,
            "cli_tool" => Classification::CliTool,
            "development_tool" => Classification::DevelopmentTool,
            "documentation" => Classification::Documentation,
            "devops_configuration" => Classification::DevopsConfiguration,
            _ => Classification::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Framework => "framework",
            Classification::Library => "library",
            Classification::Application => "application",
            Classification::CliTool => "cli_tool",
            Classification::DevelopmentTool => "development_tool",
            Classification::Documentation => "documentation",
            Classification::DevopsConfiguration => "devops_configuration",
            Classification::Unknown => "unknown",
        }
    }
}

const SYSTEM_PROMPT: &str = "You classify a software repository from its directory tree and README. \
Respond with exactly one tag from: framework, library, application, cli_tool, development_tool, \
documentation, devops_configuration. Wrap your answer as <classification>TAG</classification>.";

/// `classify(tree, readme) → one of the fixed labels` (spec §4.7). Locates
/// the tag by name; an unparseable reply yields `unknown` and is never
/// retried, since classification failure is non-fatal to the pipeline
/// (spec §4.11 "CLONED → CLASSIFIED").
pub async fn classify(gateway: &LlmGateway, model: &str, tree: &str, readme: Option<&str>) -> CoreResult<Classification> {
    let mut user = format!("Directory tree:\n{tree}\n");
    if let Some(readme) = readme {
        user.push_str(&format!("\nREADME:\n{readme}\n"));
    }

    let request = ChatRequest {
        messages: vec![Message::system(SYSTEM_PROMPT), Message::user(user)],
        model: model.to_string(),
        temperature: 0.0,
        max_output_tokens: 64,
        tools: Vec::new(),
        stream: false,
    };

    let response = gateway.chat(request).await?;
    Ok(extract_tag(&response.message.content).map(|tag| Classification::parse(&tag)).unwrap_or(Classification::Unknown))
}

fn extract_tag(reply: &str) -> Option<String> {
    let start = reply.find("<classification>")? + "<classification>".len();
    let end = reply[start..].find("</classification>")? + start;
    Some(reply[start..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_known_tag() {
        assert_eq!(extract_tag("blah <classification>library</classification> blah"), Some("library".to_string()));
    }

    #[test]
    fn missing_tag_yields_none() {
        assert_eq!(extract_tag("no tags here"), None);
    }

    #[test]
    fn unknown_text_parses_to_unknown_variant() {
        assert_eq!(Classification::parse("something_else").as_str(), "unknown");
    }

    #[test]
    fn every_known_tag_round_trips() {
        for tag in [
            "framework",
            "library",
            "application",
            "cli_tool",
            "development_tool",
            "documentation",
            "devops_configuration",
        ] {
            assert_eq!(Classification::parse(tag).as_str(), tag);
        }
    }
}
