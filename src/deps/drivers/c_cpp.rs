use super::LanguageDriver;
use crate::deps::ExtractedFunction;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static INCLUDE_LOCAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"(?m)^\s*#include\s*"([^"]+)""#).unwrap());
static INCLUDE_SYSTEM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^\s*#include\s*<([^>]+)>").unwrap());
static FUNC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[\w:<>,\*&\s]+[\s\*&]\s*(\w+)\s*\([^;{]*\)\s*\{").unwrap()
});
static CALL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b([A-Za-z_]\w*)\s*\(").unwrap());

const C_KEYWORDS: &[&str] = &["if", "for", "while", "switch", "sizeof", "return", "static_cast", "new", "delete"];

pub struct CDriver;

impl LanguageDriver for CDriver {
    fn extensions(&self) -> &'static [&'static str] {
        &["c", "h", "cpp", "hpp", "cc", "cxx"]
    }

    fn extract_imports(&self, text: &str) -> Vec<String> {
        // Only local (`"..."`) includes resolve to workspace files; system
        // (`<...>`) includes are recorded but never resolved.
        let mut out: Vec<String> = INCLUDE_LOCAL.captures_iter(text).map(|c| c[1].to_string()).collect();
        out.extend(INCLUDE_SYSTEM.captures_iter(text).map(|c| c[1].to_string()));
        out
    }

    fn extract_functions(&self, text: &str) -> Vec<ExtractedFunction> {
        let mut out = Vec::new();
        for cap in FUNC.captures_iter(text) {
            let name = cap[1].to_string();
            if C_KEYWORDS.contains(&name.as_str()) {
                continue;
            }
            let start = cap.get(0).unwrap().start();
            let body = super::extract_braced_body(&text[start..]);
            out.push(ExtractedFunction { name, body });
        }
        out
    }

    fn extract_function_calls(&self, body: &str) -> Vec<String> {
        CALL.captures_iter(body)
            .map(|c| c[1].to_string())
            .filter(|n| !C_KEYWORDS.contains(&n.as_str()))
            .collect()
    }

    fn resolve_import_path(
        &self,
        import: &str,
        current_file: &Path,
        repo_root: &Path,
    ) -> Option<PathBuf> {
        let dir = current_file.parent()?;
        let candidate = dir.join(import);
        if candidate.is_file() {
            return Some(candidate);
        }
        let from_root = repo_root.join(import);
        if from_root.is_file() {
            return Some(from_root);
        }
        None
    }
}
