use super::LanguageDriver;
use crate::deps::ExtractedFunction;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static IMPORT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^\s*import\s+(?:static\s+)?([\w.]+)(?:\.\*)?\s*;").unwrap());
static METHOD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:public|private|protected|static|final|\s)+[\w<>\[\],\s]+\s+(\w+)\s*\([^)]*\)\s*(?:throws\s+[\w,\s]+)?\{").unwrap()
});
static CALL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b([A-Za-z_]\w*)\s*\(").unwrap());

const JAVA_KEYWORDS: &[&str] = &["if", "for", "while", "switch", "catch", "return", "new", "super", "this"];

pub struct JavaDriver;

impl LanguageDriver for JavaDriver {
    fn extensions(&self) -> &'static [&'static str] {
        &["java"]
    }

    fn extract_imports(&self, text: &str) -> Vec<String> {
        IMPORT.captures_iter(text).map(|c| c[1].to_string()).collect()
    }

    fn extract_functions(&self, text: &str) -> Vec<ExtractedFunction> {
        let mut out = Vec::new();
        for cap in METHOD.captures_iter(text) {
            let name = cap[1].to_string();
            let start = cap.get(0).unwrap().start();
            let body = super::extract_braced_body(&text[start..]);
            out.push(ExtractedFunction { name, body });
        }
        out
    }

    fn extract_function_calls(&self, body: &str) -> Vec<String> {
        CALL.captures_iter(body)
            .map(|c| c[1].to_string())
            .filter(|n| !JAVA_KEYWORDS.contains(&n.as_str()))
            .collect()
    }

    fn resolve_import_path(
        &self,
        import: &str,
        _current_file: &Path,
        repo_root: &Path,
    ) -> Option<PathBuf> {
        let rel = import.replace('.', "/") + ".java";
        for src_root in ["src/main/java", "src", ""] {
            let candidate = repo_root.join(src_root).join(&rel);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        None
    }
}
