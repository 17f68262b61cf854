use super::LanguageDriver;
use crate::deps::ExtractedFunction;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static USING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^\s*using\s+(?:static\s+)?([\w.]+)\s*;").unwrap());
static METHOD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:public|private|protected|internal|static|async|override|virtual|\s)+[\w<>\[\],?]+\s+(\w+)\s*\([^)]*\)\s*\{").unwrap()
});
static CALL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b([A-Za-z_]\w*)\s*\(").unwrap());

const CS_KEYWORDS: &[&str] = &["if", "for", "foreach", "while", "switch", "catch", "return", "new", "base", "this"];

pub struct CSharpDriver;

impl LanguageDriver for CSharpDriver {
    fn extensions(&self) -> &'static [&'static str] {
        &["cs"]
    }

    fn extract_imports(&self, text: &str) -> Vec<String> {
        USING.captures_iter(text).map(|c| c[1].to_string()).collect()
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
            .filter(|n| !CS_KEYWORDS.contains(&n.as_str()))
            .collect()
    }

    fn resolve_import_path(
        &self,
        import: &str,
        _current_file: &Path,
        repo_root: &Path,
    ) -> Option<PathBuf> {
        // C# namespaces don't map 1:1 to file paths; best-effort match on the
        // last namespace segment against any file whose `namespace` matches.
        let last_segment = import.split('.').next_back()?;
        find_file_declaring_namespace(repo_root, last_segment)
    }
}

fn find_file_declaring_namespace(repo_root: &Path, namespace_tail: &str) -> Option<PathBuf> {
    let needle = format!("namespace {namespace_tail}");
    for entry in walkdir_cs_files(repo_root) {
        if let Ok(text) = std::fs::read_to_string(&entry) {
            if text.contains(&needle) {
                return Some(entry);
            }
        }
    }
    None
}

fn walkdir_cs_files(root: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else { continue };
        for entry in entries.filter_map(Result::ok) {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.extension().and_then(|e| e.to_str()) == Some("cs") {
                out.push(path);
            }
        }
    }
    out
}
