use super::LanguageDriver;
use crate::deps::ExtractedFunction;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static IMPORT_BLOCK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)import\s*\((.*?)\)").unwrap());
static IMPORT_SINGLE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"(?m)^import\s+"([^"]+)""#).unwrap());
static IMPORT_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"(?:\w+\s+)?"([^"]+)""#).unwrap());
static FUNC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"func\s+(?:\([^)]*\)\s*)?(\w+)\s*\(").unwrap());
static CALL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b([A-Za-z_]\w*)\s*\(").unwrap());

const GO_KEYWORDS: &[&str] = &["if", "for", "switch", "return", "len", "make", "append", "func", "go", "defer"];

pub struct GoDriver;

impl LanguageDriver for GoDriver {
    fn extensions(&self) -> &'static [&'static str] {
        &["go"]
    }

    fn extract_imports(&self, text: &str) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(cap) = IMPORT_BLOCK.captures(text) {
            for line in cap[1].lines() {
                if let Some(m) = IMPORT_LINE.captures(line) {
                    out.push(m[1].to_string());
                }
            }
        }
        for cap in IMPORT_SINGLE.captures_iter(text) {
            out.push(cap[1].to_string());
        }
        out
    }

    fn extract_functions(&self, text: &str) -> Vec<ExtractedFunction> {
        let mut out = Vec::new();
        for cap in FUNC.captures_iter(text) {
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
            .filter(|n| !GO_KEYWORDS.contains(&n.as_str()))
            .collect()
    }

    fn resolve_import_path(
        &self,
        import: &str,
        _current_file: &Path,
        repo_root: &Path,
    ) -> Option<PathBuf> {
        let module_name = read_module_name(repo_root)?;
        let suffix = import.strip_prefix(&module_name)?.trim_start_matches('/');
        let dir = repo_root.join(suffix);
        if dir.is_dir() {
            Some(dir)
        } else {
            None
        }
    }
}

fn read_module_name(repo_root: &Path) -> Option<String> {
    let text = std::fs::read_to_string(repo_root.join("go.mod")).ok()?;
    text.lines().find_map(|l| l.trim().strip_prefix("module ").map(str::trim).map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_grouped_imports() {
        let d = GoDriver;
        let text = "import (\n\t\"fmt\"\n\tmypkg \"example.com/mypkg\"\n)\n";
        let imports = d.extract_imports(text);
        assert!(imports.contains(&"fmt".to_string()));
        assert!(imports.contains(&"example.com/mypkg".to_string()));
    }
}
