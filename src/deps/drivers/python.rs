use super::LanguageDriver;
use crate::deps::ExtractedFunction;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static IMPORT_FROM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*from\s+([.\w]+)\s+import\s").unwrap());
static IMPORT_PLAIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*import\s+([\w.]+)").unwrap());
static DEF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(?P<indent> *)def\s+(?P<name>\w+)\s*\(").unwrap());
static CALL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b([A-Za-z_]\w*)\s*\(").unwrap());

const PY_KEYWORDS: &[&str] = &[
    "if", "for", "while", "return", "print", "len", "range", "str", "int", "float", "list",
    "dict", "set", "tuple", "isinstance", "super", "with", "not", "and", "or", "in", "def",
    "class", "try", "except", "lambda", "zip", "enumerate", "sorted", "map", "filter",
];

pub struct PythonDriver;

impl LanguageDriver for PythonDriver {
    fn extensions(&self) -> &'static [&'static str] {
        &["py"]
    }

    fn extract_imports(&self, text: &str) -> Vec<String> {
        let mut out = Vec::new();
        for cap in IMPORT_FROM.captures_iter(text) {
            out.push(cap[1].to_string());
        }
        for cap in IMPORT_PLAIN.captures_iter(text) {
            out.push(cap[1].to_string());
        }
        out
    }

    fn extract_functions(&self, text: &str) -> Vec<ExtractedFunction> {
        let lines: Vec<&str> = text.lines().collect();
        let mut out = Vec::new();
        for cap in DEF.captures_iter(text) {
            let name = cap["name"].to_string();
            let indent = cap["indent"].len();
            let start_byte = cap.get(0).unwrap().start();
            let start_line = text[..start_byte].lines().count();
            let mut end_line = lines.len();
            for (i, line) in lines.iter().enumerate().skip(start_line) {
                if line.trim().is_empty() {
                    continue;
                }
                let this_indent = line.len() - line.trim_start().len();
                if this_indent <= indent && i > start_line {
                    end_line = i;
                    break;
                }
            }
            let body = lines[start_line..end_line].join("\n");
            out.push(ExtractedFunction { name, body });
        }
        out
    }

    fn extract_function_calls(&self, body: &str) -> Vec<String> {
        CALL.captures_iter(body)
            .map(|c| c[1].to_string())
            .filter(|name| !PY_KEYWORDS.contains(&name.as_str()))
            .collect()
    }

    fn resolve_import_path(
        &self,
        import: &str,
        current_file: &Path,
        repo_root: &Path,
    ) -> Option<PathBuf> {
        let relative_dots = import.chars().take_while(|c| *c == '.').count();
        let module = import.trim_start_matches('.');

        let base = if relative_dots > 0 {
            let mut dir = current_file.parent()?.to_path_buf();
            for _ in 1..relative_dots {
                dir = dir.parent()?.to_path_buf();
            }
            dir
        } else {
            repo_root.to_path_buf()
        };

        let parts: Vec<&str> = module.split('.').filter(|s| !s.is_empty()).collect();
        let mut candidate = base;
        for part in &parts {
            candidate = candidate.join(part);
        }

        let as_module = candidate.with_extension("py");
        if as_module.is_file() {
            return Some(as_module);
        }
        let as_package = candidate.join("__init__.py");
        if as_package.is_file() {
            return Some(as_package);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_plain_and_from_imports() {
        let d = PythonDriver;
        let imports = d.extract_imports("import os\nfrom . import utils\nfrom pkg.sub import thing\n");
        assert!(imports.contains(&"os".to_string()));
        assert!(imports.contains(&".".to_string()));
        assert!(imports.contains(&"pkg.sub".to_string()));
    }

    #[test]
    fn extracts_function_body_by_indentation() {
        let d = PythonDriver;
        let text = "def foo():\n    return 1\n\ndef bar():\n    return 2\n";
        let funcs = d.extract_functions(text);
        assert_eq!(funcs.len(), 2);
        assert_eq!(funcs[0].name, "foo");
        assert!(funcs[0].body.contains("return 1"));
        assert!(!funcs[0].body.contains("bar"));
    }

    #[test]
    fn filters_keywords_from_calls() {
        let d = PythonDriver;
        let calls = d.extract_function_calls("if len(x):\n    helper(x)\n");
        assert_eq!(calls, vec!["helper".to_string()]);
    }
}
