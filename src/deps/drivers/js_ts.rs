use super::LanguageDriver;
use crate::deps::ExtractedFunction;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static IMPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?m)^\s*import\s+(?:[\w*{}\s,]+\s+from\s+)?['"]([^'"]+)['"]"#).unwrap());
static REQUIRE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"require\(\s*['"]([^'"]+)['"]\s*\)"#).unwrap());
static FUNC_DECL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"function\s+(\w+)\s*\(").unwrap());
static ARROW_FUNC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:const|let|var)\s+(\w+)\s*=\s*(?:async\s*)?\([^)]*\)\s*=>").unwrap());
static METHOD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*(?:async\s+)?(\w+)\s*\([^)]*\)\s*\{").unwrap());
static CALL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b([A-Za-z_$][\w$]*)\s*\(").unwrap());

const JS_KEYWORDS: &[&str] = &[
    "if", "for", "while", "switch", "catch", "return", "function", "typeof", "new", "console",
    "require", "super", "await", "async",
];

pub struct JsTsDriver;

impl LanguageDriver for JsTsDriver {
    fn extensions(&self) -> &'static [&'static str] {
        &["js", "jsx", "ts", "tsx", "mjs", "cjs"]
    }

    fn extract_imports(&self, text: &str) -> Vec<String> {
        let mut out: Vec<String> = IMPORT.captures_iter(text).map(|c| c[1].to_string()).collect();
        out.extend(REQUIRE.captures_iter(text).map(|c| c[1].to_string()));
        out
    }

    fn extract_functions(&self, text: &str) -> Vec<ExtractedFunction> {
        let mut out = Vec::new();
        for re in [&*FUNC_DECL, &*ARROW_FUNC, &*METHOD] {
            for cap in re.captures_iter(text) {
                let name = cap[1].to_string();
                let start = cap.get(0).unwrap().start();
                let body = super::extract_braced_body(&text[start..]);
                out.push(ExtractedFunction { name, body });
            }
        }
        out
    }

    fn extract_function_calls(&self, body: &str) -> Vec<String> {
        CALL.captures_iter(body)
            .map(|c| c[1].to_string())
            .filter(|n| !JS_KEYWORDS.contains(&n.as_str()))
            .collect()
    }

    fn resolve_import_path(
        &self,
        import: &str,
        current_file: &Path,
        repo_root: &Path,
    ) -> Option<PathBuf> {
        if !import.starts_with('.') {
            return None;
        }
        let dir = current_file.parent()?;
        let joined = dir.join(import);
        let candidate = joined.canonicalize().unwrap_or(joined);
        if !candidate.starts_with(repo_root) {
            return None;
        }
        for ext in ["ts", "tsx", "js", "jsx"] {
            let with_ext = candidate.with_extension(ext);
            if with_ext.is_file() {
                return Some(with_ext);
            }
            let index = candidate.join(format!("index.{ext}"));
            if index.is_file() {
                return Some(index);
            }
        }
        if candidate.is_file() {
            return Some(candidate);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_es_module_and_commonjs_imports() {
        let d = JsTsDriver;
        let text = "import { foo } from './foo';\nconst bar = require('../bar');\n";
        let imports = d.extract_imports(text);
        assert!(imports.contains(&"./foo".to_string()));
        assert!(imports.contains(&"../bar".to_string()));
    }

    #[test]
    fn extracts_arrow_function_body() {
        let d = JsTsDriver;
        let text = "const helper = (x) => {\n  return x + 1;\n};\n";
        let funcs = d.extract_functions(text);
        assert!(funcs.iter().any(|f| f.name == "helper" && f.body.contains("return")));
    }
}
