//! Per-language regex drivers (spec §4.4).

mod c_cpp;
mod csharp;
mod go;
mod java;
mod js_ts;
mod python;

use crate::deps::ExtractedFunction;

/// Shared interface every language driver implements — a direct rename of
/// the teacher's `LanguageDriver` trait methods to the spec's regex-based
/// contract.
pub trait LanguageDriver: Send + Sync {
    fn extensions(&self) -> &'static [&'static str];
    fn extract_imports(&self, text: &str) -> Vec<String>;
    fn extract_functions(&self, text: &str) -> Vec<ExtractedFunction>;
    fn extract_function_calls(&self, body: &str) -> Vec<String>;
    /// Resolves an import string relative to `current_file` against files
    /// actually present under `repo_root`; returns `None` when the import
    /// names an external package rather than a workspace-local file.
    fn resolve_import_path(
        &self,
        import: &str,
        current_file: &std::path::Path,
        repo_root: &std::path::Path,
    ) -> Option<std::path::PathBuf>;
    fn get_function_line_number(&self, text: &str, name: &str) -> Option<usize> {
        for (i, line) in text.lines().enumerate() {
            if line.contains(name) && looks_like_def(line, name) {
                return Some(i + 1);
            }
        }
        None
    }
}

/// Scans forward from the first `{` to its matching close, tolerant of
/// nesting; best-effort, shared by the brace-delimited-body languages
/// (Go, Java, C#, C/C++, JS/TS).
pub(crate) fn extract_braced_body(text: &str) -> String {
    let Some(start) = text.find('{') else { return String::new() };
    let mut depth = 0i32;
    for (i, c) in text[start..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return text[start..start + i + 1].to_string();
                }
            }
            _ => {}
        }
    }
    String::new()
}

fn looks_like_def(line: &str, name: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.contains(name)
        && (trimmed.starts_with("fn ")
            || trimmed.starts_with("def ")
            || trimmed.starts_with("func ")
            || trimmed.starts_with("function ")
            || trimmed.contains("function ")
            || trimmed.contains(" fn ")
            || trimmed.contains("public ")
            || trimmed.contains("private ")
            || trimmed.contains("static "))
}

/// Returns the driver registered for `extension`, if any (spec §4.4's
/// explicit six-language list: C/C++, C#, Go, Java, JavaScript/TypeScript,
/// Python).
pub fn driver_for_extension(extension: &str) -> Option<Box<dyn LanguageDriver>> {
    let drivers: Vec<Box<dyn LanguageDriver>> = vec![
        Box::new(c_cpp::CDriver),
        Box::new(csharp::CSharpDriver),
        Box::new(go::GoDriver),
        Box::new(java::JavaDriver),
        Box::new(js_ts::JsTsDriver),
        Box::new(python::PythonDriver),
    ];
    drivers.into_iter().find(|d| d.extensions().contains(&extension))
}
