//! Tool Surface (spec §4.6): the file-read, file-info, tree, dependency-lookup,
//! and RAG-search capabilities exposed to the LLM during Section Generator
//! runs. Grounded on the teacher's `slicer.rs` path-bounded file-read helpers
//! and `llm::tool_loop::ToolDispatcher`, which this module implements.

use crate::collaborators::RagBackend;
use crate::deps::{self, WorkspaceIndex};
use crate::error::CoreError;
use crate::ignore_filter::IgnoreFilter;
use crate::llm::tool_loop::{ToolDispatcher, ToolError};
use crate::llm::{ToolCall, ToolDef};
use crate::tree_builder;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::time::UNIX_EPOCH;

/// Files over this size (spec §4.6 "default 100 KiB") must be read via
/// `read_file_lines` instead of `read_files`.
pub const READ_FILES_SIZE_THRESHOLD: u64 = 100 * 1024;

/// `read_file_lines`'s per-item cap (spec §4.6 "limit caps at 200").
pub const READ_FILE_LINES_LIMIT: usize = 200;

/// Tool-call argument/result plumbing for the Section Generator's agentic
/// loop. Every call records which files it touched; `touched_files()` drains
/// that list to seed `FileItemSource` rows for the active CatalogNode (spec
/// §4.6 "the recorded list seeds FileItemSource rows").
pub struct ToolSurface {
    repo_root: PathBuf,
    filter: IgnoreFilter,
    index: Arc<WorkspaceIndex>,
    rag: Arc<dyn RagBackend>,
    rag_user_id: String,
    touched: Mutex<Vec<String>>,
}

impl ToolSurface {
    pub fn new(
        repo_root: impl Into<PathBuf>,
        filter: IgnoreFilter,
        index: Arc<WorkspaceIndex>,
        rag: Arc<dyn RagBackend>,
        rag_user_id: impl Into<String>,
    ) -> Self {
        Self {
            repo_root: repo_root.into(),
            filter,
            index,
            rag,
            rag_user_id: rag_user_id.into(),
            touched: Mutex::new(Vec::new()),
        }
    }

    /// Drains the list of files touched since the last drain.
    pub fn touched_files(&self) -> Vec<String> {
        std::mem::take(&mut self.touched.lock().expect("tool surface mutex poisoned"))
    }

    fn record_touch(&self, rel_path: &str) {
        self.touched.lock().expect("tool surface mutex poisoned").push(rel_path.to_string());
    }

    /// Resolves a caller-supplied relative path against `repo_root`, refusing
    /// any path that escapes it (mirrors `git::read_file`'s traversal guard).
    fn resolve(&self, rel_path: &str) -> Option<PathBuf> {
        let candidate = self.repo_root.join(rel_path);
        let canon_root = self.repo_root.canonicalize().ok()?;
        let canon_candidate = candidate.canonicalize().ok()?;
        canon_candidate.starts_with(&canon_root).then_some(canon_candidate)
    }

    /// Tool definitions advertised to the LLM Gateway (spec §4.6).
    pub fn tool_defs() -> Vec<ToolDef> {
        vec![
            ToolDef {
                name: "file_info".into(),
                description: "Returns name, size, extension, total_lines, mtime for each path, or \"not found\".".into(),
                parameters: json!({
                    "type": "object",
                    "properties": { "paths": { "type": "array", "items": { "type": "string" } } },
                    "required": ["paths"]
                }),
            },
            ToolDef {
                name: "read_files".into(),
                description: "Returns the content of each path. Files over 100 KiB return a sentinel instructing the caller to use read_file_lines instead.".into(),
                parameters: json!({
                    "type": "object",
                    "properties": { "paths": { "type": "array", "items": { "type": "string" } } },
                    "required": ["paths"]
                }),
            },
            ToolDef {
                name: "read_file_lines".into(),
                description: "Returns concatenated line-numbered output for each {path, offset, limit} item. offset is zero-based; limit caps at 200.".into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "items": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "path": { "type": "string" },
                                    "offset": { "type": "integer" },
                                    "limit": { "type": "integer" }
                                },
                                "required": ["path"]
                            }
                        }
                    },
                    "required": ["items"]
                }),
            },
            ToolDef {
                name: "get_tree".into(),
                description: "Returns the compact directory listing for the repository.".into(),
                parameters: json!({ "type": "object", "properties": {} }),
            },
            ToolDef {
                name: "analyze_file_dependencies".into(),
                description: "Returns the import/dependency tree rooted at the given file.".into(),
                parameters: json!({
                    "type": "object",
                    "properties": { "path": { "type": "string" } },
                    "required": ["path"]
                }),
            },
            ToolDef {
                name: "analyze_function_dependencies".into(),
                description: "Returns the call tree rooted at the named function in the given file.".into(),
                parameters: json!({
                    "type": "object",
                    "properties": { "path": { "type": "string" }, "name": { "type": "string" } },
                    "required": ["path", "name"]
                }),
            },
            ToolDef {
                name: "search".into(),
                description: "Searches the RAG backend for passages relevant to the query.".into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "query": { "type": "string" },
                        "limit": { "type": "integer" },
                        "min_relevance": { "type": "number" }
                    },
                    "required": ["query"]
                }),
            },
        ]
    }

    fn file_info(&self, paths: &[String]) -> Value {
        let mut out = serde_json::Map::new();
        for path in paths {
            let Some(abs) = self.resolve(path) else {
                out.insert(path.clone(), json!("not found"));
                continue;
            };
            let Ok(meta) = std::fs::metadata(&abs) else {
                out.insert(path.clone(), json!("not found"));
                continue;
            };
            let total_lines = std::fs::read_to_string(&abs).map(|s| s.lines().count()).unwrap_or(0);
            let mtime = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs())
                .unwrap_or(0);
            let name = abs.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            let extension = abs.extension().map(|e| e.to_string_lossy().into_owned()).unwrap_or_default();
            out.insert(
                path.clone(),
                json!({ "name": name, "size": meta.len(), "extension": extension, "total_lines": total_lines, "mtime": mtime }),
            );
            self.record_touch(path);
        }
        Value::Object(out)
    }

    fn read_files(&self, paths: &[String]) -> Value {
        let mut out = serde_json::Map::new();
        for path in paths {
            let Some(abs) = self.resolve(path) else {
                out.insert(path.clone(), json!("not found"));
                continue;
            };
            let Ok(meta) = std::fs::metadata(&abs) else {
                out.insert(path.clone(), json!("not found"));
                continue;
            };
            if meta.len() > READ_FILES_SIZE_THRESHOLD {
                out.insert(
                    path.clone(),
                    json!(format!(
                        "file is {} bytes, over the {} byte threshold; use read_file_lines instead",
                        meta.len(),
                        READ_FILES_SIZE_THRESHOLD
                    )),
                );
                continue;
            }
            match std::fs::read_to_string(&abs) {
                Ok(content) => {
                    out.insert(path.clone(), json!(content));
                    self.record_touch(path);
                }
                Err(_) => {
                    out.insert(path.clone(), json!("not found"));
                }
            }
        }
        Value::Object(out)
    }

    fn read_file_lines(&self, items: &[Value]) -> Value {
        let mut rendered = String::new();
        for item in items {
            let Some(path) = item["path"].as_str() else { continue };
            let offset = item["offset"].as_u64().unwrap_or(0) as usize;
            let limit = (item["limit"].as_u64().unwrap_or(READ_FILE_LINES_LIMIT as u64) as usize).min(READ_FILE_LINES_LIMIT);

            let Some(abs) = self.resolve(path) else {
                rendered.push_str(&format!("=== {path} ===\nnot found\n"));
                continue;
            };
            let Ok(content) = std::fs::read_to_string(&abs) else {
                rendered.push_str(&format!("=== {path} ===\nnot found\n"));
                continue;
            };

            rendered.push_str(&format!("=== {path} ===\n"));
            // Edge case (spec §8 boundary): offset + limit past end returns
            // the available tail without error.
            for (i, line) in content.lines().enumerate().skip(offset).take(limit) {
                rendered.push_str(&format!("{:>6}| {}\n", i + 1, line));
            }
            self.record_touch(path);
        }
        json!(rendered)
    }

    fn get_tree(&self) -> Value {
        let tree = tree_builder::build_tree(&self.repo_root, &self.filter, crate::config::GenerationConfig::default().tree_size_cap);
        json!(tree)
    }

    fn analyze_file_dependencies(&self, path: &str) -> Value {
        let Some(abs) = self.resolve(path) else { return json!("not found") };
        self.record_touch(path);
        let tree = deps::analyze_file(&self.index, &abs, deps::DEFAULT_MAX_DEPTH);
        serde_json::to_value(tree).unwrap_or(Value::Null)
    }

    fn analyze_function_dependencies(&self, path: &str, name: &str) -> Value {
        let Some(abs) = self.resolve(path) else { return json!("not found") };
        self.record_touch(path);
        let tree = deps::analyze_function(&self.index, &abs, name, deps::DEFAULT_MAX_DEPTH);
        serde_json::to_value(tree).unwrap_or(Value::Null)
    }

    async fn search(&self, query: &str, limit: usize, min_relevance: f32) -> Value {
        let hits = self.rag.search(&self.rag_user_id, query, limit, min_relevance).await;
        json!(hits
            .into_iter()
            .map(|h| json!({ "document_id": h.document_id, "content": h.content, "relevance": h.relevance }))
            .collect::<Vec<_>>())
    }
}

#[async_trait]
impl ToolDispatcher for ToolSurface {
    async fn dispatch(&self, call: &ToolCall) -> Result<Value, ToolError> {
        let args = &call.arguments;
        match call.name.as_str() {
            "file_info" => {
                let paths = string_array(&args["paths"]);
                Ok(self.file_info(&paths))
            }
            "read_files" => {
                let paths = string_array(&args["paths"]);
                Ok(self.read_files(&paths))
            }
            "read_file_lines" => {
                let items = args["items"].as_array().cloned().unwrap_or_default();
                Ok(self.read_file_lines(&items))
            }
            "get_tree" => Ok(self.get_tree()),
            "analyze_file_dependencies" => {
                let path = args["path"].as_str().ok_or_else(|| ToolError { message: "missing path".into(), fatal: false })?;
                Ok(self.analyze_file_dependencies(path))
            }
            "analyze_function_dependencies" => {
                let path = args["path"].as_str().ok_or_else(|| ToolError { message: "missing path".into(), fatal: false })?;
                let name = args["name"].as_str().ok_or_else(|| ToolError { message: "missing name".into(), fatal: false })?;
                Ok(self.analyze_function_dependencies(path, name))
            }
            "search" => {
                let query = args["query"].as_str().unwrap_or_default();
                let limit = args["limit"].as_u64().unwrap_or(10) as usize;
                let min_relevance = args["min_relevance"].as_f64().unwrap_or(0.0) as f32;
                Ok(self.search(query, limit, min_relevance).await)
            }
            other => Err(ToolError { message: format!("unknown tool: {other}"), fatal: true }),
        }
    }
}

fn string_array(v: &Value) -> Vec<String> {
    v.as_array()
        .map(|arr| arr.iter().filter_map(|p| p.as_str().map(String::from)).collect())
        .unwrap_or_default()
}

impl From<CoreError> for ToolError {
    fn from(e: CoreError) -> Self {
        ToolError { message: e.to_string(), fatal: e.is_fatal() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::InMemoryRagBackend;
    use std::fs;

    fn sample_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("main.py"), "import util\n\ndef main():\n    util.run()\n").unwrap();
        fs::write(dir.path().join("util.py"), "def run():\n    pass\n").unwrap();
        dir
    }

    fn surface(root: &Path) -> ToolSurface {
        ToolSurface::new(
            root.to_path_buf(),
            IgnoreFilter::new(&[]),
            Arc::new(WorkspaceIndex::new(root.to_path_buf())),
            Arc::new(InMemoryRagBackend::default()),
            "u1",
        )
    }

    #[test]
    fn file_info_reports_not_found_for_missing_path() {
        let dir = sample_repo();
        let ts = surface(dir.path());
        let result = ts.file_info(&["missing.py".to_string()]);
        assert_eq!(result["missing.py"], json!("not found"));
    }

    #[test]
    fn read_files_returns_content_and_records_touch() {
        let dir = sample_repo();
        let ts = surface(dir.path());
        let result = ts.read_files(&["main.py".to_string()]);
        assert!(result["main.py"].as_str().unwrap().contains("import util"));
        assert_eq!(ts.touched_files(), vec!["main.py".to_string()]);
    }

    #[test]
    fn read_file_lines_past_end_returns_available_tail() {
        let dir = sample_repo();
        let ts = surface(dir.path());
        let items = vec![json!({ "path": "util.py", "offset": 10, "limit": 50 })];
        let result = ts.read_file_lines(&items);
        assert!(result.as_str().unwrap().contains("=== util.py ==="));
    }

    #[test]
    fn resolve_rejects_path_traversal() {
        let dir = sample_repo();
        let ts = surface(dir.path());
        assert!(ts.resolve("../../etc/passwd").is_none());
    }
}
