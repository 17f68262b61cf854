//! Dependency Analyzer (spec §4.4).
//!
//! Grounded on the teacher's `inspector.rs` `LanguageDriver` trait + registry
//! pattern — kept the trait-per-language shape, but drivers here are
//! regex-based (spec §4.4's "best-effort imprecision is allowed") rather than
//! tree-sitter-based. The lazy-init, walk-once-then-serve-from-memory shape
//! is grounded on the teacher's `vector_store.rs` `CodebaseIndex` pattern:
//! a build-once index object queried repeatedly.

mod drivers;
mod index;

pub use drivers::LanguageDriver;
pub use index::WorkspaceIndex;

use crate::model::{DependencyNode, DependencyNodeKind, DependencyTree};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub const DEFAULT_MAX_DEPTH: usize = 10;

#[derive(Debug, Clone)]
pub struct ExtractedFunction {
    pub name: String,
    pub body: String,
}

/// `analyze_file(file) → DependencyTree` (spec §4.4).
pub fn analyze_file(index: &WorkspaceIndex, file: &Path, max_depth: usize) -> DependencyTree {
    let mut path_stack = HashSet::new();
    let root = build_file_node(index, file, 0, max_depth, &mut path_stack);
    DependencyTree { root }
}

fn build_file_node(
    index: &WorkspaceIndex,
    file: &Path,
    depth: usize,
    max_depth: usize,
    path_stack: &mut HashSet<PathBuf>,
) -> DependencyNode {
    let full_path = file.to_string_lossy().into_owned();

    if path_stack.contains(file) {
        return DependencyNode {
            kind: DependencyNodeKind::File,
            name: file_label(file),
            full_path,
            line_number: None,
            is_cyclic: true,
            children: Vec::new(),
        };
    }

    let mut node = DependencyNode {
        kind: DependencyNodeKind::File,
        name: file_label(file),
        full_path: full_path.clone(),
        line_number: None,
        is_cyclic: false,
        children: Vec::new(),
    };

    if depth >= max_depth {
        return node;
    }

    path_stack.insert(file.to_path_buf());

    if let Some(imports) = index.imports_of(file) {
        for import in imports {
            if let Some(resolved) = index.resolve_import(file, &import) {
                node.children.push(build_file_node(index, &resolved, depth + 1, max_depth, path_stack));
            }
        }
    }

    path_stack.remove(file);
    node
}

/// `analyze_function(file, name) → DependencyTree` (spec §4.4).
pub fn analyze_function(
    index: &WorkspaceIndex,
    file: &Path,
    function_name: &str,
    max_depth: usize,
) -> DependencyTree {
    let line_number = index.function_line(file, function_name);
    let mut path_stack = HashSet::new();
    let key = (file.to_path_buf(), function_name.to_string());
    path_stack.insert(key.clone());

    let mut root = DependencyNode {
        kind: DependencyNodeKind::Function,
        name: function_name.to_string(),
        full_path: file.to_string_lossy().into_owned(),
        line_number,
        is_cyclic: false,
        children: Vec::new(),
    };

    if let Some(calls) = index.calls_of(file, function_name) {
        let mut visiting = HashSet::new();
        visiting.insert(key);
        for callee in calls {
            root.children.push(resolve_callee(index, file, &callee, 1, max_depth, &mut visiting));
        }
    }

    DependencyTree { root }
}

fn resolve_callee(
    index: &WorkspaceIndex,
    current_file: &Path,
    callee: &str,
    depth: usize,
    max_depth: usize,
    visiting: &mut HashSet<(PathBuf, String)>,
) -> DependencyNode {
    // Callee resolution order per spec §4.4: enclosing file, then imported
    // files, then all indexed files; ambiguous names are kept as leaf stubs.
    let candidates = index.locate_function(current_file, callee);

    let resolved_file = match candidates.as_slice() {
        [single] => Some(single.clone()),
        _ => None,
    };

    let Some(resolved_file) = resolved_file else {
        return DependencyNode::leaf_stub(callee, current_file.to_string_lossy());
    };

    let key = (resolved_file.clone(), callee.to_string());
    if visiting.contains(&key) {
        return DependencyNode {
            kind: DependencyNodeKind::Function,
            name: callee.to_string(),
            full_path: resolved_file.to_string_lossy().into_owned(),
            line_number: index.function_line(&resolved_file, callee),
            is_cyclic: true,
            children: Vec::new(),
        };
    }

    let mut node = DependencyNode {
        kind: DependencyNodeKind::Function,
        name: callee.to_string(),
        full_path: resolved_file.to_string_lossy().into_owned(),
        line_number: index.function_line(&resolved_file, callee),
        is_cyclic: false,
        children: Vec::new(),
    };

    if depth >= max_depth {
        return node;
    }

    visiting.insert(key.clone());
    if let Some(calls) = index.calls_of(&resolved_file, callee) {
        for next in calls {
            node.children.push(resolve_callee(index, &resolved_file, &next, depth + 1, max_depth, visiting));
        }
    }
    visiting.remove(&key);

    node
}

fn file_label(file: &Path) -> String {
    file.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| file.to_string_lossy().into_owned())
}
