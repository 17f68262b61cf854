//! Tree Builder (spec §4.3).
//!
//! Grounded on the teacher's `mapper.rs` for the "compact, deterministic,
//! size-capped" shape (plain recursive walk + `Vec` accumulation, no
//! allocator tricks), generalized from a knowledge-graph node list to a
//! textual indentation tree as spec'd. Breadth-first elision under the size
//! cap is new logic: the teacher elides by char budget in `slicer.rs`, not
//! breadth-first-over-subdirectories.

use crate::ignore_filter::IgnoreFilter;
use std::path::Path;

const SOURCE_EXTENSIONS: &[&str] = &[
    "rs", "py", "js", "ts", "tsx", "jsx", "go", "java", "c", "h", "cpp", "hpp", "cs", "rb", "php",
];

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    depth: usize,
    is_dir: bool,
    children: Vec<Entry>,
}

fn is_source_file(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|ext| SOURCE_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}

fn read_dir_sorted(path: &Path) -> Vec<std::fs::DirEntry> {
    let mut entries: Vec<_> = std::fs::read_dir(path)
        .map(|rd| rd.filter_map(Result::ok).collect())
        .unwrap_or_default();
    entries.sort_by_key(|e| e.file_name());
    entries
}

fn build_entry(path: &Path, rel: &Path, depth: usize, filter: &IgnoreFilter) -> Option<Entry> {
    let name = path.file_name()?.to_string_lossy().into_owned();
    let is_dir = path.is_dir();

    let rel_str = rel.to_string_lossy().replace('\\', "/");
    if !rel_str.is_empty() && filter.is_ignored(&rel_str, is_dir) {
        return None;
    }

    let mut children = Vec::new();
    if is_dir {
        for dent in read_dir_sorted(path) {
            let child_path = dent.path();
            let child_rel = rel.join(dent.file_name());
            if let Some(child) = build_entry(&child_path, &child_rel, depth + 1, filter) {
                children.push(child);
            }
        }
    }

    Some(Entry { name, depth, is_dir, children })
}

fn render(entry: &Entry, out: &mut String) {
    if entry.depth > 0 {
        out.push_str(&"  ".repeat(entry.depth - 1));
        out.push_str(&entry.name);
        if entry.is_dir {
            out.push('/');
        }
        out.push('\n');
    }
    for child in &entry.children {
        render(child, out);
    }
}

/// Counts every line the current tree would render, root excluded.
fn count_lines(entry: &Entry) -> usize {
    let mut count = if entry.depth > 0 { 1 } else { 0 };
    for child in &entry.children {
        count += count_lines(child);
    }
    count
}

/// Drops subdirectories breadth-first (shallowest and rightmost-discovered
/// first) until `entry`'s rendered line count is within `cap`, preferring to
/// keep source files over assets when a directory must be elided (spec
/// §4.3 "preferring to keep source files over assets").
fn elide_breadth_first(entry: &mut Entry, cap: usize) {
    while count_lines(entry) > cap {
        let Some(path) = largest_dir_path(entry) else { break };
        let target = entry_at_mut(entry, &path);
        if target.children.is_empty() {
            break;
        }
        target.children.clear();
    }
}

/// Index path (root-relative) to the directory whose removal frees the most
/// rendered lines, weighting directories that hold only source files as
/// half as costly to elide (kept over assets).
fn largest_dir_path(entry: &Entry) -> Option<Vec<usize>> {
    let mut best: Option<(Vec<usize>, usize)> = None;
    largest_dir_path_rec(entry, &mut Vec::new(), &mut best);
    best.map(|(path, _)| path)
}

fn largest_dir_path_rec(entry: &Entry, path: &mut Vec<usize>, best: &mut Option<(Vec<usize>, usize)>) {
    if entry.depth > 0 && entry.is_dir && !entry.children.is_empty() {
        let size = count_lines(entry);
        let has_only_source = entry.children.iter().all(|c| !c.is_dir && is_source_file(&c.name));
        let weight = if has_only_source { size / 2 } else { size };
        if best.as_ref().map(|(_, w)| weight > *w).unwrap_or(true) {
            *best = Some((path.clone(), weight));
        }
    }
    for (i, child) in entry.children.iter().enumerate() {
        path.push(i);
        largest_dir_path_rec(child, path, best);
        path.pop();
    }
}

fn entry_at_mut<'a>(entry: &'a mut Entry, path: &[usize]) -> &'a mut Entry {
    path.iter().fold(entry, |e, &i| &mut e.children[i])
}

/// Produces the compact textual tree for `root`, capped at `max_lines`
/// (spec §4.3). Deterministic for a given input (entries sorted by name).
pub fn build_tree(root: &Path, filter: &IgnoreFilter, max_lines: usize) -> String {
    let Some(mut entry) = build_entry(root, Path::new(""), 0, filter) else {
        return String::new();
    };
    elide_breadth_first(&mut entry, max_lines);
    let mut out = String::new();
    render(&entry, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn produces_deterministic_sorted_output() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.rs"), "").unwrap();
        fs::write(dir.path().join("a.rs"), "").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/c.rs"), "").unwrap();

        let filter = IgnoreFilter::new(&[]);
        let out1 = build_tree(dir.path(), &filter, 1000);
        let out2 = build_tree(dir.path(), &filter, 1000);
        assert_eq!(out1, out2);
        assert!(out1.find("a.rs").unwrap() < out1.find("b.rs").unwrap());
    }

    #[test]
    fn respects_ignore_filter() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("node_modules")).unwrap();
        fs::write(dir.path().join("node_modules/x.js"), "").unwrap();
        fs::write(dir.path().join("main.rs"), "").unwrap();

        let filter = IgnoreFilter::new(&[]);
        let out = build_tree(dir.path(), &filter, 1000);
        assert!(!out.contains("node_modules"));
        assert!(out.contains("main.rs"));
    }

    #[test]
    fn caps_output_size() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        for i in 0..50 {
            fs::write(dir.path().join("sub").join(format!("file{i}.rs")), "").unwrap();
        }
        let filter = IgnoreFilter::new(&[]);
        let out = build_tree(dir.path(), &filter, 5);
        assert!(!out.is_empty() && out.lines().count() <= 5);
    }
}
