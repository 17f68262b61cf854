//! Ignore Filter (spec §4.2).
//!
//! Directly grounded on the teacher's `scanner.rs` `repomix_default_overrides`
//! + `ignore::WalkBuilder` usage for the actual directory walk. The three
//! pattern attributes (negation, directory-only, anchored) are modeled
//! explicitly here as a small compiled-pattern struct sitting in front of the
//! `ignore` crate's own override builder, so precedence-ordered union
//! semantics are testable independently of whatever `ignore` does by default.

use ignore::overrides::{Override, OverrideBuilder};
use ignore::WalkBuilder;
use regex::Regex;
use std::path::{Path, PathBuf};

const BUILTIN_EXCLUDES: &[&str] = &[
    ".git",
    "node_modules",
    "__pycache__",
    ".vscode",
    ".DS_Store",
    "Thumbs.db",
];

#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pub raw: String,
    regex: Regex,
    pub negation: bool,
    pub directory_only: bool,
    pub anchored: bool,
}

impl CompiledPattern {
    /// Compiles one gitignore-style line into its three attributes plus a
    /// matching regex (spec §4.2 "Each pattern yields a regex with three
    /// attributes: negation, directory-only, anchored").
    pub fn compile(line: &str) -> Option<Self> {
        let raw = line.trim();
        if raw.is_empty() || raw.starts_with('#') {
            return None;
        }

        let negation = raw.starts_with('!');
        let mut pat = if negation { &raw[1..] } else { raw };

        let directory_only = pat.ends_with('/');
        if directory_only {
            pat = &pat[..pat.len() - 1];
        }

        let anchored = pat.contains('/') && !pat.starts_with("**/");
        let pat = pat.trim_start_matches('/');

        let regex = Regex::new(&glob_to_regex(pat, anchored)).ok()?;

        Some(Self { raw: raw.to_string(), regex, negation, directory_only, anchored })
    }

    fn matches(&self, rel_path: &str, is_dir: bool) -> bool {
        if self.directory_only && !is_dir {
            return false;
        }
        self.regex.is_match(rel_path)
    }
}

/// Translates a (simplified) gitignore glob into an anchored or
/// anywhere-in-path regex. Supports `*`, `**`, `?`.
fn glob_to_regex(pat: &str, anchored: bool) -> String {
    let mut out = String::from(if anchored { "^" } else { "(^|/)" });
    let mut chars = pat.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    if chars.peek() == Some(&'/') {
                        chars.next();
                    }
                    out.push_str(".*");
                } else {
                    out.push_str("[^/]*");
                }
            }
            '?' => out.push_str("[^/]"),
            '.' => out.push_str("\\."),
            c if "()+|^$[]{}\\".contains(c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push_str("($|/)");
    out
}

/// Precedence-ordered union of built-ins, user rules, and discovered
/// `.gitignore`/`.ignore` files — later rules override earlier ones.
#[derive(Debug, Clone, Default)]
pub struct IgnoreFilter {
    patterns: Vec<CompiledPattern>,
}

impl IgnoreFilter {
    pub fn new(user_rules: &[String]) -> Self {
        let mut patterns = Vec::new();
        for b in BUILTIN_EXCLUDES {
            if let Some(p) = CompiledPattern::compile(b) {
                patterns.push(p);
            }
        }
        for r in user_rules {
            if let Some(p) = CompiledPattern::compile(r) {
                patterns.push(p);
            }
        }
        Self { patterns }
    }

    /// Appends patterns discovered while walking (a `.gitignore`/`.ignore`
    /// found deeper in the tree), preserving discovery order so later finds
    /// take precedence, matching the spec's "later rules overriding earlier".
    pub fn extend_discovered(&mut self, lines: impl IntoIterator<Item = String>) {
        for line in lines {
            if let Some(p) = CompiledPattern::compile(&line) {
                self.patterns.push(p);
            }
        }
    }

    /// Last matching pattern wins; an unmatched path is kept.
    pub fn is_ignored(&self, rel_path: &str, is_dir: bool) -> bool {
        let mut ignored = false;
        for pattern in &self.patterns {
            if pattern.matches(rel_path, is_dir) {
                ignored = !pattern.negation;
            }
        }
        ignored
    }

    /// Builds an `ignore::overrides::Override` carrying the same built-ins
    /// and user rules, for handing to `ignore::WalkBuilder` the way the
    /// teacher's `repomix_default_overrides` does.
    fn to_ignore_overrides(&self, root: &Path) -> ignore::Result<Override> {
        let mut ob = OverrideBuilder::new(root);
        for d in BUILTIN_EXCLUDES {
            ob.add(&format!("**/{d}"))?;
            ob.add(&format!("**/{d}/**"))?;
        }
        for pattern in &self.patterns {
            let glob = if pattern.negation {
                format!("!{}", pattern.raw.trim_start_matches('!'))
            } else {
                pattern.raw.clone()
            };
            let _ = ob.add(&glob);
        }
        Ok(ob.build()?)
    }
}

#[derive(Debug, Clone)]
pub struct WalkedFile {
    pub abs_path: PathBuf,
    pub rel_path: PathBuf,
    pub bytes: u64,
}

/// Walks `root`, applying `filter` plus the directory's own discovered
/// `.gitignore`/`.ignore` (via `ignore::WalkBuilder::standard_filters`),
/// mirroring the teacher's `scan_workspace`.
pub fn walk(root: &Path, filter: &IgnoreFilter) -> anyhow::Result<Vec<WalkedFile>> {
    let overrides = filter.to_ignore_overrides(root)?;
    let walker = WalkBuilder::new(root).standard_filters(true).overrides(overrides).build();

    let mut out = Vec::new();
    for entry in walker {
        let Ok(dent) = entry else { continue };
        if !dent.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
            continue;
        }
        let abs_path = dent.into_path();
        let Ok(bytes) = std::fs::metadata(&abs_path).map(|m| m.len()) else { continue };
        let Ok(rel_path) = abs_path.strip_prefix(root) else { continue };
        out.push(WalkedFile { abs_path: abs_path.clone(), rel_path: rel_path.to_path_buf(), bytes });
    }
    out.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_excludes_match_anywhere_in_tree() {
        let f = IgnoreFilter::new(&[]);
        assert!(f.is_ignored("node_modules/foo.js", true));
        assert!(f.is_ignored("a/b/node_modules", true));
    }

    #[test]
    fn negation_overrides_earlier_rule() {
        let f = IgnoreFilter::new(&["*.log".to_string(), "!keep.log".to_string()]);
        assert!(f.is_ignored("debug.log", false));
        assert!(!f.is_ignored("keep.log", false));
    }

    #[test]
    fn directory_only_pattern_does_not_match_files() {
        let f = IgnoreFilter::new(&["build/".to_string()]);
        assert!(f.is_ignored("build", true));
        assert!(!f.is_ignored("build", false));
    }

    #[test]
    fn later_rule_wins_on_conflict() {
        let mut f = IgnoreFilter::new(&["*.md".to_string()]);
        assert!(f.is_ignored("README.md", false));
        f.extend_discovered(["!README.md".to_string()]);
        assert!(!f.is_ignored("README.md", false));
    }

    #[test]
    fn anchored_pattern_only_matches_at_root() {
        let f = IgnoreFilter::new(&["/only-root.txt".to_string()]);
        assert!(f.is_ignored("only-root.txt", false));
        assert!(!f.is_ignored("nested/only-root.txt", false));
    }
}
