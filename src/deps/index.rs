//! Lazy, build-once workspace index (spec §4.4 "Initialisation is lazy").
//!
//! Grounded on the teacher's `vector_store.rs` `CodebaseIndex` pattern: walk
//! the workspace once on first use, then answer every later query from the
//! in-memory maps.

use super::drivers::{driver_for_extension, LanguageDriver};
use super::ExtractedFunction;
use crate::ignore_filter::{self, IgnoreFilter};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

struct FileRecord {
    imports: Vec<String>,
    functions: Vec<ExtractedFunction>,
    text: String,
}

pub struct WorkspaceIndex {
    repo_root: PathBuf,
    files: OnceLock<HashMap<PathBuf, FileRecord>>,
    /// function name -> files that declare a function with that name.
    function_locations: OnceLock<HashMap<String, Vec<PathBuf>>>,
}

impl WorkspaceIndex {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self { repo_root: repo_root.into(), files: OnceLock::new(), function_locations: OnceLock::new() }
    }

    fn driver_for(path: &Path) -> Option<Box<dyn LanguageDriver>> {
        let ext = path.extension()?.to_str()?;
        driver_for_extension(ext)
    }

    fn ensure_built(&self) -> &HashMap<PathBuf, FileRecord> {
        self.files.get_or_init(|| {
            let filter = IgnoreFilter::new(&[]);
            let walked = ignore_filter::walk(&self.repo_root, &filter).unwrap_or_default();

            let mut files = HashMap::new();
            for entry in walked {
                let Some(driver) = Self::driver_for(&entry.abs_path) else { continue };
                let Ok(text) = std::fs::read_to_string(&entry.abs_path) else { continue };
                let imports = driver.extract_imports(&text);
                let functions = driver.extract_functions(&text);
                files.insert(entry.abs_path, FileRecord { imports, functions, text });
            }
            files
        })
    }

    fn ensure_function_locations(&self) -> &HashMap<String, Vec<PathBuf>> {
        self.function_locations.get_or_init(|| {
            let files = self.ensure_built();
            let mut map: HashMap<String, Vec<PathBuf>> = HashMap::new();
            for (path, record) in files {
                for func in &record.functions {
                    map.entry(func.name.clone()).or_default().push(path.clone());
                }
            }
            map
        })
    }

    pub fn imports_of(&self, file: &Path) -> Option<Vec<String>> {
        self.ensure_built().get(file).map(|r| r.imports.clone())
    }

    pub fn resolve_import(&self, current_file: &Path, import: &str) -> Option<PathBuf> {
        let driver = Self::driver_for(current_file)?;
        driver.resolve_import_path(import, current_file, &self.repo_root)
    }

    pub fn function_line(&self, file: &Path, name: &str) -> Option<usize> {
        let driver = Self::driver_for(file)?;
        let record = self.ensure_built().get(file)?;
        driver.get_function_line_number(&record.text, name)
    }

    /// Calls made from the named function's body, per spec §4.4's
    /// `extract_function_calls`.
    pub fn calls_of(&self, file: &Path, function_name: &str) -> Option<Vec<String>> {
        let driver = Self::driver_for(file)?;
        let record = self.ensure_built().get(file)?;
        let func = record.functions.iter().find(|f| f.name == function_name)?;
        Some(driver.extract_function_calls(&func.body))
    }

    /// Callee resolution order per spec §4.4: enclosing file, then imported
    /// files, then all indexed files; returns every file declaring a
    /// matching function name so the caller can detect ambiguity.
    pub fn locate_function(&self, enclosing_file: &Path, name: &str) -> Vec<PathBuf> {
        let files = self.ensure_built();

        if let Some(record) = files.get(enclosing_file) {
            if record.functions.iter().any(|f| f.name == name) {
                return vec![enclosing_file.to_path_buf()];
            }
        }

        if let Some(imports) = self.imports_of(enclosing_file) {
            for import in imports {
                if let Some(resolved) = self.resolve_import(enclosing_file, &import) {
                    if let Some(record) = files.get(&resolved) {
                        if record.functions.iter().any(|f| f.name == name) {
                            return vec![resolved];
                        }
                    }
                }
            }
        }

        self.ensure_function_locations().get(name).cloned().unwrap_or_default()
    }
}
