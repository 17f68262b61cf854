//! Persisted entities (spec §3 "Data Model").
//!
//! Each struct here derives `sqlx::FromRow` rather than routing through a
//! heavier ORM, matching the teacher's preference for hand-parsed structs
//! (`serde_json::from_str` in `config.rs`) over macro-generated query layers.

pub mod catalog_node;
mod commit_record;
mod dependency_tree;
mod document;
mod file_item;
mod repository;

pub use catalog_node::{CatalogNode, CatalogTreeNode};
pub use commit_record::CommitRecord;
pub use dependency_tree::{DependencyNode, DependencyNodeKind, DependencyTree};
pub use document::Document;
pub use file_item::{FileItem, FileItemSource};
pub use repository::{RepositoryRow, RepositoryStatus};
