use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The generated markdown for a CatalogNode leaf (spec §3 "FileItem").
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FileItem {
    pub id: Uuid,
    /// One-to-one with the owning leaf `CatalogNode`.
    pub catalog_node_id: Uuid,
    pub title: String,
    pub content: String,
    pub request_tokens: i64,
    pub response_tokens: i64,
    pub size: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A citation recorded by the Tool Surface while generating a FileItem
/// (spec §3 "FileItemSource", §4.6 "each call records which files were touched").
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FileItemSource {
    pub id: Uuid,
    pub file_item_id: Uuid,
    pub file_path: String,
    pub line_start: Option<i32>,
    pub line_end: Option<i32>,
}
