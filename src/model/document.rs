use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One per repository after OUTLINED (spec §3 "Document").
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Document {
    pub id: Uuid,
    pub repository_id: Uuid,
    /// Generated README/overview text, cleaned of `<blog>`/HTML wrappers (§4.10).
    pub overview: String,
    pub description: String,
    pub completed_leaves: i64,
    pub total_leaves: i64,
    /// Mini-map tree serialized as JSON `{title, url, children}` (§4.10).
    pub mini_map: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn is_complete(&self) -> bool {
        self.total_leaves > 0 && self.completed_leaves >= self.total_leaves
    }
}
