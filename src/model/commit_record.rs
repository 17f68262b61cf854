use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-repository changelog entry produced during incremental updates
/// (spec §3 "CommitRecord", §4.11 "Incremental update").
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CommitRecord {
    pub id: Uuid,
    pub repository_id: Uuid,
    pub hash: String,
    pub author: String,
    pub message: String,
    pub committed_at: DateTime<Utc>,
}
