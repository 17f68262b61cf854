use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stage of the pipeline state machine (spec §4.11).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RepositoryStatus {
    Pending,
    Cloning,
    Cloned,
    Classified,
    Outlined,
    Generating,
    Completed,
    Failed,
}

impl RepositoryStatus {
    /// True once the workspace has been cloned (spec §3 "`version` is
    /// non-empty iff `status` has passed CLONED").
    pub fn has_passed_cloned(self) -> bool {
        !matches!(self, RepositoryStatus::Pending | RepositoryStatus::Cloning)
    }
}

impl std::fmt::Display for RepositoryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RepositoryStatus::Pending => "pending",
            RepositoryStatus::Cloning => "cloning",
            RepositoryStatus::Cloned => "cloned",
            RepositoryStatus::Classified => "classified",
            RepositoryStatus::Outlined => "outlined",
            RepositoryStatus::Generating => "generating",
            RepositoryStatus::Completed => "completed",
            RepositoryStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// The primary aggregate (spec §3 "Repository").
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RepositoryRow {
    pub id: Uuid,
    pub organization: String,
    pub name: String,
    pub branch: String,
    /// Canonicalised clone URL, credentials stripped.
    pub address: String,
    /// Optional stored credentials; never logged, only used at clone time.
    pub username: Option<String>,
    pub token: Option<String>,
    pub status: RepositoryStatus,
    /// Last processed commit hash; empty until CLONED.
    pub version: Option<String>,
    /// Last failure reason tag (see `crate::error::CoreError::reason_tag`).
    pub error: Option<String>,
    /// Consecutive FAILED transitions; the cleanup sweep stops demoting a
    /// repository back to PENDING once this reaches the configured threshold.
    pub failure_count: i32,
    /// User-supplied guidance threaded into planner/generator prompts.
    pub prompt: Option<String>,
    /// Surfaced by list/detail endpoints; has no effect on the pipeline.
    pub recommended: bool,
    pub views: i64,
    pub classification: Option<String>,
    /// Stored compact directory listing (spec §4.3 output).
    pub optimized_tree: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RepositoryRow {
    pub fn triple(&self) -> (&str, &str, &str) {
        (&self.organization, &self.name, &self.branch)
    }

    /// Enforces the invariant from spec §3: `version` must be present once
    /// the repository has moved past CLONED.
    pub fn version_invariant_holds(&self) -> bool {
        if self.status.has_passed_cloned() {
            self.version.as_deref().is_some_and(|v| !v.is_empty())
        } else {
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: RepositoryStatus, version: Option<&str>) -> RepositoryRow {
        let now = Utc::now();
        RepositoryRow {
            id: Uuid::new_v4(),
            organization: "acme".to_string(),
            name: "toy".to_string(),
            branch: "main".to_string(),
            address: "https://example.com/acme/toy.git".to_string(),
            username: None,
            token: None,
            status,
            version: version.map(str::to_string),
            error: None,
            failure_count: 0,
            prompt: None,
            recommended: false,
            views: 0,
            classification: None,
            optimized_tree: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn pending_and_cloning_have_not_passed_cloned() {
        assert!(!RepositoryStatus::Pending.has_passed_cloned());
        assert!(!RepositoryStatus::Cloning.has_passed_cloned());
        assert!(RepositoryStatus::Cloned.has_passed_cloned());
        assert!(RepositoryStatus::Completed.has_passed_cloned());
    }

    #[test]
    fn version_invariant_holds_before_cloned_regardless_of_version() {
        assert!(row(RepositoryStatus::Pending, None).version_invariant_holds());
        assert!(row(RepositoryStatus::Cloning, None).version_invariant_holds());
    }

    #[test]
    fn version_invariant_requires_nonempty_version_past_cloned() {
        assert!(!row(RepositoryStatus::Cloned, None).version_invariant_holds());
        assert!(!row(RepositoryStatus::Completed, Some("")).version_invariant_holds());
        assert!(row(RepositoryStatus::Cloned, Some("abc123")).version_invariant_holds());
    }

    #[test]
    fn triple_returns_organization_name_branch() {
        let r = row(RepositoryStatus::Pending, None);
        assert_eq!(r.triple(), ("acme", "toy", "main"));
    }
}
