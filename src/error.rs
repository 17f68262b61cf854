//! Tagged error types for the core (see spec §7 "Propagation").
//!
//! Each component returns one of these tags; the [`crate::orchestrator`] is the
//! sole place that maps a tag to a state transition. Ad-hoc failures that never
//! cross a component boundary stay `anyhow::Error` internally, the same split
//! the teacher crate struck between `thiserror`-free internals and `anyhow` at
//! the edges — except here the edges are component boundaries, not just the
//! binary entry point.

use thiserror::Error;

/// Git Workspace failures (spec §4.1).
#[derive(Debug, Error)]
pub enum GitError {
    #[error("AUTH_REQUIRED: {0}")]
    AuthRequired(String),
    #[error("NOT_FOUND: {0}")]
    NotFound(String),
    #[error("NETWORK: {0}")]
    Network(String),
    #[error("DISK: {0}")]
    Disk(String),
    #[error("SYNC_CONFLICT: {0}")]
    SyncConflict(String),
}

/// LLM Gateway failures (spec §4.5).
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("CONTEXT_OVERFLOW: prompt needs {needed} tokens, budget is {budget}")]
    ContextOverflow { needed: usize, budget: usize },
    #[error("transient provider error ({status}): {message}")]
    Transient { status: u16, message: String },
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("tool-call hop cap ({cap}) exceeded")]
    HopCapExceeded { cap: usize },
    #[error("fatal tool error: {0}")]
    FatalTool(String),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
}

/// Data-integrity failures (spec §7 "Data integrity").
#[derive(Debug, Error)]
pub enum IntegrityError {
    #[error("cycle detected in persisted catalog for repository {repository_id}")]
    CatalogCycle { repository_id: String },
    #[error("PLAN_INVALID: {0}")]
    PlanInvalid(String),
    #[error("duplicate slug {slug:?} under parent {parent:?} in repository {repository_id}")]
    DuplicateSlug {
        repository_id: String,
        parent: Option<String>,
        slug: String,
    },
}

/// Top-level tagged error returned by core components.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Git(#[from] GitError),
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Integrity(#[from] IntegrityError),
    #[error("input/validation error: {0}")]
    Validation(String),
    #[error("permission denied: {0}")]
    Permission(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl CoreError {
    /// True when this error should move the repository straight to FAILED
    /// rather than being retried within the stage (spec §7 "External-resource (fatal)").
    pub fn is_fatal(&self) -> bool {
        match self {
            CoreError::Git(GitError::AuthRequired(_) | GitError::NotFound(_)) => true,
            CoreError::Llm(LlmError::Auth(_) | LlmError::Validation(_)) => true,
            CoreError::Integrity(_) => true,
            CoreError::Validation(_) | CoreError::Permission(_) | CoreError::NotFound(_) => true,
            _ => false,
        }
    }

    /// Short machine-readable reason stored on `Repository.error` (spec §4.11).
    pub fn reason_tag(&self) -> String {
        match self {
            CoreError::Git(e) => match e {
                GitError::AuthRequired(_) => "CLONE_AUTH_REQUIRED".to_string(),
                GitError::NotFound(_) => "CLONE_NOT_FOUND".to_string(),
                GitError::Network(_) => "CLONE_NETWORK".to_string(),
                GitError::Disk(_) => "CLONE_DISK".to_string(),
                GitError::SyncConflict(_) => "SYNC_CONFLICT".to_string(),
            },
            CoreError::Llm(LlmError::ContextOverflow { .. }) => "CONTEXT_OVERFLOW".to_string(),
            CoreError::Integrity(IntegrityError::PlanInvalid(_)) => "PLAN_INVALID".to_string(),
            CoreError::Integrity(IntegrityError::CatalogCycle { .. }) => "CATALOG_CYCLE".to_string(),
            CoreError::Integrity(IntegrityError::DuplicateSlug { .. }) => "DUPLICATE_SLUG".to_string(),
            _ => "INTERNAL".to_string(),
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_auth_required_is_fatal_and_tagged() {
        let e: CoreError = GitError::AuthRequired("no creds".to_string()).into();
        assert!(e.is_fatal());
        assert_eq!(e.reason_tag(), "CLONE_AUTH_REQUIRED");
    }

    #[test]
    fn clone_network_is_retryable_not_fatal() {
        let e: CoreError = GitError::Network("timed out".to_string()).into();
        assert!(!e.is_fatal());
        assert_eq!(e.reason_tag(), "CLONE_NETWORK");
    }

    #[test]
    fn llm_context_overflow_is_tagged_but_not_fatal() {
        let e: CoreError = LlmError::ContextOverflow { needed: 9000, budget: 8000 }.into();
        assert!(!e.is_fatal());
        assert_eq!(e.reason_tag(), "CONTEXT_OVERFLOW");
    }

    #[test]
    fn integrity_errors_are_always_fatal() {
        let e: CoreError = IntegrityError::CatalogCycle { repository_id: "r1".to_string() }.into();
        assert!(e.is_fatal());
        assert_eq!(e.reason_tag(), "CATALOG_CYCLE");
    }

    #[test]
    fn validation_permission_not_found_are_fatal() {
        assert!(CoreError::Validation("bad input".to_string()).is_fatal());
        assert!(CoreError::Permission("nope".to_string()).is_fatal());
        assert!(CoreError::NotFound("missing".to_string()).is_fatal());
    }
}
