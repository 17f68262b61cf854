//! Collaborator interfaces (spec §6 "Collaborator interfaces"), the seams
//! where the excluded subsystems (auth, RAG, task scheduling) plug in. The
//! core never inspects roles or RAG internals directly — only these traits.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// AuthN/AuthZ collaborator (spec §6 "AuthN/AuthZ").
#[async_trait]
pub trait AccessControl: Send + Sync {
    async fn can_access(&self, repository_id: &str, caller: &str) -> bool;
    async fn can_manage(&self, repository_id: &str, caller: &str) -> bool;
}

/// Grants every caller access to everything; the default when no real auth
/// collaborator is wired in (single-tenant / local deployments).
pub struct AllowAllAccessControl;

#[async_trait]
impl AccessControl for AllowAllAccessControl {
    async fn can_access(&self, _repository_id: &str, _caller: &str) -> bool {
        true
    }
    async fn can_manage(&self, _repository_id: &str, _caller: &str) -> bool {
        true
    }
}

#[derive(Debug, Clone)]
pub struct RagHit {
    pub document_id: String,
    pub content: String,
    pub relevance: f32,
}

/// RAG backend collaborator (spec §6 "RAG backend"). The core calls it as a
/// Tool Surface tool (§4.6 `search`) and during incremental updates.
#[async_trait]
pub trait RagBackend: Send + Sync {
    async fn search(&self, user_id: &str, query: &str, limit: usize, min_relevance: f32) -> Vec<RagHit>;
    async fn index(&self, user_id: &str, content: &str, metadata: serde_json::Value);
    async fn delete(&self, user_id: &str, document_id: &str);
}

/// In-memory substring-matching RAG backend; exercises the Tool Surface's
/// `search` call and incremental-update indexing paths without an external
/// vector store.
#[derive(Default)]
pub struct InMemoryRagBackend {
    documents: Mutex<HashMap<String, Vec<(String, String, serde_json::Value)>>>,
}

#[async_trait]
impl RagBackend for InMemoryRagBackend {
    async fn search(&self, user_id: &str, query: &str, limit: usize, min_relevance: f32) -> Vec<RagHit> {
        let docs = self.documents.lock().expect("rag backend mutex poisoned");
        let Some(user_docs) = docs.get(user_id) else { return Vec::new() };
        let needle = query.to_lowercase();

        let mut hits: Vec<RagHit> = user_docs
            .iter()
            .filter_map(|(id, content, _)| {
                let haystack = content.to_lowercase();
                if !haystack.contains(&needle) {
                    return None;
                }
                let relevance = needle.len() as f32 / content.len().max(1) as f32;
                (relevance >= min_relevance).then(|| RagHit {
                    document_id: id.clone(),
                    content: content.clone(),
                    relevance,
                })
            })
            .collect();

        hits.sort_by(|a, b| b.relevance.partial_cmp(&a.relevance).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        hits
    }

    async fn index(&self, user_id: &str, content: &str, metadata: serde_json::Value) {
        let mut docs = self.documents.lock().expect("rag backend mutex poisoned");
        let id = uuid::Uuid::new_v4().to_string();
        docs.entry(user_id.to_string()).or_default().push((id, content.to_string(), metadata));
    }

    async fn delete(&self, user_id: &str, document_id: &str) {
        let mut docs = self.documents.lock().expect("rag backend mutex poisoned");
        if let Some(user_docs) = docs.get_mut(user_id) {
            user_docs.retain(|(id, _, _)| id != document_id);
        }
    }
}

/// Task queue / scheduler runtime collaborator (spec §6 "Task queue /
/// scheduler runtime"): any mechanism that invokes a named function with
/// arguments; the core only requires eventual execution or retry.
#[async_trait]
pub trait TaskRuntime: Send + Sync {
    async fn dispatch(&self, task_name: &str, payload: serde_json::Value);
}

/// Runs dispatched tasks inline on the calling task via `tokio::spawn`,
/// matching the single-process scheduler assumption in spec §4.12.
pub struct InlineTaskRuntime<F>
where
    F: Fn(String, serde_json::Value) + Send + Sync + 'static,
{
    handler: F,
}

impl<F> InlineTaskRuntime<F>
where
    F: Fn(String, serde_json::Value) + Send + Sync + 'static,
{
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl<F> TaskRuntime for InlineTaskRuntime<F>
where
    F: Fn(String, serde_json::Value) + Send + Sync + 'static,
{
    async fn dispatch(&self, task_name: &str, payload: serde_json::Value) {
        (self.handler)(task_name.to_string(), payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_rag_round_trips_index_and_search() {
        let rag = InMemoryRagBackend::default();
        rag.index("u1", "the quick brown fox", serde_json::json!({})).await;
        let hits = rag.search("u1", "brown", 10, 0.0).await;
        assert_eq!(hits.len(), 1);
        assert!(hits[0].content.contains("brown"));
    }

    #[tokio::test]
    async fn in_memory_rag_delete_removes_document() {
        let rag = InMemoryRagBackend::default();
        rag.index("u1", "alpha beta", serde_json::json!({})).await;
        let hits = rag.search("u1", "alpha", 10, 0.0).await;
        let id = hits[0].document_id.clone();
        rag.delete("u1", &id).await;
        assert!(rag.search("u1", "alpha", 10, 0.0).await.is_empty());
    }
}
