//! Pipeline Orchestrator (spec §4.11): the repository state machine that
//! drives C1–C10 in order, persists checkpoints, and handles resume and
//! incremental updates.
//!
//! Grounded on the original Python source's `warehouse_service.py` state
//! transitions (PENDING → PROCESSING → COMPLETED, with incremental update
//! via `pull_repository`), translated into the richer CLONED/CLASSIFIED/
//! OUTLINED/GENERATING granularity spec'd in §4.11. Each transition below
//! is one committed `Store` update, matching §5's "updated transactionally
//! per stage".

use crate::classifier::{self, Classification};
use crate::collaborators::RagBackend;
use crate::config::Config;
use crate::deps::WorkspaceIndex;
use crate::error::{CoreError, CoreResult};
use crate::git::{self, Credentials};
use crate::ignore_filter::IgnoreFilter;
use crate::llm::LlmGateway;
use crate::model::catalog_node::build_forest;
use crate::model::{CatalogNode, CommitRecord, Document, FileItem, FileItemSource, RepositoryRow, RepositoryStatus};
use crate::outline;
use crate::overview;
use crate::section_generator::{self, GeneratedSection};
use crate::store::Store;
use crate::tools::ToolSurface;
use crate::tree_builder;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub struct Orchestrator {
    store: Store,
    config: Config,
    gateway: Arc<LlmGateway>,
    rag: Arc<dyn RagBackend>,
}

impl Orchestrator {
    pub fn new(store: Store, config: Config, gateway: Arc<LlmGateway>, rag: Arc<dyn RagBackend>) -> Self {
        Self { store, config, gateway, rag }
    }

    /// Exposes the store so the Scheduler's sweeps can select eligible
    /// repositories without duplicating query logic.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Drives one repository forward from its current status, re-entering
    /// at the earliest incomplete stage (spec §4.11 "Restart after crash
    /// re-enters at the earliest stage whose outputs are incomplete — never
    /// re-runs a completed stage.").
    #[instrument(skip(self), fields(repository_id = %repository_id))]
    pub async fn run(&self, repository_id: Uuid) -> CoreResult<()> {
        loop {
            let repo = self
                .store
                .get_repository(repository_id)
                .await?
                .ok_or_else(|| CoreError::NotFound(format!("repository {repository_id}")))?;

            match repo.status {
                RepositoryStatus::Pending | RepositoryStatus::Cloning => {
                    if let Err(e) = self.stage_clone(&repo).await {
                        self.fail(repository_id, &e).await?;
                        return Err(e);
                    }
                }
                RepositoryStatus::Cloned => {
                    // Non-fatal by spec: classification failure never fails the pipeline.
                    self.stage_classify(&repo).await;
                }
                RepositoryStatus::Classified => {
                    if let Err(e) = self.stage_outline(&repo).await {
                        self.fail(repository_id, &e).await?;
                        return Err(e);
                    }
                }
                RepositoryStatus::Outlined | RepositoryStatus::Generating => {
                    if let Err(e) = self.stage_generate(&repo).await {
                        self.fail(repository_id, &e).await?;
                        return Err(e);
                    }
                    // One pass may leave leaves incomplete (independent leaf failures,
                    // spec §4.9); the scheduler's processing sweep resumes a repository
                    // stuck in GENERATING rather than this call looping indefinitely.
                    return Ok(());
                }
                RepositoryStatus::Completed => {
                    self.incremental_update(&repo).await?;
                    return Ok(());
                }
                RepositoryStatus::Failed => return Ok(()),
            }
        }
    }

    async fn fail(&self, repository_id: Uuid, error: &CoreError) -> CoreResult<()> {
        warn!(error = %error, "repository pipeline failed");
        self.store
            .transition_status(repository_id, RepositoryStatus::Failed, None, Some(&error.reason_tag()))
            .await
    }

    fn workspace_path(&self, repo: &RepositoryRow) -> std::path::PathBuf {
        self.config.workspace_path(&repo.organization, &repo.name, &repo.branch)
    }

    fn credentials(repo: &RepositoryRow) -> Option<Credentials> {
        match (&repo.username, &repo.token) {
            (Some(username), Some(token)) => Some(Credentials { username: username.clone(), token: token.clone() }),
            _ => None,
        }
    }

    // ---- PENDING/CLONING → CLONED ---------------------------------------

    #[instrument(skip(self, repo))]
    async fn stage_clone(&self, repo: &RepositoryRow) -> CoreResult<()> {
        self.store.transition_status(repo.id, RepositoryStatus::Cloning, None, None).await?;

        let local_path = self.workspace_path(repo);
        let credentials = Self::credentials(repo);
        let result = git::clone(&repo.address, credentials.as_ref(), &repo.branch, &local_path).await?;

        info!(commit = %result.head_commit, "clone complete");
        self.store
            .transition_status(repo.id, RepositoryStatus::Cloned, Some(&result.head_commit), None)
            .await
    }

    // ---- CLONED → CLASSIFIED (non-fatal) ---------------------------------

    #[instrument(skip(self, repo))]
    async fn stage_classify(&self, repo: &RepositoryRow) {
        let local_path = self.workspace_path(repo);
        let filter = IgnoreFilter::new(&[]);
        let tree = tree_builder::build_tree(&local_path, &filter, self.config.generation.tree_size_cap);
        let readme = read_readme(&local_path).await;

        let classification = match classifier::classify(&self.gateway, &self.config.llm.analysis_model, &tree, readme.as_deref()).await
        {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "classifier call failed, defaulting to unknown");
                Classification::Unknown
            }
        };

        if let Err(e) = self.store.set_classification(repo.id, classification.as_str()).await {
            warn!(error = %e, "failed to persist classification");
        }
        if let Err(e) = self.store.set_optimized_tree(repo.id, &tree).await {
            warn!(error = %e, "failed to persist optimized tree");
        }
        if let Err(e) = self.store.transition_status(repo.id, RepositoryStatus::Classified, None, None).await {
            warn!(error = %e, "failed to transition to classified");
        }
    }

    // ---- CLASSIFIED → OUTLINED --------------------------------------------

    #[instrument(skip(self, repo))]
    async fn stage_outline(&self, repo: &RepositoryRow) -> CoreResult<()> {
        let local_path = self.workspace_path(repo);
        let tree = repo.optimized_tree.clone().unwrap_or_default();
        let readme = read_readme(&local_path).await;
        let classification = parse_classification(repo.classification.as_deref());

        let nodes = outline::plan(
            &self.gateway,
            &self.config.llm.analysis_model,
            repo.id,
            classification,
            &tree,
            readme.as_deref(),
        )
        .await?;

        self.store.insert_catalog_nodes(&nodes).await?;

        let document = Document {
            id: Uuid::new_v4(),
            repository_id: repo.id,
            overview: String::new(),
            description: String::new(),
            completed_leaves: 0,
            total_leaves: leaf_count(&nodes)? as i64,
            mini_map: serde_json::json!([]),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        self.store.upsert_document(&document).await?;

        self.store.transition_status(repo.id, RepositoryStatus::Outlined, None, None).await
    }

    // ---- OUTLINED/GENERATING → COMPLETED -----------------------------------

    #[instrument(skip(self, repo))]
    async fn stage_generate(&self, repo: &RepositoryRow) -> CoreResult<()> {
        self.store.transition_status(repo.id, RepositoryStatus::Generating, None, None).await?;

        let local_path = self.workspace_path(repo);
        let classification = parse_classification(repo.classification.as_deref());
        let tree = repo.optimized_tree.clone().unwrap_or_default();
        let readme = read_readme(&local_path).await.unwrap_or_default();

        let all_nodes = self.store.list_catalog_nodes(repo.id).await?;
        let forest = build_forest(all_nodes.clone()).map_err(|e| {
            warn!(detail = %e, "catalog cycle detected while building forest");
            CoreError::Integrity(crate::error::IntegrityError::CatalogCycle { repository_id: repo.id.to_string() })
        })?;
        let leaves: Vec<CatalogNode> = forest.iter().flat_map(|t| t.leaves_in_order()).filter(|n| !n.is_completed).cloned().collect();

        self.run_generation_batch(repo, &local_path, classification, &readme, &tree, leaves).await?;

        self.build_overview_and_mini_map(repo, classification, &tree).await?;

        let document = self.store.get_document(repo.id).await?;
        let all_completed = self.store.list_catalog_nodes(repo.id).await?.iter().all(|n| n.is_completed);
        if all_completed && document.is_some() {
            self.store.transition_status(repo.id, RepositoryStatus::Completed, None, None).await?;
        }
        Ok(())
    }

    async fn run_generation_batch(
        &self,
        repo: &RepositoryRow,
        local_path: &std::path::Path,
        classification: Classification,
        readme: &str,
        tree: &str,
        leaves: Vec<CatalogNode>,
    ) -> CoreResult<()> {
        if leaves.is_empty() {
            return Ok(());
        }

        let local_path = local_path.to_path_buf();
        let rag = Arc::clone(&self.rag);
        let rag_user_id = repo.id.to_string();
        let index = Arc::new(WorkspaceIndex::new(local_path.clone()));

        let build_tool_surface = move || {
            Arc::new(ToolSurface::new(
                local_path.clone(),
                IgnoreFilter::new(&[]),
                Arc::clone(&index),
                Arc::clone(&rag),
                rag_user_id.clone(),
            ))
        };

        let results = section_generator::generate_all(
            Arc::clone(&self.gateway),
            self.config.llm.chat_model.clone(),
            classification,
            readme.to_string(),
            tree.to_string(),
            leaves,
            self.config.generation,
            self.config.llm.tool_hop_cap,
            build_tool_surface,
        )
        .await;

        for result in results {
            match result.outcome {
                Ok(section) => self.persist_leaf(repo.id, result.node_id, section).await?,
                Err(e) => warn!(node_id = %result.node_id, error = %e, "leaf generation failed, leaving incomplete"),
            }
        }
        Ok(())
    }

    async fn persist_leaf(&self, repository_id: Uuid, node_id: Uuid, section: GeneratedSection) -> CoreResult<()> {
        let now = chrono::Utc::now();
        let item = FileItem {
            id: Uuid::new_v4(),
            catalog_node_id: node_id,
            title: section.title,
            content: section.content.clone(),
            request_tokens: section.request_tokens as i64,
            response_tokens: section.response_tokens as i64,
            size: section.content.len() as i64,
            created_at: now,
            updated_at: now,
        };
        let sources: Vec<FileItemSource> = section
            .sources
            .into_iter()
            .map(|path| FileItemSource { id: Uuid::new_v4(), file_item_id: item.id, file_path: path, line_start: None, line_end: None })
            .collect();

        self.store.upsert_file_item(&item, &sources).await?;
        self.store.mark_node_completed(node_id).await?;
        self.store.increment_completed_leaves(repository_id).await?;
        Ok(())
    }

    async fn build_overview_and_mini_map(&self, repo: &RepositoryRow, classification: Classification, tree: &str) -> CoreResult<()> {
        let overview_text = overview::build_overview(&self.gateway, &self.config.llm.analysis_model, classification, tree, None)
            .await
            .unwrap_or_default();
        let mini_map = overview::build_mini_map(&self.gateway, &self.config.llm.analysis_model, classification, tree).await;

        let mut document = self
            .store
            .get_document(repo.id)
            .await?
            .unwrap_or_else(|| Document {
                id: Uuid::new_v4(),
                repository_id: repo.id,
                overview: String::new(),
                description: String::new(),
                completed_leaves: 0,
                total_leaves: 0,
                mini_map: serde_json::json!([]),
                created_at: chrono::Utc::now(),
                updated_at: chrono::Utc::now(),
            });
        document.overview = overview_text;
        document.mini_map = serde_json::to_value(&mini_map).unwrap_or(serde_json::json!([]));
        self.store.upsert_document(&document).await
    }

    // ---- COMPLETED → incremental update sub-pipeline -----------------------

    #[instrument(skip(self, repo))]
    async fn incremental_update(&self, repo: &RepositoryRow) -> CoreResult<()> {
        let local_path = self.workspace_path(repo);
        let since = repo.version.clone();
        let pull_result = git::pull(&local_path, since.as_deref()).await?;

        if pull_result.commits.is_empty() {
            return self.store.touch_updated_at(repo.id).await;
        }

        let changed_paths = match &since {
            Some(since) => git::changed_files_between(&local_path, since, &pull_result.head_commit).await.unwrap_or_default(),
            None => Vec::new(),
        };

        if !changed_paths.is_empty() {
            let node_ids = self.store.nodes_touching_paths(repo.id, &changed_paths).await?;
            for id in &node_ids {
                self.store.mark_node_incomplete(*id).await?;
            }

            let classification = parse_classification(repo.classification.as_deref());
            let tree = repo.optimized_tree.clone().unwrap_or_default();
            let readme = read_readme(&local_path).await.unwrap_or_default();
            let all_nodes = self.store.list_catalog_nodes(repo.id).await?;
            let stale: Vec<CatalogNode> = all_nodes.into_iter().filter(|n| node_ids.contains(&n.id)).collect();

            self.run_generation_batch(repo, &local_path, classification, &readme, &tree, stale).await?;
        }

        // Overview is regenerated unconditionally (spec §4.11); classification is not revisited.
        let classification = parse_classification(repo.classification.as_deref());
        let tree = repo.optimized_tree.clone().unwrap_or_default();
        self.build_overview_and_mini_map(repo, classification, &tree).await?;

        let records: Vec<CommitRecord> = pull_result
            .commits
            .iter()
            .map(|c| CommitRecord {
                id: Uuid::new_v4(),
                repository_id: repo.id,
                hash: c.hash.clone(),
                author: c.author.clone(),
                message: c.message.clone(),
                committed_at: c.timestamp,
            })
            .collect();
        self.store.append_commit_records(&records).await?;

        self.store
            .transition_status(repo.id, RepositoryStatus::Completed, Some(&pull_result.head_commit), None)
            .await
    }
}

async fn read_readme(local_path: &std::path::Path) -> Option<String> {
    for candidate in ["README.md", "README", "readme.md", "Readme.md"] {
        if let Some(bytes) = git::read_file(local_path, candidate).await {
            return Some(String::from_utf8_lossy(&bytes).into_owned());
        }
    }
    None
}

fn parse_classification(tag: Option<&str>) -> Classification {
    match tag {
        Some("framework") => Classification::Framework,
        Some("library") => Classification::Library,
        Some("application") => Classification::Application,
        Some("cli_tool") => Classification::CliTool,
        Some("development_tool") => Classification::DevelopmentTool,
        Some("documentation") => Classification::Documentation,
        Some("devops_configuration") => Classification::DevopsConfiguration,
        _ => Classification::Unknown,
    }
}

fn leaf_count(nodes: &[CatalogNode]) -> CoreResult<usize> {
    let forest = build_forest(nodes.to_vec()).map_err(crate::error::IntegrityError::PlanInvalid)?;
    Ok(forest.iter().map(|t| t.leaves_in_order().len()).sum())
}
