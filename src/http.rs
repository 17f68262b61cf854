//! HTTP surface (spec §6): thin `axum` handlers over the same `Store` and
//! collaborator types the Orchestrator uses. No business logic lives here —
//! every handler either reads through the `Store` or delegates a mutation to
//! it, mirroring the "conventional, excluded" framing in spec §1 (auth,
//! roles, menus, OAuth are not implemented; see Non-goals).
//!
//! Grounded on `web3infra-foundation-git-internal`'s `examples/http_server.rs`
//! (`Router` + `State(Arc<AppState>)` + `Path`/`Query` extractors, tuple
//! `IntoResponse` error mapping).

use crate::collaborators::{AccessControl, TaskRuntime};
use crate::config::Config;
use crate::error::CoreError;
use crate::model::catalog_node::build_forest;
use crate::model::{CatalogNode, FileItem, RepositoryRow, RepositoryStatus};
use crate::store::Store;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub access: Arc<dyn AccessControl>,
    pub tasks: Arc<dyn TaskRuntime>,
    pub config: Config,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/repository", post(create_repository).get(list_repositories))
        .route(
            "/repository/:id",
            get(get_repository).put(update_repository).delete(delete_repository),
        )
        .route("/repository/:id/reset", post(reset_repository))
        .route("/document-catalog", get(get_document_catalog))
        .route("/document", get(get_document))
        .route("/catalog/:id", put(update_catalog_node))
        .route("/content/:id", put(update_content))
        .route("/overview", get(get_overview))
        .route("/mini-map", get(get_mini_map))
        .route("/change-log", get(get_change_log))
        .route("/export/:id", get(export_repository))
        .with_state(Arc::new(state))
}

/// `ApiError` adapts `CoreError` to the HTTP status codes implied by spec §7's
/// error kinds (input/validation → 4xx surfaced immediately, internal → 5xx).
struct ApiError(CoreError);

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            CoreError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            CoreError::Validation(m) => (StatusCode::BAD_REQUEST, m.clone()),
            CoreError::Permission(m) => (StatusCode::FORBIDDEN, m.clone()),
            CoreError::Store(e) if is_unique_violation(e) => {
                (StatusCode::CONFLICT, "repository already exists in a non-failed state".to_string())
            }
            other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

/// No real auth collaborator is wired up by default; callers identify
/// themselves with this header, falling back to an anonymous identity local
/// deployments can run with (spec §6 "the core never inspects roles directly").
fn caller_id(headers: &HeaderMap) -> String {
    headers
        .get("x-caller-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("anonymous")
        .to_string()
}

async fn require_access(state: &AppState, repository_id: Uuid, caller: &str) -> Result<(), ApiError> {
    if state.access.can_access(&repository_id.to_string(), caller).await {
        Ok(())
    } else {
        Err(ApiError(CoreError::Permission(format!("caller {caller} may not access repository {repository_id}"))))
    }
}

async fn require_manage(state: &AppState, repository_id: Uuid, caller: &str) -> Result<(), ApiError> {
    if state.access.can_manage(&repository_id.to_string(), caller).await {
        Ok(())
    } else {
        Err(ApiError(CoreError::Permission(format!("caller {caller} may not manage repository {repository_id}"))))
    }
}

fn not_found(repository_id: Uuid) -> ApiError {
    ApiError(CoreError::NotFound(format!("repository {repository_id}")))
}

// ---- POST /repository, GET /repository -----------------------------------

#[derive(Debug, Deserialize)]
struct CreateRepositoryRequest {
    organization: String,
    name: String,
    address: String,
    branch: String,
    username: Option<String>,
    token: Option<String>,
    prompt: Option<String>,
}

async fn create_repository(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateRepositoryRequest>,
) -> Result<(StatusCode, Json<RepositoryRow>), ApiError> {
    if req.organization.trim().is_empty() || req.name.trim().is_empty() || req.address.trim().is_empty() {
        return Err(ApiError(CoreError::Validation("organization, name, and address are required".to_string())));
    }

    let now = chrono::Utc::now();
    let row = RepositoryRow {
        id: Uuid::new_v4(),
        organization: req.organization,
        name: req.name,
        branch: if req.branch.trim().is_empty() { "main".to_string() } else { req.branch },
        address: req.address,
        username: req.username,
        token: req.token,
        status: RepositoryStatus::Pending,
        version: None,
        error: None,
        failure_count: 0,
        prompt: req.prompt,
        recommended: false,
        views: 0,
        classification: None,
        optimized_tree: None,
        created_at: now,
        updated_at: now,
    };

    state.store.create_repository(&row).await?;
    state.tasks.dispatch("process_repository", serde_json::json!({ "repository_id": row.id })).await;

    Ok((StatusCode::CREATED, Json(row)))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    page: Option<i64>,
    page_size: Option<i64>,
    keyword: Option<String>,
}

async fn list_repositories(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(q): Query<ListQuery>,
) -> Result<Json<Vec<RepositoryRow>>, ApiError> {
    let caller = caller_id(&headers);
    let rows = state
        .store
        .list_repositories(q.page.unwrap_or(0), q.page_size.unwrap_or(20), q.keyword.as_deref())
        .await?;

    let mut visible = Vec::with_capacity(rows.len());
    for row in rows {
        if state.access.can_access(&row.id.to_string(), &caller).await {
            visible.push(row);
        }
    }
    Ok(Json(visible))
}

// ---- GET/PUT/DELETE /repository/{id}, POST /repository/{id}/reset --------

async fn get_repository(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<RepositoryRow>, ApiError> {
    let caller = caller_id(&headers);
    require_access(&state, id, &caller).await?;
    let row = state.store.get_repository(id).await?.ok_or_else(|| not_found(id))?;
    state.store.increment_views(id).await?;
    Ok(Json(row))
}

#[derive(Debug, Deserialize)]
struct UpdateRepositoryRequest {
    prompt: Option<String>,
    recommended: Option<bool>,
}

async fn update_repository(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateRepositoryRequest>,
) -> Result<StatusCode, ApiError> {
    let caller = caller_id(&headers);
    require_manage(&state, id, &caller).await?;
    state.store.get_repository(id).await?.ok_or_else(|| not_found(id))?;
    state.store.update_repository_metadata(id, req.prompt.as_deref(), req.recommended).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_repository(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let caller = caller_id(&headers);
    require_manage(&state, id, &caller).await?;
    state.store.get_repository(id).await?.ok_or_else(|| not_found(id))?;
    state.store.delete_repository(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn reset_repository(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let caller = caller_id(&headers);
    require_manage(&state, id, &caller).await?;
    state.store.get_repository(id).await?.ok_or_else(|| not_found(id))?;
    state.store.transition_status(id, RepositoryStatus::Pending, None, None).await?;
    state.tasks.dispatch("process_repository", serde_json::json!({ "repository_id": id })).await;
    Ok(StatusCode::NO_CONTENT)
}

// ---- GET /document-catalog -------------------------------------------------

#[derive(Debug, Deserialize)]
struct TripleQuery {
    #[serde(alias = "owner")]
    organization: String,
    name: String,
    branch: String,
}

#[derive(Debug, Serialize)]
struct DocumentCatalogResponse {
    repository: RepositoryRow,
    forest: Vec<crate::model::CatalogTreeNode>,
    completed_leaves: i64,
    total_leaves: i64,
    branches: Vec<String>,
}

async fn get_document_catalog(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(q): Query<TripleQuery>,
) -> Result<Json<DocumentCatalogResponse>, ApiError> {
    let caller = caller_id(&headers);
    let repo = state
        .store
        .get_repository_by_triple(&q.organization, &q.name, &q.branch)
        .await?
        .ok_or_else(|| ApiError(CoreError::NotFound(format!("repository {}/{}/{}", q.organization, q.name, q.branch))))?;
    require_access(&state, repo.id, &caller).await?;

    let nodes = state.store.list_catalog_nodes(repo.id).await?;
    let document = state.store.get_document(repo.id).await?;
    let forest = build_forest(nodes).map_err(|e| ApiError(CoreError::Validation(e)))?;
    let workspace = state.config.workspace_path(&repo.organization, &repo.name, &repo.branch);
    let branches = crate::git::branches(&workspace).await.unwrap_or_default();

    Ok(Json(DocumentCatalogResponse {
        completed_leaves: document.as_ref().map(|d| d.completed_leaves).unwrap_or(0),
        total_leaves: document.as_ref().map(|d| d.total_leaves).unwrap_or(0),
        repository: repo,
        forest,
        branches,
    }))
}

// ---- GET /document ----------------------------------------------------------

#[derive(Debug, Deserialize)]
struct DocumentQuery {
    #[serde(alias = "owner")]
    organization: String,
    name: String,
    path: String,
    branch: String,
}

#[derive(Debug, Serialize)]
struct DocumentResponse {
    node: CatalogNode,
    file_item: FileItem,
    sources: Vec<crate::model::FileItemSource>,
}

async fn get_document(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(q): Query<DocumentQuery>,
) -> Result<Json<DocumentResponse>, ApiError> {
    let caller = caller_id(&headers);
    let repo = state
        .store
        .get_repository_by_triple(&q.organization, &q.name, &q.branch)
        .await?
        .ok_or_else(|| ApiError(CoreError::NotFound(format!("repository {}/{}/{}", q.organization, q.name, q.branch))))?;
    require_access(&state, repo.id, &caller).await?;

    let node = state
        .store
        .get_catalog_node_by_slug(repo.id, &q.path)
        .await?
        .ok_or_else(|| ApiError(CoreError::NotFound(format!("catalog node {}", q.path))))?;
    let file_item = state
        .store
        .get_file_item_by_node(node.id)
        .await?
        .ok_or_else(|| ApiError(CoreError::NotFound(format!("no generated content for {}", q.path))))?;
    let sources = state.store.list_file_item_sources(file_item.id).await?;

    Ok(Json(DocumentResponse { node, file_item, sources }))
}

// ---- PUT /catalog/{id}, PUT /content/{id} ---------------------------------

#[derive(Debug, Deserialize)]
struct UpdateCatalogNodeRequest {
    title: Option<String>,
    prompt: Option<String>,
}

async fn update_catalog_node(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCatalogNodeRequest>,
) -> Result<StatusCode, ApiError> {
    let node = state.store.get_catalog_node(id).await?.ok_or_else(|| ApiError(CoreError::NotFound(format!("catalog node {id}"))))?;
    let caller = caller_id(&headers);
    require_manage(&state, node.repository_id, &caller).await?;
    state.store.update_catalog_node(id, req.title.as_deref(), req.prompt.as_deref()).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct UpdateContentRequest {
    content: String,
}

async fn update_content(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateContentRequest>,
) -> Result<StatusCode, ApiError> {
    let item = state.store.get_file_item(id).await?.ok_or_else(|| ApiError(CoreError::NotFound(format!("file item {id}"))))?;
    let node = state
        .store
        .get_catalog_node(item.catalog_node_id)
        .await?
        .ok_or_else(|| ApiError(CoreError::NotFound(format!("catalog node {}", item.catalog_node_id))))?;
    let caller = caller_id(&headers);
    require_manage(&state, node.repository_id, &caller).await?;
    state.store.overwrite_file_item_content(id, &req.content).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- GET /overview, GET /mini-map, GET /change-log -------------------------

#[derive(Debug, Serialize)]
struct OverviewResponse {
    overview: String,
    description: String,
}

async fn get_overview(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(q): Query<TripleQuery>,
) -> Result<Json<OverviewResponse>, ApiError> {
    let caller = caller_id(&headers);
    let repo = state
        .store
        .get_repository_by_triple(&q.organization, &q.name, &q.branch)
        .await?
        .ok_or_else(|| ApiError(CoreError::NotFound(format!("repository {}/{}/{}", q.organization, q.name, q.branch))))?;
    require_access(&state, repo.id, &caller).await?;
    let document = state.store.get_document(repo.id).await?.ok_or_else(|| ApiError(CoreError::NotFound("document not ready".to_string())))?;
    Ok(Json(OverviewResponse { overview: document.overview, description: document.description }))
}

async fn get_mini_map(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(q): Query<TripleQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let caller = caller_id(&headers);
    let repo = state
        .store
        .get_repository_by_triple(&q.organization, &q.name, &q.branch)
        .await?
        .ok_or_else(|| ApiError(CoreError::NotFound(format!("repository {}/{}/{}", q.organization, q.name, q.branch))))?;
    require_access(&state, repo.id, &caller).await?;
    let document = state.store.get_document(repo.id).await?.ok_or_else(|| ApiError(CoreError::NotFound("document not ready".to_string())))?;
    Ok(Json(document.mini_map))
}

#[derive(Debug, Deserialize)]
struct ChangeLogQuery {
    #[serde(alias = "owner")]
    organization: String,
    name: String,
    /// Not part of the spec's query shape (`owner&name` only); defaults to
    /// `main` since CommitRecords are stored per `(organization, name, branch)`
    /// triple and a branch is still needed to resolve one. See DESIGN.md.
    #[serde(default = "default_branch")]
    branch: String,
}

fn default_branch() -> String {
    "main".to_string()
}

async fn get_change_log(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(q): Query<ChangeLogQuery>,
) -> Result<String, ApiError> {
    let caller = caller_id(&headers);
    let repo = state
        .store
        .get_repository_by_triple(&q.organization, &q.name, &q.branch)
        .await?
        .ok_or_else(|| ApiError(CoreError::NotFound(format!("repository {}/{}/{}", q.organization, q.name, q.branch))))?;
    require_access(&state, repo.id, &caller).await?;
    let records = state.store.list_commit_records(repo.id).await?;
    Ok(records.iter().map(|r| r.message.as_str()).collect::<Vec<_>>().join("\n"))
}

// ---- GET /export/{id} -------------------------------------------------------

async fn export_repository(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let caller = caller_id(&headers);
    require_access(&state, id, &caller).await?;
    state.store.get_repository(id).await?.ok_or_else(|| not_found(id))?;

    let items = state.store.list_file_items_for_repository(id).await?;

    let mut buf = Vec::new();
    {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        let options = zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        for (node, item) in &items {
            let name = format!("{}.md", node.slug);
            writer.start_file(name, options.clone()).map_err(|e| ApiError(CoreError::Internal(anyhow::anyhow!(e))))?;
            writer.write_all(item.content.as_bytes()).map_err(|e| ApiError(CoreError::Internal(anyhow::anyhow!(e))))?;
        }
        writer.finish().map_err(|e| ApiError(CoreError::Internal(anyhow::anyhow!(e))))?;
    }

    Ok(([(axum::http::header::CONTENT_TYPE, "application/zip")], buf).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caller_id_reads_header_when_present() {
        let mut headers = HeaderMap::new();
        headers.insert("x-caller-id", "alice".parse().unwrap());
        assert_eq!(caller_id(&headers), "alice");
    }

    #[test]
    fn caller_id_defaults_to_anonymous() {
        assert_eq!(caller_id(&HeaderMap::new()), "anonymous");
    }

    #[test]
    fn default_branch_is_main() {
        assert_eq!(default_branch(), "main");
    }

    #[test]
    fn not_found_carries_repository_id() {
        let id = Uuid::new_v4();
        match not_found(id).0 {
            CoreError::NotFound(msg) => assert!(msg.contains(&id.to_string())),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }
}
