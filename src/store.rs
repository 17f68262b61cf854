//! Persistence (spec §3 "Data Model" mapped onto Postgres, SPEC_FULL.md §3).
//!
//! Hand-written `sqlx` queries over a `PgPool`, matching the teacher's
//! preference for hand-parsed/hand-built data structures (`config.rs`'s
//! manual JSON defaults, `toml` parsing) over a macro-driven ORM. Every
//! transition that must be atomic (spec §5 "Repository and related rows are
//! updated transactionally per stage") runs inside a `sqlx::Transaction`.

use crate::error::CoreResult;
use crate::model::{CatalogNode, CommitRecord, Document, FileItem, FileItemSource, RepositoryRow, RepositoryStatus};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    pub async fn connect(database_url: &str) -> CoreResult<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> CoreResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await.map_err(|e| anyhow::anyhow!(e))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // ---- Repository --------------------------------------------------

    /// Inserts a new Repository row, rejecting duplicates in a
    /// terminal-non-FAILED state via the partial unique index (spec §3,
    /// §6 "Rejects duplicates in terminal-non-FAILED state").
    pub async fn create_repository(&self, row: &RepositoryRow) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO repositories
                (id, organization, name, branch, address, username, token, status, version,
                 error, failure_count, prompt, recommended, views, classification, optimized_tree, created_at, updated_at)
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18)",
        )
        .bind(row.id)
        .bind(&row.organization)
        .bind(&row.name)
        .bind(&row.branch)
        .bind(&row.address)
        .bind(&row.username)
        .bind(&row.token)
        .bind(row.status)
        .bind(&row.version)
        .bind(&row.error)
        .bind(row.failure_count)
        .bind(&row.prompt)
        .bind(row.recommended)
        .bind(row.views)
        .bind(&row.classification)
        .bind(&row.optimized_tree)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_repository(&self, id: Uuid) -> CoreResult<Option<RepositoryRow>> {
        let row = sqlx::query_as::<_, RepositoryRow>("SELECT * FROM repositories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// `GET /repository?page&page_size&keyword` (spec §6). Caller-access
    /// filtering happens at the HTTP layer via the `AccessControl` collaborator.
    pub async fn list_repositories(&self, page: i64, page_size: i64, keyword: Option<&str>) -> CoreResult<Vec<RepositoryRow>> {
        let offset = page.max(0) * page_size.max(1);
        let rows = sqlx::query_as::<_, RepositoryRow>(
            "SELECT * FROM repositories
             WHERE $1::text IS NULL OR name ILIKE '%' || $1 || '%' OR organization ILIKE '%' || $1 || '%'
             ORDER BY created_at DESC
             LIMIT $2 OFFSET $3",
        )
        .bind(keyword)
        .bind(page_size.max(1))
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// `PUT /repository/{id}` (spec §6 "update description/prompt/recommended flag").
    pub async fn update_repository_metadata(&self, id: Uuid, prompt: Option<&str>, recommended: Option<bool>) -> CoreResult<()> {
        sqlx::query(
            "UPDATE repositories
             SET prompt = COALESCE($2, prompt), recommended = COALESCE($3, recommended), updated_at = now()
             WHERE id = $1",
        )
        .bind(id)
        .bind(prompt)
        .bind(recommended)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// `DELETE /repository/{id}` (spec §6 "cascade delete"); `ON DELETE CASCADE`
    /// on every foreign key rooted here handles the rest.
    pub async fn delete_repository(&self, id: Uuid) -> CoreResult<()> {
        sqlx::query("DELETE FROM repositories WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(())
    }

    pub async fn increment_views(&self, id: Uuid) -> CoreResult<()> {
        sqlx::query("UPDATE repositories SET views = views + 1 WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(())
    }

    /// Resolves the `owner`/`name`/`branch` triple used by the read-side
    /// HTTP endpoints (spec §6 "?owner&name&branch") to the live, non-failed row.
    pub async fn get_repository_by_triple(&self, organization: &str, name: &str, branch: &str) -> CoreResult<Option<RepositoryRow>> {
        let row = sqlx::query_as::<_, RepositoryRow>(
            "SELECT * FROM repositories WHERE organization = $1 AND name = $2 AND branch = $3 AND status <> 'failed'",
        )
        .bind(organization)
        .bind(name)
        .bind(branch)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Repositories in PENDING or in-flight stuck past `heartbeat_timeout`,
    /// ordered PROCESSING before PENDING (spec §4.12 "Processing sweep").
    pub async fn select_for_processing_sweep(
        &self,
        heartbeat_timeout_secs: i64,
        limit: i64,
    ) -> CoreResult<Vec<RepositoryRow>> {
        let rows = sqlx::query_as::<_, RepositoryRow>(
            "SELECT * FROM repositories
             WHERE status = 'pending'
                OR (status NOT IN ('pending', 'completed', 'failed')
                    AND updated_at < now() - make_interval(secs => $1))
             ORDER BY (status <> 'pending') DESC, updated_at ASC
             LIMIT $2",
        )
        .bind(heartbeat_timeout_secs as f64)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// COMPLETED repositories whose `version` predates the update interval
    /// (spec §4.12 "Update sweep").
    pub async fn select_for_update_sweep(&self, update_interval_days: i64, limit: i64) -> CoreResult<Vec<RepositoryRow>> {
        let rows = sqlx::query_as::<_, RepositoryRow>(
            "SELECT * FROM repositories
             WHERE status = 'completed'
               AND updated_at < now() - make_interval(days => $1)
             ORDER BY updated_at ASC
             LIMIT $2",
        )
        .bind(update_interval_days)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// FAILED repositories older than the grace period, excluding ones that
    /// have already hit the failure-count threshold (spec §4.12 "Cleanup
    /// sweep demotes FAILED repositories ... unless a failure-count
    /// threshold is reached").
    pub async fn select_for_cleanup_sweep(&self, grace_period_secs: i64, max_failure_count: i32) -> CoreResult<Vec<RepositoryRow>> {
        let rows = sqlx::query_as::<_, RepositoryRow>(
            "SELECT * FROM repositories
             WHERE status = 'failed'
               AND failure_count < $2
               AND updated_at < now() - make_interval(secs => $1)",
        )
        .bind(grace_period_secs as f64)
        .bind(max_failure_count)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Demotes a FAILED repository back to PENDING (spec §4.12 cleanup sweep).
    /// `failure_count` is left untouched so repeated demote/fail cycles still
    /// converge on the threshold rather than resetting every sweep.
    pub async fn demote_to_pending(&self, id: Uuid) -> CoreResult<()> {
        sqlx::query("UPDATE repositories SET status = 'pending', error = NULL, updated_at = now() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// One committed update per pipeline transition (spec §4.11 "Checkpoints").
    /// `failure_count` increments on every transition into FAILED and resets
    /// on a clean COMPLETED, so the cleanup-sweep threshold tracks consecutive
    /// failures rather than a lifetime total.
    pub async fn transition_status(
        &self,
        id: Uuid,
        status: RepositoryStatus,
        version: Option<&str>,
        error: Option<&str>,
    ) -> CoreResult<()> {
        sqlx::query(
            "UPDATE repositories
             SET status = $2,
                 version = COALESCE($3, version),
                 error = $4,
                 failure_count = CASE
                     WHEN $2 = 'failed' THEN failure_count + 1
                     WHEN $2 = 'completed' THEN 0
                     ELSE failure_count
                 END,
                 updated_at = now()
             WHERE id = $1",
        )
        .bind(id)
        .bind(status)
        .bind(version)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_classification(&self, id: Uuid, classification: &str) -> CoreResult<()> {
        sqlx::query("UPDATE repositories SET classification = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(classification)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_optimized_tree(&self, id: Uuid, tree: &str) -> CoreResult<()> {
        sqlx::query("UPDATE repositories SET optimized_tree = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(tree)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn touch_updated_at(&self, id: Uuid) -> CoreResult<()> {
        sqlx::query("UPDATE repositories SET updated_at = now() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ---- Document ------------------------------------------------------

    pub async fn upsert_document(&self, doc: &Document) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO documents (id, repository_id, overview, description, completed_leaves, total_leaves, mini_map, created_at, updated_at)
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)
             ON CONFLICT (repository_id) DO UPDATE SET
                overview = EXCLUDED.overview,
                description = EXCLUDED.description,
                completed_leaves = EXCLUDED.completed_leaves,
                total_leaves = EXCLUDED.total_leaves,
                mini_map = EXCLUDED.mini_map,
                updated_at = now()",
        )
        .bind(doc.id)
        .bind(doc.repository_id)
        .bind(&doc.overview)
        .bind(&doc.description)
        .bind(doc.completed_leaves)
        .bind(doc.total_leaves)
        .bind(&doc.mini_map)
        .bind(doc.created_at)
        .bind(doc.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_document(&self, repository_id: Uuid) -> CoreResult<Option<Document>> {
        let row = sqlx::query_as::<_, Document>("SELECT * FROM documents WHERE repository_id = $1")
            .bind(repository_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn increment_completed_leaves(&self, repository_id: Uuid) -> CoreResult<()> {
        sqlx::query(
            "UPDATE documents SET completed_leaves = completed_leaves + 1, updated_at = now() WHERE repository_id = $1",
        )
        .bind(repository_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ---- CatalogNode -----------------------------------------------------

    pub async fn insert_catalog_nodes(&self, nodes: &[CatalogNode]) -> CoreResult<()> {
        let mut tx = self.pool.begin().await?;
        for n in nodes {
            sqlx::query(
                "INSERT INTO catalog_nodes
                    (id, repository_id, parent_id, title, slug, order_index, prompt, is_completed, is_deleted, created_at, updated_at)
                 VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)",
            )
            .bind(n.id)
            .bind(n.repository_id)
            .bind(n.parent_id)
            .bind(&n.title)
            .bind(&n.slug)
            .bind(n.order_index)
            .bind(&n.prompt)
            .bind(n.is_completed)
            .bind(n.is_deleted)
            .bind(n.created_at)
            .bind(n.updated_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn list_catalog_nodes(&self, repository_id: Uuid) -> CoreResult<Vec<CatalogNode>> {
        let rows = sqlx::query_as::<_, CatalogNode>(
            "SELECT * FROM catalog_nodes WHERE repository_id = $1 AND is_deleted = false ORDER BY order_index",
        )
        .bind(repository_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn mark_node_incomplete(&self, id: Uuid) -> CoreResult<()> {
        sqlx::query("UPDATE catalog_nodes SET is_completed = false, updated_at = now() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn get_catalog_node(&self, id: Uuid) -> CoreResult<Option<CatalogNode>> {
        let row = sqlx::query_as::<_, CatalogNode>("SELECT * FROM catalog_nodes WHERE id = $1 AND is_deleted = false")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Looks up the leaf node that `GET /document?...&path=...` addresses by slug.
    pub async fn get_catalog_node_by_slug(&self, repository_id: Uuid, slug: &str) -> CoreResult<Option<CatalogNode>> {
        let row = sqlx::query_as::<_, CatalogNode>(
            "SELECT * FROM catalog_nodes WHERE repository_id = $1 AND slug = $2 AND is_deleted = false",
        )
        .bind(repository_id)
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// `PUT /catalog/{id}` (spec §6 "rename / edit prompt").
    pub async fn update_catalog_node(&self, id: Uuid, title: Option<&str>, prompt: Option<&str>) -> CoreResult<()> {
        sqlx::query(
            "UPDATE catalog_nodes
             SET title = COALESCE($2, title), prompt = COALESCE($3, prompt), updated_at = now()
             WHERE id = $1",
        )
        .bind(id)
        .bind(title)
        .bind(prompt)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_node_completed(&self, id: Uuid) -> CoreResult<()> {
        sqlx::query("UPDATE catalog_nodes SET is_completed = true, updated_at = now() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// CatalogNodes whose recorded FileItemSources reference any of the
    /// given changed file paths (spec §4.11 "Incremental update").
    pub async fn nodes_touching_paths(&self, repository_id: Uuid, paths: &[String]) -> CoreResult<Vec<Uuid>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT DISTINCT cn.id
             FROM catalog_nodes cn
             JOIN file_items fi ON fi.catalog_node_id = cn.id
             JOIN file_item_sources fis ON fis.file_item_id = fi.id
             WHERE cn.repository_id = $1 AND fis.file_path = ANY($2)",
        )
        .bind(repository_id)
        .bind(paths)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    // ---- FileItem / FileItemSource --------------------------------------

    pub async fn upsert_file_item(&self, item: &FileItem, sources: &[FileItemSource]) -> CoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO file_items (id, catalog_node_id, title, content, request_tokens, response_tokens, size, created_at, updated_at)
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)
             ON CONFLICT (catalog_node_id) DO UPDATE SET
                title = EXCLUDED.title,
                content = EXCLUDED.content,
                request_tokens = EXCLUDED.request_tokens,
                response_tokens = EXCLUDED.response_tokens,
                size = EXCLUDED.size,
                updated_at = now()",
        )
        .bind(item.id)
        .bind(item.catalog_node_id)
        .bind(&item.title)
        .bind(&item.content)
        .bind(item.request_tokens)
        .bind(item.response_tokens)
        .bind(item.size)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM file_item_sources WHERE file_item_id = $1")
            .bind(item.id)
            .execute(&mut *tx)
            .await?;

        for source in sources {
            sqlx::query(
                "INSERT INTO file_item_sources (id, file_item_id, file_path, line_start, line_end) VALUES ($1,$2,$3,$4,$5)",
            )
            .bind(source.id)
            .bind(item.id)
            .bind(&source.file_path)
            .bind(source.line_start)
            .bind(source.line_end)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn get_file_item(&self, id: Uuid) -> CoreResult<Option<FileItem>> {
        let row = sqlx::query_as::<_, FileItem>("SELECT * FROM file_items WHERE id = $1").bind(id).fetch_optional(&self.pool).await?;
        Ok(row)
    }

    pub async fn get_file_item_by_node(&self, catalog_node_id: Uuid) -> CoreResult<Option<FileItem>> {
        let row = sqlx::query_as::<_, FileItem>("SELECT * FROM file_items WHERE catalog_node_id = $1")
            .bind(catalog_node_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn list_file_item_sources(&self, file_item_id: Uuid) -> CoreResult<Vec<FileItemSource>> {
        let rows = sqlx::query_as::<_, FileItemSource>("SELECT * FROM file_item_sources WHERE file_item_id = $1")
            .bind(file_item_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// `PUT /content/{id}` (spec §6 "overwrite FileItem body").
    pub async fn overwrite_file_item_content(&self, id: Uuid, content: &str) -> CoreResult<()> {
        sqlx::query(
            "UPDATE file_items SET content = $2, size = $3, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(content)
        .bind(content.len() as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// All FileItem rows belonging to a repository, joined through their
    /// owning CatalogNode (spec §6 "`GET /export/{id}` — a ZIP of all FileItem markdown").
    pub async fn list_file_items_for_repository(&self, repository_id: Uuid) -> CoreResult<Vec<(CatalogNode, FileItem)>> {
        let nodes = self.list_catalog_nodes(repository_id).await?;
        let mut out = Vec::with_capacity(nodes.len());
        for node in nodes {
            if let Some(item) = self.get_file_item_by_node(node.id).await? {
                out.push((node, item));
            }
        }
        Ok(out)
    }

    // ---- CommitRecord ----------------------------------------------------

    pub async fn append_commit_records(&self, records: &[CommitRecord]) -> CoreResult<()> {
        let mut tx = self.pool.begin().await?;
        for r in records {
            sqlx::query(
                "INSERT INTO commit_records (id, repository_id, hash, author, message, committed_at) VALUES ($1,$2,$3,$4,$5,$6)",
            )
            .bind(r.id)
            .bind(r.repository_id)
            .bind(&r.hash)
            .bind(&r.author)
            .bind(&r.message)
            .bind(r.committed_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn list_commit_records(&self, repository_id: Uuid) -> CoreResult<Vec<CommitRecord>> {
        let rows = sqlx::query_as::<_, CommitRecord>(
            "SELECT * FROM commit_records WHERE repository_id = $1 ORDER BY committed_at",
        )
        .bind(repository_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
