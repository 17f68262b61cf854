//! Daemon entry point: runs the Scheduler's sweep loops and mounts the HTTP
//! surface (§6) in the same process, the way the teacher's `run_stdio_server`
//! was the one long-lived entry point for `neurosiphon`.

use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;
use wikiforge_core::collaborators::{AllowAllAccessControl, InMemoryRagBackend, InlineTaskRuntime, TaskRuntime};
use wikiforge_core::config::Config;
use wikiforge_core::http::{self, AppState};
use wikiforge_core::llm::LlmGateway;
use wikiforge_core::orchestrator::Orchestrator;
use wikiforge_core::scheduler::Scheduler;
use wikiforge_core::store::Store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = Config::from_env();
    let store = Store::connect(&config.database_url).await?;
    store.migrate().await?;

    let gateway = Arc::new(LlmGateway::new(config.llm.clone()));
    let rag = Arc::new(InMemoryRagBackend::default());
    let access = Arc::new(AllowAllAccessControl) as Arc<dyn wikiforge_core::collaborators::AccessControl>;

    let orchestrator = Arc::new(Orchestrator::new(store.clone(), config.clone(), gateway, rag));

    let scheduler = Arc::new(Scheduler::new(Arc::clone(&orchestrator), config.scheduler.clone()));
    let sweep_handles = scheduler.spawn();

    let dispatch_orchestrator = Arc::clone(&orchestrator);
    let tasks: Arc<dyn TaskRuntime> = Arc::new(InlineTaskRuntime::new(move |task_name: String, payload: serde_json::Value| {
        if task_name != "process_repository" {
            return;
        }
        let Some(id) = payload.get("repository_id").and_then(|v| v.as_str()).and_then(|s| Uuid::parse_str(s).ok()) else {
            tracing::warn!(?payload, "process_repository task dispatched without a valid repository_id");
            return;
        };
        let orchestrator = Arc::clone(&dispatch_orchestrator);
        tokio::spawn(async move {
            if let Err(e) = orchestrator.run(id).await {
                tracing::error!(repository_id = %id, error = %e, "dispatched orchestrator run failed");
            }
        });
    }));

    let app = http::router(AppState { store, access, tasks, config: config.clone() });

    let listener = tokio::net::TcpListener::bind(&config.http_bind).await?;
    tracing::info!(bind = %config.http_bind, "wikiforged listening");

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down on ctrl-c");
        }
    }

    for handle in sweep_handles {
        handle.abort();
    }
    Ok(())
}
