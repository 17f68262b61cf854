//! Scheduler (spec §4.12): a single process-wide component running three
//! periodic sweeps and dispatching eligible repositories to the
//! Orchestrator under a global concurrency bound.
//!
//! Grounded on the original Python source's three Celery-beat tasks
//! (`schedule_warehouse_processing`, `schedule_warehouse_updates`,
//! `cleanup_failed_warehouses_task`), translated into three
//! `tokio::time::interval` loops owned by one struct, per SPEC_FULL.md §4.12.

use crate::config::SchedulerConfig;
use crate::orchestrator::Orchestrator;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, instrument};

pub struct Scheduler {
    orchestrator: Arc<Orchestrator>,
    config: SchedulerConfig,
    in_flight: Arc<Semaphore>,
}

impl Scheduler {
    pub fn new(orchestrator: Arc<Orchestrator>, config: SchedulerConfig) -> Self {
        let in_flight = Arc::new(Semaphore::new(config.max_parallel_repos));
        Self { orchestrator, config, in_flight }
    }

    /// Spawns the three sweep loops; the scheduler is strictly single-leader
    /// (spec §4.12 "running more than one instance against the same store is
    /// undefined") — callers must ensure only one `Scheduler` runs per store.
    pub fn spawn(self: Arc<Self>) -> Vec<tokio::task::JoinHandle<()>> {
        vec![
            tokio::spawn(Arc::clone(&self).processing_sweep_loop()),
            tokio::spawn(Arc::clone(&self).update_sweep_loop()),
            tokio::spawn(self.cleanup_sweep_loop()),
        ]
    }

    #[instrument(skip(self))]
    async fn processing_sweep_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.config.processing_sweep_interval);
        loop {
            ticker.tick().await;
            if let Err(e) = self.run_processing_sweep().await {
                error!(error = %e, "processing sweep failed");
            }
        }
    }

    async fn run_processing_sweep(&self) -> anyhow::Result<()> {
        let repos = self
            .orchestrator
            .store()
            .select_for_processing_sweep(
                self.config.heartbeat_timeout.as_secs() as i64,
                self.config.max_parallel_repos as i64,
            )
            .await?;

        info!(count = repos.len(), "processing sweep selected repositories");

        for repo in repos {
            let permit = Arc::clone(&self.in_flight).acquire_owned().await?;
            let orchestrator = Arc::clone(&self.orchestrator);
            tokio::spawn(async move {
                let _permit = permit;
                if let Err(e) = orchestrator.run(repo.id).await {
                    error!(repository_id = %repo.id, error = %e, "orchestrator run failed");
                }
            });
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn update_sweep_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.config.update_sweep_interval);
        loop {
            ticker.tick().await;
            if let Err(e) = self.run_update_sweep().await {
                error!(error = %e, "update sweep failed");
            }
        }
    }

    async fn run_update_sweep(&self) -> anyhow::Result<()> {
        let repos = self
            .orchestrator
            .store()
            .select_for_update_sweep(self.config.update_interval_days, self.config.max_updates_per_sweep as i64)
            .await?;

        info!(count = repos.len(), "update sweep selected repositories");

        for repo in repos {
            let permit = Arc::clone(&self.in_flight).acquire_owned().await?;
            let orchestrator = Arc::clone(&self.orchestrator);
            tokio::spawn(async move {
                let _permit = permit;
                if let Err(e) = orchestrator.run(repo.id).await {
                    error!(repository_id = %repo.id, error = %e, "incremental update failed");
                }
            });
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn cleanup_sweep_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.config.cleanup_sweep_interval);
        loop {
            ticker.tick().await;
            if let Err(e) = self.run_cleanup_sweep().await {
                error!(error = %e, "cleanup sweep failed");
            }
        }
    }

    async fn run_cleanup_sweep(&self) -> anyhow::Result<()> {
        let repos = self
            .orchestrator
            .store()
            .select_for_cleanup_sweep(self.config.failed_grace_period.as_secs() as i64, self.config.max_failure_count)
            .await?;

        info!(count = repos.len(), "cleanup sweep demoting stale failures to pending");

        for repo in repos {
            self.orchestrator.store().demote_to_pending(repo.id).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semaphore_capacity_matches_max_parallel_repos() {
        let config = SchedulerConfig::default();
        let sem = Semaphore::new(config.max_parallel_repos);
        assert_eq!(sem.available_permits(), config.max_parallel_repos);
    }
}
