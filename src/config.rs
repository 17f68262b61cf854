//! Process-wide configuration, loaded once at startup from the environment.
//!
//! Mirrors the teacher's `config.rs` shape (one `#[serde(default)]` struct per
//! concern, a `Default` impl documenting every default inline) but sourced
//! from environment variables rather than a repo-local `.cortexast.json`,
//! since this configuration governs the whole service, not one scan.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Azure,
    Anthropic,
}

impl Provider {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Some(Provider::OpenAi),
            "azure" => Some(Provider::Azure),
            "anthropic" => Some(Provider::Anthropic),
            _ => None,
        }
    }
}

/// LLM Gateway configuration (spec §4.5, §6 "Configuration").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: Provider,
    pub endpoint: String,
    pub api_key: String,
    /// Model used for classification/outline/overview calls.
    pub analysis_model: String,
    /// Model used for the agentic section-generation loop.
    pub chat_model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    /// Token-bucket capacity shared process-wide across all provider calls.
    pub rate_limit_capacity: u32,
    pub rate_limit_refill_per_sec: u32,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub tool_hop_cap: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: Provider::OpenAi,
            endpoint: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            analysis_model: "gpt-4o-mini".to_string(),
            chat_model: "gpt-4o".to_string(),
            temperature: 0.3,
            max_output_tokens: 4096,
            rate_limit_capacity: 60,
            rate_limit_refill_per_sec: 1,
            request_timeout: Duration::from_secs(600),
            max_retries: 3,
            tool_hop_cap: 10,
        }
    }
}

/// Scheduler cadence and bounds (spec §4.12).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub max_parallel_repos: usize,
    pub processing_sweep_interval: Duration,
    pub update_sweep_interval: Duration,
    pub cleanup_sweep_interval: Duration,
    pub update_interval_days: i64,
    pub max_updates_per_sweep: usize,
    pub failed_grace_period: Duration,
    pub heartbeat_timeout: Duration,
    /// Consecutive FAILED transitions a repository may accrue before the
    /// cleanup sweep stops demoting it back to PENDING (spec §4.12).
    pub max_failure_count: i32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_parallel_repos: 5,
            processing_sweep_interval: Duration::from_secs(30),
            update_sweep_interval: Duration::from_secs(24 * 3600),
            cleanup_sweep_interval: Duration::from_secs(3600),
            update_interval_days: 7,
            max_updates_per_sweep: 3,
            failed_grace_period: Duration::from_secs(24 * 3600),
            heartbeat_timeout: Duration::from_secs(600),
            max_failure_count: 5,
        }
    }
}

/// Section Generator concurrency (spec §4.9).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub max_parallel_sections: usize,
    pub read_files_size_threshold: u64,
    pub read_file_lines_limit: usize,
    pub tree_size_cap: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_parallel_sections: 5,
            read_files_size_threshold: 100 * 1024,
            read_file_lines_limit: 200,
            tree_size_cap: 60_000,
        }
    }
}

/// Top-level process configuration (spec §6 "Configuration").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub scheduler: SchedulerConfig,
    pub generation: GenerationConfig,
    /// Root directory under which `<organization>/<name>/<branch>` workspaces live.
    pub repository_root: PathBuf,
    pub database_url: String,
    pub http_bind: String,
    pub enable_dependency_analysis: bool,
    /// Compress file content (skeletonize) before handing it to the LLM.
    pub code_compression: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            scheduler: SchedulerConfig::default(),
            generation: GenerationConfig::default(),
            repository_root: default_repository_root(),
            database_url: "postgres://localhost/wikiforge".to_string(),
            http_bind: "0.0.0.0:8080".to_string(),
            enable_dependency_analysis: true,
            code_compression: false,
        }
    }
}

fn default_repository_root() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".wikiforge")
        .join("workspaces")
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load from environment variables, falling back to [`Config::default`]
    /// for anything unset. Mirrors the teacher's `load_config` in spirit:
    /// never hard-fail on a missing or malformed source, degrade to defaults.
    pub fn from_env() -> Self {
        let mut cfg = Config::default();

        if let Ok(p) = std::env::var("WIKIFORGE_PROVIDER") {
            if let Some(provider) = Provider::parse(&p) {
                cfg.llm.provider = provider;
            }
        }
        if let Ok(v) = std::env::var("WIKIFORGE_LLM_ENDPOINT") {
            cfg.llm.endpoint = v;
        }
        if let Ok(v) = std::env::var("WIKIFORGE_LLM_API_KEY") {
            cfg.llm.api_key = v;
        }
        if let Ok(v) = std::env::var("WIKIFORGE_ANALYSIS_MODEL") {
            cfg.llm.analysis_model = v;
        }
        if let Ok(v) = std::env::var("WIKIFORGE_CHAT_MODEL") {
            cfg.llm.chat_model = v;
        }
        if let Ok(v) = std::env::var("WIKIFORGE_REPO_ROOT") {
            cfg.repository_root = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("DATABASE_URL") {
            cfg.database_url = v;
        }
        if let Ok(v) = std::env::var("WIKIFORGE_HTTP_BIND") {
            cfg.http_bind = v;
        }

        cfg.scheduler.max_parallel_repos =
            env_or("WIKIFORGE_MAX_PARALLEL_REPOS", cfg.scheduler.max_parallel_repos);
        cfg.scheduler.update_interval_days =
            env_or("WIKIFORGE_UPDATE_INTERVAL_DAYS", cfg.scheduler.update_interval_days);
        cfg.enable_dependency_analysis =
            env_or("WIKIFORGE_ENABLE_DEPENDENCY_ANALYSIS", cfg.enable_dependency_analysis);
        cfg.code_compression = env_or("WIKIFORGE_CODE_COMPRESSION", cfg.code_compression);

        cfg
    }

    /// Local on-disk path for a repository triple, per §4.1 / §5 partitioning.
    pub fn workspace_path(&self, organization: &str, name: &str, branch: &str) -> PathBuf {
        self.repository_root.join(organization).join(name).join(branch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_parse_is_case_insensitive() {
        assert_eq!(Provider::parse("OpenAI"), Some(Provider::OpenAi));
        assert_eq!(Provider::parse("azure"), Some(Provider::Azure));
        assert_eq!(Provider::parse("Anthropic"), Some(Provider::Anthropic));
        assert_eq!(Provider::parse("bedrock"), None);
    }

    #[test]
    fn workspace_path_partitions_by_triple() {
        let cfg = Config { repository_root: PathBuf::from("/tmp/workspaces"), ..Config::default() };
        let path = cfg.workspace_path("acme", "toy", "main");
        assert_eq!(path, PathBuf::from("/tmp/workspaces/acme/toy/main"));
    }

    #[test]
    fn default_config_has_sane_scheduler_bounds() {
        let cfg = Config::default();
        assert!(cfg.scheduler.max_parallel_repos > 0);
        assert!(cfg.scheduler.processing_sweep_interval < cfg.scheduler.cleanup_sweep_interval);
    }
}
