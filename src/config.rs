// Layered configuration: defaults, then `agent-forge.yaml`, then
// `AGENT_FORGE_`-prefixed environment variables. Per-agent declarations live
// under `agents/` as one YAML file each, loaded separately by the Registry.

use crate::agents::registry::AgentConfig;
use crate::github::types::{Environment, RepositoryBinding};
use anyhow::Result;
use config::{Config, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PollingConfig {
    #[serde(default = "default_poll_parallelism")]
    pub poll_parallelism: usize,
    #[serde(default = "default_shutdown_grace_s")]
    pub shutdown_grace_s: u64,
    #[serde(default = "default_pr_monitor_interval_s")]
    pub pr_monitor_interval_s: u64,
}

fn default_poll_parallelism() -> usize {
    4
}
fn default_shutdown_grace_s() -> u64 {
    30
}
fn default_pr_monitor_interval_s() -> u64 {
    300
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            poll_parallelism: default_poll_parallelism(),
            shutdown_grace_s: default_shutdown_grace_s(),
            pr_monitor_interval_s: default_pr_monitor_interval_s(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitsConfig {
    #[serde(default = "default_duplicate_window_s")]
    pub duplicate_window_s: u64,
}

fn default_duplicate_window_s() -> u64 {
    600
}

impl Default for RateLimitsConfig {
    fn default() -> Self {
        Self {
            duplicate_window_s: default_duplicate_window_s(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ServiceConfig {
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub rate_limits: RateLimitsConfig,
    #[serde(default)]
    pub environment: EnvironmentConfig,
    #[serde(default)]
    pub repositories: Vec<RepositoryBinding>,
    #[serde(default = "default_agents_dir")]
    pub agents_dir: String,
    #[serde(default = "default_secrets_dir")]
    pub secrets_dir: String,
}

fn default_agents_dir() -> String {
    "agents".to_string()
}
fn default_secrets_dir() -> String {
    "secrets".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EnvironmentConfig {
    #[serde(default)]
    pub tag: Environment,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            tag: Environment::Dev,
        }
    }
}

impl ServiceConfig {
    /// Precedence: defaults -> `agent-forge.yaml` -> `AGENT_FORGE_*` env vars.
    pub fn load() -> Result<Self> {
        let mut builder = Config::builder();

        if Path::new("agent-forge.yaml").exists() {
            builder = builder.add_source(File::with_name("agent-forge"));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("AGENT_FORGE")
                .separator("__")
                .try_parsing(true),
        );

        let built = builder.build()?;
        let config: ServiceConfig = built.try_deserialize().unwrap_or_default();
        Ok(config)
    }

    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("loaded environment variables from .env file");
        }
        Ok(())
    }

    /// Loads every `*.yaml` file under `agents_dir` into an `AgentConfig`.
    pub fn load_agent_configs(&self) -> Result<Vec<AgentConfig>> {
        let dir = Path::new(&self.agents_dir);
        let mut configs = Vec::new();
        if !dir.exists() {
            return Ok(configs);
        }
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
                continue;
            }
            let contents = std::fs::read_to_string(&path)?;
            let agent: AgentConfig = serde_yaml::from_str(&contents)?;
            configs.push(agent);
        }
        Ok(configs)
    }
}
