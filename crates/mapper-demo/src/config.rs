//! Configuration types and loading logic.

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use routed_tracing::TracingConfig;
use serde::Deserialize;

use crate::target::Target;

/// Top-level demo configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DemoConfig {
    #[serde(default = "default_databases")]
    pub databases: Vec<DatabaseConfig>,

    #[serde(default)]
    pub workload: WorkloadConfig,

    #[serde(default)]
    pub tracing: TracingConfig,
}

/// One database and the routing target that selects it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseConfig {
    pub key: Target,
    pub name: String,
}

/// Shape of the concurrent insert/verify run.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkloadConfig {
    /// Number of insert + verify operations to run.
    #[serde(default = "default_operations")]
    pub operations: usize,

    /// Upper bound on operations in flight at once.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Run the multi-mapper flow that ends in a duplicate key.
    #[serde(default = "default_true")]
    pub duplicate_check: bool,
}

pub fn default_databases() -> Vec<DatabaseConfig> {
    vec![
        DatabaseConfig {
            key: Target::Db1,
            name: "db1".to_string(),
        },
        DatabaseConfig {
            key: Target::Db2,
            name: "db2".to_string(),
        },
    ]
}

fn default_operations() -> usize {
    20
}

fn default_max_concurrent() -> usize {
    4
}

fn default_true() -> bool {
    true
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            operations: default_operations(),
            max_concurrent: default_max_concurrent(),
            duplicate_check: true,
        }
    }
}

impl DemoConfig {
    /// Load configuration from TOML file and environment variables.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (MAPPER_ prefix, __ for nesting)
    /// 2. TOML config file
    /// 3. Defaults
    pub fn load(config_path: &str) -> anyhow::Result<Self> {
        Self::from_figment(
            Figment::new()
                .merge(Toml::file(config_path))
                .merge(Env::prefixed("MAPPER_").split("__")),
        )
    }

    pub fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        let config: DemoConfig = figment.extract()?;
        if config.workload.max_concurrent == 0 {
            anyhow::bail!("workload.max_concurrent must be at least 1");
        }
        Ok(config)
    }
}
