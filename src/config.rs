use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Engine configuration
///
/// Everything here can be overridden from the environment with the
/// `FLOW_SEARCH` prefix, e.g. `FLOW_SEARCH__BASE_PATH=/var/lib/flow-indices`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Root directory under which each tenant gets its own index directory
    #[serde(default = "default_base_path")]
    pub base_path: PathBuf,

    /// Fall back to a transient in-memory index when the on-disk
    /// directory cannot be created
    #[serde(default = "default_fallback")]
    pub fallback_to_memory: bool,

    /// Index writer heap size in bytes
    #[serde(default = "default_writer_heap_size")]
    pub writer_heap_size: usize,

    /// Default cap on search results when the caller does not supply one
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Default query field when a query term carries no field prefix
    #[serde(default = "default_field")]
    pub default_field: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_path: default_base_path(),
            fallback_to_memory: default_fallback(),
            writer_heap_size: default_writer_heap_size(),
            max_results: default_max_results(),
            default_field: default_field(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables (prefix: FLOW_SEARCH)
    pub fn load() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::with_prefix("FLOW_SEARCH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

fn default_base_path() -> PathBuf {
    PathBuf::from("./flow-indices")
}

fn default_fallback() -> bool {
    true
}

fn default_writer_heap_size() -> usize {
    50_000_000 // 50MB
}

fn default_max_results() -> usize {
    100
}

fn default_field() -> String {
    "sourceIP".to_string()
}
