// src/infra/config.rs — Configuration loading (TOML)

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::checkpoint::{DEFAULT_CHECKPOINT_TTL_SECS, DEFAULT_MAX_CHECKPOINTS};
use crate::infra::paths;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub workflow: WorkflowConfig,

    #[serde(default)]
    pub projection: ProjectionConfig,

    #[serde(default)]
    pub retry: RetrySettings,
}

/// Text-generation backend. The API key is read from `api_key_env` at call
/// time, so a missing key only fails the calls that need it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub provider: String,
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    #[serde(default)]
    pub roles: RoleModelsConfig,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            provider: "groq".into(),
            base_url: "https://api.groq.com/openai/v1".into(),
            model: "llama-3.1-70b-versatile".into(),
            api_key_env: "GROQ_API_KEY".into(),
            max_tokens: 4096,
            timeout_secs: 120,
            roles: RoleModelsConfig::default(),
        }
    }
}

/// Optional per-role model overrides; unset roles use `backend.model`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleModelsConfig {
    pub generator: Option<String>,
    pub critic: Option<String>,
    pub refiner: Option<String>,
    pub visualizer: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Upper bound on runs executing at once (outbound model calls).
    pub max_concurrent_runs: usize,
    pub default_max_rounds: u32,
    pub refinement_requested: bool,
    /// Checkpoints kept for `resume`; the least recently updated is evicted first.
    pub max_checkpoints: usize,
    /// Checkpoints older than this are dropped.
    pub checkpoint_ttl_secs: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_concurrent_runs: 4,
            default_max_rounds: 1,
            refinement_requested: true,
            max_checkpoints: DEFAULT_MAX_CHECKPOINTS,
            checkpoint_ttl_secs: DEFAULT_CHECKPOINT_TTL_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    pub months: usize,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self { months: 12 }
    }
}

/// Transport retries for rate limits and 5xx. Disabled by default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_delay_ms: 2_000,
            max_delay_ms: 30_000,
        }
    }
}

impl Config {
    /// Load config from file, falling back to defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = paths::config_file_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the runner cannot work with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.workflow.max_concurrent_runs == 0 {
            anyhow::bail!("workflow.max_concurrent_runs must be at least 1");
        }
        if self.workflow.max_checkpoints == 0 {
            anyhow::bail!("workflow.max_checkpoints must be at least 1");
        }
        if self.backend.timeout_secs == 0 {
            anyhow::bail!("backend.timeout_secs must be at least 1");
        }
        if self.backend.base_url.trim().is_empty() {
            anyhow::bail!("backend.base_url must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_reasonable() {
        let c = Config::default();
        assert_eq!(c.backend.provider, "groq");
        assert_eq!(c.backend.model, "llama-3.1-70b-versatile");
        assert_eq!(c.backend.api_key_env, "GROQ_API_KEY");
        assert_eq!(c.backend.max_tokens, 4096);
        assert_eq!(c.workflow.max_concurrent_runs, 4);
        assert_eq!(c.workflow.default_max_rounds, 1);
        assert!(c.workflow.refinement_requested);
        assert_eq!(c.workflow.max_checkpoints, 256);
        assert_eq!(c.workflow.checkpoint_ttl_secs, 3600);
        assert_eq!(c.projection.months, 12);
        assert_eq!(c.retry.max_retries, 0);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config: Config = toml::from_str("[backend]\nmodel = \"mixtral-8x7b\"\n").unwrap();
        assert_eq!(config.backend.model, "mixtral-8x7b");
        assert_eq!(config.backend.provider, "groq");
        assert_eq!(config.backend.timeout_secs, 120);
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.workflow.max_concurrent_runs, 4);
        assert!(config.backend.roles.critic.is_none());
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[backend]
provider = "openai"
base_url = "https://api.openai.com/v1"
model = "gpt-4.1-mini"
api_key_env = "OPENAI_API_KEY"
max_tokens = 2048
timeout_secs = 30

[backend.roles]
critic = "gpt-4.1"

[workflow]
max_concurrent_runs = 2
default_max_rounds = 3
refinement_requested = false

[projection]
months = 18

[retry]
max_retries = 3
initial_delay_ms = 500
max_delay_ms = 4000
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.backend.provider, "openai");
        assert_eq!(config.backend.max_tokens, 2048);
        assert_eq!(config.backend.roles.critic.as_deref(), Some("gpt-4.1"));
        assert!(config.backend.roles.refiner.is_none());
        assert_eq!(config.workflow.max_concurrent_runs, 2);
        assert_eq!(config.workflow.default_max_rounds, 3);
        assert!(!config.workflow.refinement_requested);
        assert_eq!(config.projection.months, 18);
        assert_eq!(config.retry.max_retries, 3);
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = Config::default();
        let serialized = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(deserialized.backend.model, config.backend.model);
        assert_eq!(
            deserialized.workflow.max_concurrent_runs,
            config.workflow.max_concurrent_runs
        );
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[workflow]\nmax_concurrent_runs = 8\ndefault_max_rounds = 2\nrefinement_requested = true").unwrap();
        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.workflow.max_concurrent_runs, 8);
        assert_eq!(config.backend.provider, "groq");
    }

    #[test]
    fn test_load_rejects_zero_concurrency() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[workflow]\nmax_concurrent_runs = 0\ndefault_max_rounds = 1\nrefinement_requested = true").unwrap();
        let err = Config::load_from(file.path()).unwrap_err();
        assert!(err.to_string().contains("max_concurrent_runs"));
    }

    #[test]
    fn test_zero_checkpoint_capacity_rejected() {
        let config: Config = toml::from_str("[workflow]\nmax_checkpoints = 0\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_checkpoints"));
        assert_eq!(config.workflow.checkpoint_ttl_secs, 3600);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = Config::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_err());
    }
}
