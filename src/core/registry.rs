// src/core/registry.rs — Process-wide shared runner, built on first use

use std::sync::{Arc, OnceLock};

use super::runner::WorkflowRunner;
use crate::infra::config::Config;
use crate::infra::errors::ConsultError;
use crate::provider::openai_compat::OpenAICompatProvider;
use crate::provider::retry::{RetryConfig, RetryProvider};
use crate::provider::ModelProvider;

static SHARED_RUNNER: OnceLock<Arc<WorkflowRunner>> = OnceLock::new();

/// Return the shared runner, building it from `config` on the first call.
///
/// A failed build is returned to the caller and not cached, so a later call
/// with a corrected config can still succeed. Once built, `config` is ignored.
pub fn shared_runner(config: &Config) -> Result<Arc<WorkflowRunner>, ConsultError> {
    if let Some(runner) = SHARED_RUNNER.get() {
        return Ok(runner.clone());
    }
    let runner = Arc::new(build_runner(config)?);
    // Concurrent first callers may both build; the first stored wins
    Ok(SHARED_RUNNER.get_or_init(|| runner).clone())
}

/// Build a standalone runner against the configured backend.
pub fn build_runner(config: &Config) -> Result<WorkflowRunner, ConsultError> {
    config
        .validate()
        .map_err(|e| ConsultError::Config(e.to_string()))?;
    Ok(WorkflowRunner::from_config(build_provider(config), config))
}

fn build_provider(config: &Config) -> Arc<dyn ModelProvider> {
    let base: Arc<dyn ModelProvider> = Arc::new(OpenAICompatProvider::from_config(&config.backend));
    if config.retry.max_retries == 0 {
        return base;
    }
    tracing::debug!(max_retries = config.retry.max_retries, "Backend retries enabled");
    Arc::new(RetryProvider::new(base, RetryConfig::from(&config.retry)))
}
