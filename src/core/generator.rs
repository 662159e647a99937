// src/core/generator.rs — Role-configured wrapper around one model call

use std::sync::Arc;
use std::time::Duration;

use super::roles::AgentRole;
use crate::infra::config::BackendConfig;
use crate::infra::errors::ConsultError;
use crate::provider::roles::RoleModels;
use crate::provider::{ChatRequest, Message, ModelProvider, TokenUsage};

/// Result of one generation: trimmed text plus the extended transcript.
#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    pub transcript: Vec<Message>,
    pub usage: TokenUsage,
}

impl Generation {
    /// Empty or whitespace output counts as no usable output.
    pub fn is_usable(&self) -> bool {
        !self.text.is_empty()
    }
}

/// Sends role-specific requests to a shared provider. Holds no per-run state.
pub struct TextGenerator {
    provider: Arc<dyn ModelProvider>,
    models: RoleModels,
    max_tokens: u32,
    timeout: Duration,
}

impl TextGenerator {
    pub fn new(provider: Arc<dyn ModelProvider>, models: RoleModels) -> Self {
        let defaults = BackendConfig::default();
        Self {
            provider,
            models,
            max_tokens: defaults.max_tokens,
            timeout: Duration::from_secs(defaults.timeout_secs),
        }
    }

    pub fn from_config(provider: Arc<dyn ModelProvider>, config: &BackendConfig) -> Self {
        Self {
            provider,
            models: RoleModels::from_config(config),
            max_tokens: config.max_tokens,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model_for(&self, role: AgentRole) -> &str {
        self.models.model_for(role)
    }

    /// Run `prompt` under `role` against the prior transcript.
    ///
    /// The transcript is consumed and returned with the prompt and response
    /// appended. A call exceeding the timeout is `ServiceUnavailable`.
    pub async fn generate(
        &self,
        role: AgentRole,
        transcript: Vec<Message>,
        prompt: String,
    ) -> Result<Generation, ConsultError> {
        if prompt.trim().is_empty() {
            return Err(ConsultError::InvalidInput(format!(
                "{role} prompt must not be empty"
            )));
        }

        let mut transcript = transcript;
        transcript.push(Message::user(prompt));

        let request = ChatRequest {
            model: self.models.model_for(role).to_string(),
            messages: transcript.clone(),
            max_tokens: Some(self.max_tokens),
            temperature: Some(role.temperature()),
            system: Some(role.system_prompt().to_string()),
        };

        tracing::debug!(
            role = %role,
            model = %request.model,
            messages = request.messages.len(),
            "Calling backend"
        );

        let response = tokio::time::timeout(self.timeout, self.provider.chat(request))
            .await
            .map_err(|_| ConsultError::ServiceUnavailable {
                backend: self.provider.id().to_string(),
                message: format!("{role} call timed out after {}s", self.timeout.as_secs()),
                retriable: true,
            })??;

        let text = response.content.trim().to_string();
        transcript.push(Message::assistant(text.clone()));

        Ok(Generation {
            text,
            transcript,
            usage: response.usage,
        })
    }
}
