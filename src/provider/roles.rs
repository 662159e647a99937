// src/provider/roles.rs — Role-based model assignment

use crate::core::roles::AgentRole;
use crate::infra::config::BackendConfig;

/// Assigns a model id to each pipeline role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleModels {
    pub generator: String,
    pub critic: String,
    pub refiner: String,
    pub visualizer: String,
}

impl RoleModels {
    /// Same model for every role.
    pub fn from_single(model: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            generator: model.clone(),
            critic: model.clone(),
            refiner: model.clone(),
            visualizer: model,
        }
    }

    /// Build from backend config, filling gaps with `backend.model`.
    pub fn from_config(config: &BackendConfig) -> Self {
        let pick = |o: &Option<String>| {
            o.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(&config.model)
                .to_string()
        };
        Self {
            generator: pick(&config.roles.generator),
            critic: pick(&config.roles.critic),
            refiner: pick(&config.roles.refiner),
            visualizer: pick(&config.roles.visualizer),
        }
    }

    pub fn model_for(&self, role: AgentRole) -> &str {
        match role {
            AgentRole::Generator => &self.generator,
            AgentRole::Critic => &self.critic,
            AgentRole::Refiner => &self.refiner,
            AgentRole::Visualizer => &self.visualizer,
        }
    }
}
