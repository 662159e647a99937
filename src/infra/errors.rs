// src/infra/errors.rs — Error types for the consultation pipeline

use thiserror::Error;

use crate::core::types::{Stage, WorkflowState};

#[derive(Error, Debug)]
pub enum ConsultError {
    // Backend errors (configuration class: fatal to a run)
    #[error("Backend '{backend}' unavailable: {message}")]
    ServiceUnavailable {
        backend: String,
        message: String,
        retriable: bool,
    },

    #[error("Rate limited by '{backend}', retry after {retry_after_ms}ms")]
    RateLimited {
        backend: String,
        retry_after_ms: u64,
    },

    #[error("No credentials for backend '{backend}'. Set {env_var} before running consultations.")]
    MissingCredentials { backend: String, env_var: String },

    // Malformed model output (degrades to a sentinel inside the pipeline)
    #[error("Backend '{backend}' returned an unusable response: {message}")]
    InvalidResponse { backend: String, message: String },

    // Workflow
    #[error("Workflow failed during {stage}: {source}")]
    RunFailed {
        stage: Stage,
        #[source]
        source: Box<ConsultError>,
        partial: Box<WorkflowState>,
    },

    #[error("Workflow '{correlation_id}' was cancelled")]
    Cancelled { correlation_id: String },

    #[error("Workflow '{0}' is already running")]
    RunInProgress(String),

    #[error("No checkpoint stored for workflow '{0}'")]
    CheckpointNotFound(String),

    // Caller errors
    #[error("Invalid business input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ConsultError {
    /// Transport-level failures a retry wrapper may repeat.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            ConsultError::ServiceUnavailable {
                retriable: true,
                ..
            } | ConsultError::RateLimited { .. }
        )
    }

    /// Backend unreachable, unauthenticated or misconfigured. Aborts a run.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ConsultError::ServiceUnavailable { .. }
                | ConsultError::RateLimited { .. }
                | ConsultError::MissingCredentials { .. }
                | ConsultError::Config(_)
        )
    }

    /// The model answered but the payload is unusable. Steps substitute a sentinel.
    pub fn is_malformed_output(&self) -> bool {
        matches!(self, ConsultError::InvalidResponse { .. })
    }

    /// State accumulated before a run aborted, if this error carries one.
    pub fn partial_state(&self) -> Option<&WorkflowState> {
        match self {
            ConsultError::RunFailed { partial, .. } => Some(partial),
            _ => None,
        }
    }

    /// Stage at which a run aborted.
    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            ConsultError::RunFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
