// src/core/steps.rs — The four role steps, each returning a partial state update
//
// Configuration-class errors propagate to the caller. Malformed or empty model
// output is replaced by a sentinel and the run continues.

use super::chart::parse_visualization;
use super::critique::extract_score;
use super::generator::TextGenerator;
use super::roles::{self, AgentRole};
use super::sentinel;
use super::types::{StateUpdate, VisualizationArtifact, WorkflowState};
use crate::infra::errors::ConsultError;
use crate::provider::{Message, TokenUsage};

/// What a role call produced, from a step's point of view.
enum Reply {
    Usable {
        text: String,
        /// Entries appended to the transcript by this call.
        messages: Vec<Message>,
        usage: TokenUsage,
    },
    Unusable {
        usage: TokenUsage,
    },
}

async fn invoke(
    generator: &TextGenerator,
    role: AgentRole,
    state: &WorkflowState,
    prompt: String,
) -> Result<Reply, ConsultError> {
    let prior = state.messages.len();
    match generator.generate(role, state.messages.clone(), prompt).await {
        Ok(generation) if generation.is_usable() => {
            let mut transcript = generation.transcript;
            let messages = transcript.split_off(prior);
            Ok(Reply::Usable {
                text: generation.text,
                messages,
                usage: generation.usage,
            })
        }
        Ok(generation) => {
            tracing::warn!(
                correlation_id = %state.correlation_id,
                role = %role,
                "Model returned empty output; recording placeholder"
            );
            Ok(Reply::Unusable {
                usage: generation.usage,
            })
        }
        Err(e) if e.is_malformed_output() => {
            tracing::warn!(
                correlation_id = %state.correlation_id,
                role = %role,
                "Model output unusable ({}); recording placeholder",
                e
            );
            Ok(Reply::Unusable {
                usage: TokenUsage::default(),
            })
        }
        Err(e) => Err(e),
    }
}

/// Produce the initial strategy.
pub async fn generate(
    generator: &TextGenerator,
    state: &WorkflowState,
) -> Result<StateUpdate, ConsultError> {
    let prompt = roles::generator_prompt(&state.business);
    let update = match invoke(generator, AgentRole::Generator, state, prompt).await? {
        Reply::Usable {
            text,
            messages,
            usage,
        } => StateUpdate {
            generated_recommendations: Some(text.clone()),
            current_strategy: Some(text),
            messages,
            usage,
            ..Default::default()
        },
        Reply::Unusable { usage } => StateUpdate {
            generated_recommendations: Some(sentinel::STRATEGY_UNAVAILABLE.into()),
            usage,
            ..Default::default()
        },
    };
    Ok(update)
}

/// Critique the best strategy so far.
pub async fn critique(
    generator: &TextGenerator,
    state: &WorkflowState,
) -> Result<StateUpdate, ConsultError> {
    let Some(strategy) = state
        .usable_generated()
        .and_then(|_| state.best_strategy())
    else {
        tracing::warn!(correlation_id = %state.correlation_id, "Nothing to critique");
        return Ok(StateUpdate {
            critique: Some(sentinel::NO_STRATEGY_TO_CRITIQUE.into()),
            ..Default::default()
        });
    };

    let prompt = roles::critic_prompt(&state.business, strategy);
    let update = match invoke(generator, AgentRole::Critic, state, prompt).await? {
        Reply::Usable {
            text,
            messages,
            usage,
        } => StateUpdate {
            critique_score: extract_score(&text),
            critique: Some(text),
            messages,
            usage,
            ..Default::default()
        },
        Reply::Unusable { usage } => StateUpdate {
            critique: Some(sentinel::CRITIQUE_UNAVAILABLE.into()),
            usage,
            ..Default::default()
        },
    };
    Ok(update)
}

/// Improve the best strategy using the latest critique. Always closes a round.
pub async fn refine(
    generator: &TextGenerator,
    state: &WorkflowState,
) -> Result<StateUpdate, ConsultError> {
    let closed_round = StateUpdate {
        advance_round: true,
        needs_refinement: Some(false),
        ..Default::default()
    };

    if state.usable_generated().is_none() {
        tracing::warn!(correlation_id = %state.correlation_id, "No original strategy to refine");
        return Ok(StateUpdate {
            refined_strategy: Some(sentinel::NO_ORIGINAL_STRATEGY.into()),
            ..closed_round
        });
    }
    let (Some(strategy), Some(critique)) = (state.best_strategy(), state.usable_critique()) else {
        tracing::warn!(correlation_id = %state.correlation_id, "No critique to refine against");
        return Ok(StateUpdate {
            refined_strategy: Some(sentinel::NO_CRITIQUE_TO_REFINE.into()),
            ..closed_round
        });
    };

    let prompt = roles::refiner_prompt(&state.business, strategy, critique);
    let update = match invoke(generator, AgentRole::Refiner, state, prompt).await? {
        Reply::Usable {
            text,
            messages,
            usage,
        } => StateUpdate {
            refined_strategy: Some(text.clone()),
            current_strategy: Some(text),
            messages,
            usage,
            ..closed_round
        },
        Reply::Unusable { usage } => StateUpdate {
            refined_strategy: Some(sentinel::REFINED_UNAVAILABLE.into()),
            usage,
            ..closed_round
        },
    };
    Ok(update)
}

/// Describe charts for the best strategy, or mark that there is none.
pub async fn visualize(
    generator: &TextGenerator,
    state: &WorkflowState,
) -> Result<StateUpdate, ConsultError> {
    let Some(strategy) = state.best_strategy() else {
        return Ok(StateUpdate {
            visualization: Some(VisualizationArtifact::NothingToVisualize),
            ..Default::default()
        });
    };

    let prompt = roles::visualizer_prompt(&state.business, strategy);
    let update = match invoke(generator, AgentRole::Visualizer, state, prompt).await? {
        Reply::Usable {
            text,
            messages,
            usage,
        } => StateUpdate {
            visualization: Some(parse_visualization(&text)),
            messages,
            usage,
            ..Default::default()
        },
        Reply::Unusable { usage } => StateUpdate {
            visualization: Some(VisualizationArtifact::Unavailable),
            usage,
            ..Default::default()
        },
    };
    Ok(update)
}
