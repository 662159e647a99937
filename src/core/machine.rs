// src/core/machine.rs — Refinement state machine: one node per call

use super::generator::TextGenerator;
use super::steps;
use super::types::{Stage, StateUpdate, WorkflowState};
use crate::infra::errors::ConsultError;

/// Drives Generate → Critique → Refine → Decide → (Critique | Visualize) → Done.
///
/// Stateless between calls; everything a run needs lives in `WorkflowState`,
/// so one machine serves any number of concurrent runs.
pub struct RefinementMachine {
    generator: TextGenerator,
}

impl RefinementMachine {
    pub fn new(generator: TextGenerator) -> Self {
        Self { generator }
    }

    pub fn generator(&self) -> &TextGenerator {
        &self.generator
    }

    /// Execute `stage`, merge its update into `state`, and return the next stage.
    ///
    /// On error `state` is left exactly as it was before the call.
    pub async fn step(&self, stage: Stage, state: &mut WorkflowState) -> Result<Stage, ConsultError> {
        let (update, next) = match stage {
            Stage::Generate => (steps::generate(&self.generator, state).await?, Stage::Critique),
            Stage::Critique => (steps::critique(&self.generator, state).await?, Stage::Refine),
            Stage::Refine => (steps::refine(&self.generator, state).await?, Stage::Decide),
            Stage::Decide => decide(state),
            Stage::Visualize => (steps::visualize(&self.generator, state).await?, Stage::Done),
            Stage::Done => (StateUpdate::default(), Stage::Done),
        };
        state.apply(update);
        Ok(next)
    }
}

/// Loop back iff refinement was requested and rounds remain.
///
/// Counter-and-flag only; critique content and score are never consulted.
pub fn decide(state: &WorkflowState) -> (StateUpdate, Stage) {
    let again = state.refinement_requested && state.current_round < state.max_rounds;
    let update = StateUpdate {
        needs_refinement: Some(again),
        ..Default::default()
    };
    let next = if again { Stage::Critique } else { Stage::Visualize };
    (update, next)
}
