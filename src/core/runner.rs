// src/core/runner.rs — Workflow entry point: streaming, checkpoints, cancellation, admission

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::sync::Semaphore;

use super::checkpoint::{Checkpoint, Checkpointer, MemoryCheckpointer};
use super::generator::TextGenerator;
use super::machine::RefinementMachine;
use super::types::{BusinessContext, CancelHandle, RunOptions, Stage, StageEvent, WorkflowState};
use crate::infra::config::Config;
use crate::infra::errors::ConsultError;
use crate::provider::ModelProvider;

type ProgressCallback = Box<dyn Fn(&StageEvent) + Send + Sync>;

/// Runs consultations to completion or as a stream of stage events.
///
/// Shareable across tasks: every run owns its `WorkflowState`, and at most
/// `max_concurrent_runs` runs execute at once. Further runs wait for a slot.
pub struct WorkflowRunner {
    machine: Arc<RefinementMachine>,
    checkpointer: Arc<dyn Checkpointer>,
    admission: Arc<Semaphore>,
    active: Arc<Mutex<HashSet<String>>>,
    refinement_requested: bool,
    on_progress: Option<ProgressCallback>,
}

impl WorkflowRunner {
    pub fn new(machine: RefinementMachine, max_concurrent_runs: usize) -> Self {
        Self {
            machine: Arc::new(machine),
            checkpointer: Arc::new(MemoryCheckpointer::new()),
            admission: Arc::new(Semaphore::new(max_concurrent_runs.max(1))),
            active: Arc::new(Mutex::new(HashSet::new())),
            refinement_requested: true,
            on_progress: None,
        }
    }

    pub fn from_config(provider: Arc<dyn ModelProvider>, config: &Config) -> Self {
        let generator = TextGenerator::from_config(provider, &config.backend);
        let checkpointer = MemoryCheckpointer::with_retention(
            config.workflow.max_checkpoints,
            config.workflow.checkpoint_ttl_secs,
        );
        Self::new(
            RefinementMachine::new(generator),
            config.workflow.max_concurrent_runs,
        )
        .with_checkpointer(Arc::new(checkpointer))
        .with_refinement_requested(config.workflow.refinement_requested)
    }

    pub fn with_checkpointer(mut self, checkpointer: Arc<dyn Checkpointer>) -> Self {
        self.checkpointer = checkpointer;
        self
    }

    /// Default for `refinement_requested` when `run()` builds the options.
    pub fn with_refinement_requested(mut self, requested: bool) -> Self {
        self.refinement_requested = requested;
        self
    }

    /// Set a callback invoked for every event of runs driven by `run*`/`resume`.
    pub fn with_progress(mut self, cb: impl Fn(&StageEvent) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Box::new(cb));
        self
    }

    fn emit(&self, event: &StageEvent) {
        if let Some(ref cb) = self.on_progress {
            cb(event);
        }
    }

    pub fn checkpointer(&self) -> &Arc<dyn Checkpointer> {
        &self.checkpointer
    }

    /// Run with a fresh correlation id and the runner's refinement default.
    pub async fn run(
        &self,
        context: BusinessContext,
        max_rounds: u32,
    ) -> Result<WorkflowState, ConsultError> {
        let options = RunOptions::new(max_rounds).with_refinement_requested(self.refinement_requested);
        self.run_with_options(context, options).await
    }

    pub async fn run_with_options(
        &self,
        context: BusinessContext,
        options: RunOptions,
    ) -> Result<WorkflowState, ConsultError> {
        let events = self.stream(context, options);
        self.drain(events).await
    }

    /// Continue a run from its last checkpoint, e.g. after a failed stage.
    pub async fn resume(&self, correlation_id: &str) -> Result<WorkflowState, ConsultError> {
        let events = self.resume_stream(correlation_id, CancelHandle::new())?;
        self.drain(events).await
    }

    /// One `Completed` event per finished node, then `Finished` or `Failed`.
    ///
    /// A correlation id may drive one run at a time. A second run with an id
    /// that is still executing yields `Failed(RunInProgress)` and leaves the
    /// first run and its checkpoint untouched.
    pub fn stream(
        &self,
        context: BusinessContext,
        options: RunOptions,
    ) -> BoxStream<'static, StageEvent> {
        let state = WorkflowState::new(context, &options);
        self.drive(state, Stage::Generate, options.cancel)
    }

    pub fn resume_stream(
        &self,
        correlation_id: &str,
        cancel: CancelHandle,
    ) -> Result<BoxStream<'static, StageEvent>, ConsultError> {
        let checkpoint = self
            .checkpointer
            .load(correlation_id)?
            .ok_or_else(|| ConsultError::CheckpointNotFound(correlation_id.to_string()))?;
        tracing::info!(
            correlation_id,
            stage = %checkpoint.next,
            round = checkpoint.state.current_round,
            "Resuming workflow"
        );
        Ok(self.drive(checkpoint.state, checkpoint.next, cancel))
    }

    async fn drain(&self, mut events: BoxStream<'static, StageEvent>) -> Result<WorkflowState, ConsultError> {
        while let Some(event) = events.next().await {
            self.emit(&event);
            match event {
                StageEvent::Completed { .. } => {}
                StageEvent::Finished(state) => return Ok(*state),
                StageEvent::Failed(e) => return Err(e),
            }
        }
        Err(ConsultError::Other(anyhow::anyhow!(
            "workflow stream ended without a result"
        )))
    }

    fn drive(
        &self,
        mut state: WorkflowState,
        start: Stage,
        cancel: CancelHandle,
    ) -> BoxStream<'static, StageEvent> {
        let machine = self.machine.clone();
        let checkpointer = self.checkpointer.clone();
        let admission = self.admission.clone();
        let active = self.active.clone();

        Box::pin(async_stream::stream! {
            let id = state.correlation_id.clone();
            let _claim = match ActiveRun::claim(&active, &id) {
                Some(claim) => claim,
                None => {
                    tracing::warn!(correlation_id = %id, "Rejected run: correlation id already in use");
                    yield StageEvent::Failed(ConsultError::RunInProgress(id));
                    return;
                }
            };
            let _permit = match admission.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    yield StageEvent::Failed(ConsultError::Other(anyhow::anyhow!("workflow runner is closed")));
                    return;
                }
            };

            tracing::info!(correlation_id = %id, stage = %start, max_rounds = state.max_rounds, "Workflow started");
            save_checkpoint(checkpointer.as_ref(), &state, start);

            let mut stage = start;
            while stage != Stage::Done {
                if cancel.is_cancelled() {
                    discard_checkpoint(checkpointer.as_ref(), &id);
                    tracing::warn!(correlation_id = %id, stage = %stage, "Workflow cancelled");
                    yield StageEvent::Failed(ConsultError::Cancelled { correlation_id: id.clone() });
                    return;
                }

                match machine.step(stage, &mut state).await {
                    Ok(next) => {
                        tracing::info!(
                            correlation_id = %id,
                            stage = %stage,
                            next = %next,
                            round = state.current_round,
                            "Stage completed"
                        );
                        if next == Stage::Done {
                            discard_checkpoint(checkpointer.as_ref(), &id);
                        } else {
                            save_checkpoint(checkpointer.as_ref(), &state, next);
                        }
                        yield StageEvent::Completed {
                            correlation_id: id.clone(),
                            stage,
                            next,
                            state: Box::new(state.clone()),
                        };
                        stage = next;
                    }
                    Err(e) => {
                        tracing::error!(correlation_id = %id, stage = %stage, "Workflow aborted: {}", e);
                        yield StageEvent::Failed(ConsultError::RunFailed {
                            stage,
                            source: Box::new(e),
                            partial: Box::new(state.clone()),
                        });
                        return;
                    }
                }
            }

            tracing::info!(
                correlation_id = %id,
                rounds = state.current_round,
                tokens = state.token_usage.total(),
                "Workflow finished"
            );
            yield StageEvent::Finished(Box::new(state));
        })
    }
}

/// Marks a correlation id as executing until dropped, including when the
/// caller drops the stream mid-run.
struct ActiveRun {
    ids: Arc<Mutex<HashSet<String>>>,
    id: String,
}

impl ActiveRun {
    fn claim(ids: &Arc<Mutex<HashSet<String>>>, id: &str) -> Option<Self> {
        let mut set = ids.lock().unwrap_or_else(|e| e.into_inner());
        if !set.insert(id.to_string()) {
            return None;
        }
        Some(Self {
            ids: ids.clone(),
            id: id.to_string(),
        })
    }
}

impl Drop for ActiveRun {
    fn drop(&mut self) {
        let mut set = self.ids.lock().unwrap_or_else(|e| e.into_inner());
        set.remove(&self.id);
    }
}

/// Checkpoint failures never abort a run.
fn save_checkpoint(checkpointer: &dyn Checkpointer, state: &WorkflowState, next: Stage) {
    let checkpoint = Checkpoint {
        state: state.clone(),
        next,
        updated_at: Utc::now(),
    };
    if let Err(e) = checkpointer.save(&state.correlation_id, checkpoint) {
        tracing::warn!(correlation_id = %state.correlation_id, "Failed to save checkpoint: {}", e);
    }
}

fn discard_checkpoint(checkpointer: &dyn Checkpointer, correlation_id: &str) {
    if let Err(e) = checkpointer.remove(correlation_id) {
        tracing::warn!(correlation_id, "Failed to remove checkpoint: {}", e);
    }
}
