// src/core/types.rs — Core domain types

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::chart::ChartSpec;
use super::sentinel;
use crate::infra::errors::ConsultError;
use crate::provider::{Message, TokenUsage};

/// Minimum trimmed length of `business_type`.
pub const MIN_BUSINESS_TYPE_LEN: usize = 3;
/// Minimum trimmed length of `main_goal`.
pub const MIN_MAIN_GOAL_LEN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusinessStage {
    Idea,
    Startup,
    Growth,
    Mature,
    Established,
    Enterprise,
}

impl BusinessStage {
    pub const ALL: [BusinessStage; 6] = [
        BusinessStage::Idea,
        BusinessStage::Startup,
        BusinessStage::Growth,
        BusinessStage::Mature,
        BusinessStage::Established,
        BusinessStage::Enterprise,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BusinessStage::Idea => "idea",
            BusinessStage::Startup => "startup",
            BusinessStage::Growth => "growth",
            BusinessStage::Mature => "mature",
            BusinessStage::Established => "established",
            BusinessStage::Enterprise => "enterprise",
        }
    }
}

impl std::fmt::Display for BusinessStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BusinessStage {
    type Err = ConsultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        BusinessStage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == wanted)
            .ok_or_else(|| {
                ConsultError::InvalidInput(format!(
                    "business_stage '{s}' must be one of idea, startup, growth, mature, established, enterprise"
                ))
            })
    }
}

/// Snapshot of the business a consultation is about. Read-only in the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessContext {
    pub business_type: String,
    pub business_stage: BusinessStage,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub team_size: Option<u32>,
    #[serde(default)]
    pub monthly_revenue: Option<f64>,
    #[serde(default)]
    pub monthly_expenses: Option<f64>,
    pub main_goal: String,
    /// Order is preserved in prompts.
    #[serde(default)]
    pub other_goals: Vec<String>,
}

impl BusinessContext {
    pub fn new(
        business_type: impl Into<String>,
        business_stage: BusinessStage,
        main_goal: impl Into<String>,
    ) -> Self {
        Self {
            business_type: business_type.into(),
            business_stage,
            location: None,
            team_size: None,
            monthly_revenue: None,
            monthly_expenses: None,
            main_goal: main_goal.into(),
            other_goals: Vec::new(),
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_team_size(mut self, team_size: u32) -> Self {
        self.team_size = Some(team_size);
        self
    }

    pub fn with_financials(mut self, monthly_revenue: f64, monthly_expenses: f64) -> Self {
        self.monthly_revenue = Some(monthly_revenue);
        self.monthly_expenses = Some(monthly_expenses);
        self
    }

    pub fn with_other_goals<I, S>(mut self, goals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.other_goals = goals.into_iter().map(Into::into).collect();
        self
    }

    /// Normalise and check the upstream field constraints.
    ///
    /// Trims strings, drops blank optional strings and blank goals.
    pub fn validate(mut self) -> Result<Self, ConsultError> {
        self.business_type = self.business_type.trim().to_string();
        self.main_goal = self.main_goal.trim().to_string();
        self.location = self
            .location
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty());
        self.other_goals = self
            .other_goals
            .into_iter()
            .map(|g| g.trim().to_string())
            .filter(|g| !g.is_empty())
            .collect();

        if self.business_type.chars().count() < MIN_BUSINESS_TYPE_LEN {
            return Err(ConsultError::InvalidInput(format!(
                "business_type must be at least {MIN_BUSINESS_TYPE_LEN} characters"
            )));
        }
        if self.main_goal.chars().count() < MIN_MAIN_GOAL_LEN {
            return Err(ConsultError::InvalidInput(format!(
                "main_goal must be at least {MIN_MAIN_GOAL_LEN} characters"
            )));
        }
        if self.team_size == Some(0) {
            return Err(ConsultError::InvalidInput(
                "team_size must be at least 1".into(),
            ));
        }
        for (name, value) in [
            ("monthly_revenue", self.monthly_revenue),
            ("monthly_expenses", self.monthly_expenses),
        ] {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return Err(ConsultError::InvalidInput(format!(
                        "{name} must be a non-negative number"
                    )));
                }
            }
        }
        Ok(self)
    }

    /// Pretty JSON used verbatim in role prompts.
    pub fn to_prompt_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| format!("{self:?}"))
    }
}

/// Nodes of the refinement state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Generate,
    Critique,
    Refine,
    Decide,
    Visualize,
    Done,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Generate => "generate",
            Stage::Critique => "critique",
            Stage::Refine => "refine",
            Stage::Decide => "decide",
            Stage::Visualize => "visualize",
            Stage::Done => "done",
        };
        f.write_str(s)
    }
}

/// What the visualizer produced. Never executed, only rendered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum VisualizationArtifact {
    Charts(Vec<ChartSpec>),
    /// Model output that did not parse as a chart spec.
    Raw(String),
    /// No usable strategy existed, so the model was not called.
    NothingToVisualize,
    /// The model was called but returned nothing usable.
    Unavailable,
}

impl VisualizationArtifact {
    pub fn is_chart(&self) -> bool {
        matches!(self, VisualizationArtifact::Charts(_))
    }
}

/// Cooperative cancellation, checked between pipeline steps.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-run parameters supplied by the caller.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Caller-owned bookkeeping id; also keys checkpoints.
    pub correlation_id: String,
    pub max_rounds: u32,
    /// Whether the decision step may loop back for more rounds.
    pub refinement_requested: bool,
    /// Extra lines appended to the seed message.
    pub extra_context: Vec<String>,
    pub cancel: CancelHandle,
}

impl RunOptions {
    pub fn new(max_rounds: u32) -> Self {
        Self {
            correlation_id: format!("consult-{}", uuid::Uuid::new_v4()),
            max_rounds,
            refinement_requested: true,
            extra_context: Vec::new(),
            cancel: CancelHandle::new(),
        }
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = id.into();
        self
    }

    pub fn with_refinement_requested(mut self, requested: bool) -> Self {
        self.refinement_requested = requested;
        self
    }

    pub fn with_extra_context(mut self, line: impl Into<String>) -> Self {
        self.extra_context.push(line.into());
        self
    }

    pub fn with_cancel(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Mutable record threaded through one workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    pub correlation_id: String,
    pub business: BusinessContext,
    /// Append-only transcript.
    pub messages: Vec<Message>,
    /// Best strategy so far (refined if any round succeeded, else generated).
    pub current_strategy: Option<String>,
    pub generated_recommendations: Option<String>,
    pub critique: Option<String>,
    /// 1-10 score found in the latest critique. Informational only.
    pub critique_score: Option<u8>,
    pub refined_strategy: Option<String>,
    pub needs_refinement: bool,
    pub refinement_requested: bool,
    pub max_rounds: u32,
    pub current_round: u32,
    pub visualization: Option<VisualizationArtifact>,
    pub token_usage: TokenUsage,
}

impl WorkflowState {
    /// Initial state: round 0, refinement pending, transcript seeded with the goal.
    pub fn new(business: BusinessContext, options: &RunOptions) -> Self {
        let mut seed = format!("Help me with: {}", business.main_goal.trim());
        let extra: Vec<&str> = options
            .extra_context
            .iter()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .collect();
        if !extra.is_empty() {
            seed.push_str("\nAdditional context:\n");
            seed.push_str(&extra.join("\n"));
        }

        Self {
            correlation_id: options.correlation_id.clone(),
            business,
            messages: vec![Message::user(seed)],
            current_strategy: None,
            generated_recommendations: None,
            critique: None,
            critique_score: None,
            refined_strategy: None,
            needs_refinement: true,
            refinement_requested: options.refinement_requested,
            max_rounds: options.max_rounds,
            current_round: 0,
            visualization: None,
            token_usage: TokenUsage::default(),
        }
    }

    /// Generated strategy, unless it is a sentinel.
    pub fn usable_generated(&self) -> Option<&str> {
        sentinel::usable(self.generated_recommendations.as_deref())
    }

    /// Latest critique, unless it is a sentinel.
    pub fn usable_critique(&self) -> Option<&str> {
        sentinel::usable(self.critique.as_deref())
    }

    /// Refined strategy if usable, else the generated one.
    pub fn best_strategy(&self) -> Option<&str> {
        sentinel::usable(self.refined_strategy.as_deref()).or_else(|| self.usable_generated())
    }

    /// Merge a step's partial update field by field.
    pub fn apply(&mut self, update: StateUpdate) {
        self.messages.extend(update.messages);
        if let Some(v) = update.generated_recommendations {
            self.generated_recommendations = Some(v);
        }
        if let Some(v) = update.current_strategy {
            self.current_strategy = Some(v);
        }
        if let Some(v) = update.critique {
            self.critique = Some(v);
            self.critique_score = update.critique_score;
        }
        if let Some(v) = update.refined_strategy {
            self.refined_strategy = Some(v);
        }
        if let Some(v) = update.needs_refinement {
            self.needs_refinement = v;
        }
        if update.advance_round {
            self.current_round += 1;
        }
        if let Some(v) = update.visualization {
            self.visualization = Some(v);
        }
        self.token_usage.add(&update.usage);
    }
}

/// Fields one pipeline step sets. Unset fields leave the state untouched.
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    /// Appended to the transcript.
    pub messages: Vec<Message>,
    pub generated_recommendations: Option<String>,
    pub current_strategy: Option<String>,
    /// Replaces the critique; `critique_score` is replaced alongside it.
    pub critique: Option<String>,
    pub critique_score: Option<u8>,
    pub refined_strategy: Option<String>,
    pub needs_refinement: Option<bool>,
    pub advance_round: bool,
    pub visualization: Option<VisualizationArtifact>,
    pub usage: TokenUsage,
}

/// Observation emitted by a streamed run.
#[derive(Debug)]
pub enum StageEvent {
    /// One state-machine node finished; `state` is the snapshot after it.
    Completed {
        correlation_id: String,
        stage: Stage,
        next: Stage,
        state: Box<WorkflowState>,
    },
    /// The run reached `Done`.
    Finished(Box<WorkflowState>),
    /// The run aborted or was cancelled. Always the last event.
    Failed(ConsultError),
}

impl StageEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StageEvent::Completed { .. })
    }
}
