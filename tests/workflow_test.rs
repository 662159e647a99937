// tests/workflow_test.rs — Integration test: refinement workflow with a scripted mock provider

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use pretty_assertions::assert_eq;

use consultant::core::checkpoint::{Checkpointer, MemoryCheckpointer};
use consultant::core::generator::TextGenerator;
use consultant::core::machine::RefinementMachine;
use consultant::core::roles::AgentRole;
use consultant::core::sentinel;
use consultant::core::types::{
    BusinessContext, BusinessStage, CancelHandle, RunOptions, Stage, StageEvent,
    VisualizationArtifact,
};
use consultant::core::WorkflowRunner;
use consultant::infra::errors::ConsultError;
use consultant::provider::roles::RoleModels;
use consultant::provider::*;

const STRATEGY: &str = "Initial strategy: open at 6am for commuters.";
const CRITIQUE: &str = "1. Overall quality score: 6/10\n2. Strong points: timing\n3. Weaknesses: no budget";
const CHART: &str = r#"```json
{"kind": "line", "title": "Revenue", "labels": ["M1", "M2"], "series": [{"name": "revenue", "values": [1000, 1100]}]}
```"#;

/// How the mock answers one role.
#[derive(Clone)]
enum Script {
    /// Normal answer; the refiner appends its call number.
    Reply,
    Text(&'static str),
    Blank,
    Malformed,
    Down,
    /// Down on the first call, then a normal answer.
    DownOnce,
}

/// Answers by role (identified by temperature) and records every request.
struct MockProvider {
    scripts: HashMap<AgentRole, Script>,
    calls: Mutex<Vec<(AgentRole, ChatRequest)>>,
    failed_once: AtomicBool,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockProvider {
    fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            calls: Mutex::new(Vec::new()),
            failed_once: AtomicBool::new(false),
            delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    fn with(mut self, role: AgentRole, script: Script) -> Self {
        self.scripts.insert(role, script);
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn count(&self, role: AgentRole) -> usize {
        self.calls.lock().unwrap().iter().filter(|(r, _)| *r == role).count()
    }

    fn requests(&self, role: AgentRole) -> Vec<ChatRequest> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(r, _)| *r == role)
            .map(|(_, req)| req.clone())
            .collect()
    }

    fn answer(&self, role: AgentRole, n: usize) -> Result<String, ConsultError> {
        let down = || ConsultError::ServiceUnavailable {
            backend: "mock".into(),
            message: "connection refused".into(),
            retriable: false,
        };
        let script = self.scripts.get(&role).cloned().unwrap_or(Script::Reply);
        match script {
            Script::Reply => Ok(default_reply(role, n)),
            Script::Text(t) => Ok(t.to_string()),
            Script::Blank => Ok("   ".into()),
            Script::Malformed => Err(ConsultError::InvalidResponse {
                backend: "mock".into(),
                message: "choice has no text content".into(),
            }),
            Script::Down => Err(down()),
            Script::DownOnce => {
                if self.failed_once.swap(true, Ordering::SeqCst) {
                    Ok(default_reply(role, n))
                } else {
                    Err(down())
                }
            }
        }
    }
}

fn default_reply(role: AgentRole, n: usize) -> String {
    match role {
        AgentRole::Generator => STRATEGY.into(),
        AgentRole::Critic => CRITIQUE.into(),
        AgentRole::Refiner => format!("Refined strategy v{n}"),
        AgentRole::Visualizer => CHART.into(),
    }
}

#[async_trait]
impl ModelProvider for MockProvider {
    fn id(&self) -> &str {
        "mock"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ConsultError> {
        let role = AgentRole::ALL
            .into_iter()
            .find(|r| Some(r.temperature()) == request.temperature)
            .expect("request carries a role temperature");

        let n = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((role, request));
            calls.iter().filter(|(r, _)| *r == role).count()
        };

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let content = self.answer(role, n)?;
        Ok(ChatResponse {
            content,
            usage: TokenUsage {
                input_tokens: 100,
                output_tokens: 50,
            },
            stop_reason: StopReason::EndTurn,
        })
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────────

fn business() -> BusinessContext {
    BusinessContext::new(
        "coffee shop",
        BusinessStage::Startup,
        "Reach break-even within six months",
    )
    .with_location("Anuradhapura")
    .with_team_size(3)
    .with_financials(5000.0, 4000.0)
    .with_other_goals(["Launch delivery", "Build a loyalty program"])
}

fn runner_with(provider: Arc<MockProvider>, max_concurrent: usize) -> WorkflowRunner {
    let generator = TextGenerator::new(provider, RoleModels::from_single("mock-model"));
    WorkflowRunner::new(RefinementMachine::new(generator), max_concurrent)
}

fn runner(provider: Arc<MockProvider>) -> WorkflowRunner {
    runner_with(provider, 4)
}

// ─── Happy path ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_single_round_runs_each_role_once() {
    let provider = Arc::new(MockProvider::new());
    let state = runner(provider.clone()).run(business(), 1).await.unwrap();

    assert_eq!(state.current_round, 1);
    assert!(!state.needs_refinement);
    for role in AgentRole::ALL {
        assert_eq!(provider.count(role), 1, "{role} calls");
    }
    assert_eq!(state.generated_recommendations.as_deref(), Some(STRATEGY));
    assert_eq!(state.refined_strategy.as_deref(), Some("Refined strategy v1"));
    assert_eq!(state.current_strategy.as_deref(), Some("Refined strategy v1"));
    assert_eq!(state.critique_score, Some(6));
    assert!(matches!(state.visualization, Some(VisualizationArtifact::Charts(ref c)) if c.len() == 1));
    assert_eq!(state.token_usage.total(), 4 * 150);
}

#[tokio::test]
async fn test_transcript_has_two_entries_per_step_plus_seed() {
    let provider = Arc::new(MockProvider::new());
    let state = runner(provider).run(business(), 1).await.unwrap();

    assert_eq!(state.messages.len(), 2 * 4 + 1);
    assert_eq!(state.messages[0].role, Role::User);
    assert_eq!(
        state.messages[0].content,
        "Help me with: Reach break-even within six months"
    );
    for pair in state.messages[1..].chunks(2) {
        assert_eq!(pair[0].role, Role::User);
        assert_eq!(pair[1].role, Role::Assistant);
    }
}

#[tokio::test]
async fn test_three_rounds_loop_critique_and_refine() {
    let provider = Arc::new(MockProvider::new());
    let state = runner(provider.clone()).run(business(), 3).await.unwrap();

    assert_eq!(state.current_round, 3);
    assert_eq!(provider.count(AgentRole::Generator), 1);
    assert_eq!(provider.count(AgentRole::Critic), 3);
    assert_eq!(provider.count(AgentRole::Refiner), 3);
    assert_eq!(provider.count(AgentRole::Visualizer), 1);
    assert_eq!(state.refined_strategy.as_deref(), Some("Refined strategy v3"));
    assert_eq!(state.messages.len(), 2 * 8 + 1);
}

#[tokio::test]
async fn test_later_rounds_critique_the_refined_strategy() {
    let provider = Arc::new(MockProvider::new());
    runner(provider.clone()).run(business(), 2).await.unwrap();

    let critic = provider.requests(AgentRole::Critic);
    let last_prompt = |req: &ChatRequest| req.messages.last().unwrap().content.clone();
    assert!(last_prompt(&critic[0]).contains(STRATEGY));
    assert!(last_prompt(&critic[1]).contains("Refined strategy v1"));

    let refiner = provider.requests(AgentRole::Refiner);
    assert!(last_prompt(&refiner[1]).contains("Refined strategy v1"));
    assert!(last_prompt(&refiner[1]).contains("address ALL points"));
}

#[tokio::test]
async fn test_requests_carry_role_settings_and_transcript() {
    let provider = Arc::new(MockProvider::new());
    runner(provider.clone()).run(business(), 1).await.unwrap();

    let generator = &provider.requests(AgentRole::Generator)[0];
    assert_eq!(generator.model, "mock-model");
    assert_eq!(generator.messages.len(), 2);
    assert!(generator.messages[1].content.contains("Other goals: Launch delivery, Build a loyalty program"));

    let visualizer = &provider.requests(AgentRole::Visualizer)[0];
    assert_eq!(visualizer.temperature, Some(0.35));
    // seed + generate + critique + refine pairs, then the visualizer prompt
    assert_eq!(visualizer.messages.len(), 8);
}

// ─── Round policy ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_zero_rounds_still_performs_one_pass() {
    let provider = Arc::new(MockProvider::new());
    let state = runner(provider.clone()).run(business(), 0).await.unwrap();

    assert_eq!(state.current_round, 1);
    assert_eq!(provider.count(AgentRole::Critic), 1);
    assert_eq!(provider.count(AgentRole::Refiner), 1);
}

#[tokio::test]
async fn test_refinement_not_requested_stops_after_first_pass() {
    let provider = Arc::new(MockProvider::new());
    let options = RunOptions::new(3).with_refinement_requested(false);
    let state = runner(provider.clone())
        .run_with_options(business(), options)
        .await
        .unwrap();

    assert_eq!(state.current_round, 1);
    assert_eq!(provider.count(AgentRole::Refiner), 1);
}

#[tokio::test]
async fn test_every_round_budget_terminates_within_bound() {
    for max_rounds in 0..=4u32 {
        for requested in [true, false] {
            let provider = Arc::new(MockProvider::new());
            let options = RunOptions::new(max_rounds).with_refinement_requested(requested);
            let state = runner(provider)
                .run_with_options(business(), options)
                .await
                .unwrap();

            let expected = if requested { max_rounds.max(1) } else { 1 };
            assert_eq!(state.current_round, expected, "max_rounds={max_rounds} requested={requested}");
            assert!(state.current_round <= max_rounds.max(1));
            assert!(!state.needs_refinement);
        }
    }
}

#[tokio::test]
async fn test_low_score_does_not_force_extra_rounds() {
    let provider = Arc::new(MockProvider::new().with(AgentRole::Critic, Script::Text("Score: 1/10")));
    let state = runner(provider.clone()).run(business(), 1).await.unwrap();
    assert_eq!(state.critique_score, Some(1));
    assert_eq!(provider.count(AgentRole::Refiner), 1);
}

// ─── Graceful degradation ───────────────────────────────────────────────────

#[tokio::test]
async fn test_missing_strategy_degrades_to_sentinels() {
    let provider = Arc::new(MockProvider::new().with(AgentRole::Generator, Script::Blank));
    let state = runner(provider.clone()).run(business(), 1).await.unwrap();

    assert_eq!(
        state.generated_recommendations.as_deref(),
        Some(sentinel::STRATEGY_UNAVAILABLE)
    );
    assert_eq!(state.critique.as_deref(), Some(sentinel::NO_STRATEGY_TO_CRITIQUE));
    assert_eq!(state.refined_strategy.as_deref(), Some(sentinel::NO_ORIGINAL_STRATEGY));
    assert_eq!(state.visualization, Some(VisualizationArtifact::NothingToVisualize));
    assert!(state.current_strategy.is_none());
    assert_eq!(state.current_round, 1);

    // Only the generator was called, and its blank answer was not recorded
    assert_eq!(provider.count(AgentRole::Critic), 0);
    assert_eq!(provider.count(AgentRole::Refiner), 0);
    assert_eq!(provider.count(AgentRole::Visualizer), 0);
    assert_eq!(state.messages.len(), 1);
}

#[tokio::test]
async fn test_malformed_critique_skips_refinement_but_visualizes() {
    let provider = Arc::new(MockProvider::new().with(AgentRole::Critic, Script::Malformed));
    let state = runner(provider.clone()).run(business(), 1).await.unwrap();

    assert_eq!(state.critique.as_deref(), Some(sentinel::CRITIQUE_UNAVAILABLE));
    assert_eq!(state.refined_strategy.as_deref(), Some(sentinel::NO_CRITIQUE_TO_REFINE));
    assert_eq!(state.current_strategy.as_deref(), Some(STRATEGY));
    assert_eq!(provider.count(AgentRole::Refiner), 0);

    // Visualizer falls back to the generated strategy
    let viz = provider.requests(AgentRole::Visualizer);
    assert_eq!(viz.len(), 1);
    assert!(viz[0].messages.last().unwrap().content.contains(STRATEGY));
    assert_eq!(state.messages.len(), 1 + 2 + 2);
}

#[tokio::test]
async fn test_blank_refinement_keeps_generated_strategy() {
    let provider = Arc::new(MockProvider::new().with(AgentRole::Refiner, Script::Blank));
    let state = runner(provider).run(business(), 1).await.unwrap();

    assert_eq!(state.refined_strategy.as_deref(), Some(sentinel::REFINED_UNAVAILABLE));
    assert_eq!(state.best_strategy(), Some(STRATEGY));
    assert_eq!(state.current_round, 1);
}

#[tokio::test]
async fn test_unparseable_chart_kept_raw() {
    let provider = Arc::new(
        MockProvider::new().with(AgentRole::Visualizer, Script::Text("fig = px.line(df)")),
    );
    let state = runner(provider).run(business(), 1).await.unwrap();
    assert_eq!(
        state.visualization,
        Some(VisualizationArtifact::Raw("fig = px.line(df)".into()))
    );
}

#[tokio::test]
async fn test_malformed_visualization_is_unavailable() {
    let provider = Arc::new(MockProvider::new().with(AgentRole::Visualizer, Script::Malformed));
    let state = runner(provider).run(business(), 1).await.unwrap();
    assert_eq!(state.visualization, Some(VisualizationArtifact::Unavailable));
}

// ─── Failures, resume, cancellation ─────────────────────────────────────────

#[tokio::test]
async fn test_backend_failure_aborts_with_partial_state() {
    let provider = Arc::new(MockProvider::new().with(AgentRole::Critic, Script::Down));
    let err = runner(provider.clone()).run(business(), 3).await.unwrap_err();

    assert_eq!(err.failed_stage(), Some(Stage::Critique));
    let partial = err.partial_state().unwrap();
    assert_eq!(partial.generated_recommendations.as_deref(), Some(STRATEGY));
    assert!(partial.critique.is_none());
    assert_eq!(partial.messages.len(), 3);
    match err {
        ConsultError::RunFailed { source, .. } => assert!(source.is_configuration()),
        other => panic!("expected RunFailed, got {other:?}"),
    }
    // No automatic retry
    assert_eq!(provider.count(AgentRole::Critic), 1);
    assert_eq!(provider.count(AgentRole::Refiner), 0);
}

#[tokio::test]
async fn test_resume_continues_from_failed_stage() {
    let provider = Arc::new(MockProvider::new().with(AgentRole::Refiner, Script::DownOnce));
    let runner = runner(provider.clone());
    let options = RunOptions::new(1).with_correlation_id("resume-me");

    let err = runner.run_with_options(business(), options).await.unwrap_err();
    assert_eq!(err.failed_stage(), Some(Stage::Refine));
    assert!(runner.checkpointer().load("resume-me").unwrap().is_some());

    let state = runner.resume("resume-me").await.unwrap();
    assert_eq!(state.correlation_id, "resume-me");
    assert_eq!(state.current_round, 1);
    assert_eq!(state.refined_strategy.as_deref(), Some("Refined strategy v2"));
    // Generate and Critique were not repeated
    assert_eq!(provider.count(AgentRole::Generator), 1);
    assert_eq!(provider.count(AgentRole::Critic), 1);
    assert_eq!(state.messages.len(), 2 * 4 + 1);
    assert!(runner.checkpointer().load("resume-me").unwrap().is_none());
}

#[tokio::test]
async fn test_resume_unknown_id() {
    let provider = Arc::new(MockProvider::new());
    let err = runner(provider).resume("never-ran").await.unwrap_err();
    assert!(matches!(err, ConsultError::CheckpointNotFound(id) if id == "never-ran"));
}

#[tokio::test]
async fn test_failed_run_checkpoints_stay_bounded() {
    let provider = Arc::new(MockProvider::new().with(AgentRole::Generator, Script::Down));
    let store = Arc::new(MemoryCheckpointer::with_retention(8, 3600));
    let runner = runner(provider).with_checkpointer(store.clone());

    for i in 0..50 {
        let options = RunOptions::new(1).with_correlation_id(format!("failed-{i}"));
        assert!(runner.run_with_options(business(), options).await.is_err());
    }

    assert_eq!(store.len(), 8);
    assert!(store.load("failed-0").unwrap().is_none());
    let latest = store.load("failed-49").unwrap().unwrap();
    assert_eq!(latest.next, Stage::Generate);
}

#[tokio::test]
async fn test_cancel_between_stages() {
    let provider = Arc::new(MockProvider::new());
    let runner = runner(provider.clone());
    let cancel = CancelHandle::new();
    let options = RunOptions::new(3)
        .with_correlation_id("cancel-me")
        .with_cancel(cancel.clone());

    let mut events = runner.stream(business(), options);
    let first = events.next().await.unwrap();
    assert!(matches!(first, StageEvent::Completed { stage: Stage::Generate, .. }));

    cancel.cancel();
    match events.next().await.unwrap() {
        StageEvent::Failed(ConsultError::Cancelled { correlation_id }) => {
            assert_eq!(correlation_id, "cancel-me")
        }
        other => panic!("expected cancellation, got {other:?}"),
    }
    assert!(events.next().await.is_none());
    assert_eq!(provider.count(AgentRole::Critic), 0);
    assert!(runner.checkpointer().load("cancel-me").unwrap().is_none());
}

// ─── Observation ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_stream_emits_one_event_per_node_in_order() {
    let provider = Arc::new(MockProvider::new());
    let events: Vec<StageEvent> = runner(provider)
        .stream(business(), RunOptions::new(2))
        .collect()
        .await;

    let stages: Vec<Stage> = events
        .iter()
        .filter_map(|e| match e {
            StageEvent::Completed { stage, .. } => Some(*stage),
            _ => None,
        })
        .collect();
    assert_eq!(
        stages,
        vec![
            Stage::Generate,
            Stage::Critique,
            Stage::Refine,
            Stage::Decide,
            Stage::Critique,
            Stage::Refine,
            Stage::Decide,
            Stage::Visualize,
        ]
    );
    assert!(matches!(events.last(), Some(StageEvent::Finished(s)) if s.current_round == 2));

    // Rounds never decrease across snapshots
    let rounds: Vec<u32> = events
        .iter()
        .filter_map(|e| match e {
            StageEvent::Completed { state, .. } => Some(state.current_round),
            _ => None,
        })
        .collect();
    assert!(rounds.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn test_progress_callback_sees_every_event() {
    let provider = Arc::new(MockProvider::new());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let runner = runner(provider).with_progress(move |event| {
        let label = match event {
            StageEvent::Completed { stage, .. } => stage.to_string(),
            StageEvent::Finished(_) => "finished".to_string(),
            StageEvent::Failed(_) => "failed".to_string(),
        };
        sink.lock().unwrap().push(label);
    });

    runner.run(business(), 1).await.unwrap();
    assert_eq!(
        *seen.lock().unwrap(),
        vec!["generate", "critique", "refine", "decide", "visualize", "finished"]
    );
}

#[tokio::test]
async fn test_extra_context_reaches_first_request() {
    let provider = Arc::new(MockProvider::new());
    let options = RunOptions::new(1).with_extra_context("Target monthly revenue: $9,000.00");
    runner(provider.clone())
        .run_with_options(business(), options)
        .await
        .unwrap();

    let first = &provider.requests(AgentRole::Generator)[0];
    assert_eq!(
        first.messages[0].content,
        "Help me with: Reach break-even within six months\nAdditional context:\nTarget monthly revenue: $9,000.00"
    );
}

// ─── Concurrency ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_concurrent_runs_are_independent() {
    let provider = Arc::new(MockProvider::new().with_delay(Duration::from_millis(5)));
    let runner = Arc::new(runner(provider));

    let handles: Vec<_> = (1..=3u32)
        .map(|rounds| {
            let runner = runner.clone();
            tokio::spawn(async move {
                let options = RunOptions::new(rounds).with_correlation_id(format!("run-{rounds}"));
                runner.run_with_options(business(), options).await
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let rounds = i as u32 + 1;
        let state = handle.await.unwrap().unwrap();
        assert_eq!(state.correlation_id, format!("run-{rounds}"));
        assert_eq!(state.current_round, rounds);
        assert_eq!(state.messages.len(), 2 * (2 + 2 * rounds as usize) + 1);
    }
}

#[tokio::test]
async fn test_admission_limits_concurrent_runs() {
    let provider = Arc::new(MockProvider::new().with_delay(Duration::from_millis(5)));
    let runner = Arc::new(runner_with(provider.clone(), 1));

    let runs = (0..3).map(|_| {
        let runner = runner.clone();
        async move { runner.run(business(), 1).await }
    });
    let results = futures::future::join_all(runs).await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(provider.max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(provider.count(AgentRole::Generator), 3);
}

#[tokio::test]
async fn test_duplicate_correlation_id_rejected_while_running() {
    let provider = Arc::new(MockProvider::new());
    let runner = runner(provider.clone());
    let shared = || RunOptions::new(1).with_correlation_id("shared");

    let mut first = runner.stream(business(), shared());
    let event = first.next().await.unwrap();
    assert!(matches!(event, StageEvent::Completed { stage: Stage::Generate, .. }));

    let err = runner.run_with_options(business(), shared()).await.unwrap_err();
    assert!(matches!(err, ConsultError::RunInProgress(id) if id == "shared"));
    // The running workflow keeps its checkpoint
    let checkpoint = runner.checkpointer().load("shared").unwrap().unwrap();
    assert_eq!(checkpoint.next, Stage::Critique);

    let rest: Vec<StageEvent> = first.collect().await;
    assert!(matches!(rest.last(), Some(StageEvent::Finished(_))));
    assert_eq!(provider.count(AgentRole::Generator), 1);

    // Free again once the first run is done
    let state = runner.run_with_options(business(), shared()).await.unwrap();
    assert_eq!(state.correlation_id, "shared");
}

#[tokio::test]
async fn test_dropped_stream_releases_correlation_id() {
    let provider = Arc::new(MockProvider::new());
    let runner = runner(provider);
    let options = || RunOptions::new(1).with_correlation_id("abandoned");

    let mut events = runner.stream(business(), options());
    assert!(events.next().await.is_some());
    drop(events);

    let state = runner.run_with_options(business(), options()).await.unwrap();
    assert_eq!(state.correlation_id, "abandoned");
}
