// src/cli/progress.rs — Terminal progress renderer for stage events

use crate::core::types::{Stage, StageEvent};

/// One progress line for an event.
pub fn format_event(event: &StageEvent) -> String {
    match event {
        StageEvent::Completed {
            stage, next, state, ..
        } => match stage {
            Stage::Refine => format!(
                "[refine] round {}/{} complete",
                state.current_round,
                state.max_rounds.max(1)
            ),
            Stage::Critique => match state.critique_score {
                Some(score) => format!("[critique] score {score}/10"),
                None => "[critique] done".to_string(),
            },
            Stage::Decide => format!("[decide] -> {next}"),
            other => format!("[{other}] done"),
        },
        StageEvent::Finished(state) => format!(
            "[done] rounds={} tokens={}",
            state.current_round,
            state.token_usage.total()
        ),
        StageEvent::Failed(e) => format!("[failed] {e}"),
    }
}

/// Print each event to stderr so stdout stays clean for the report.
pub fn terminal_progress() -> impl Fn(&StageEvent) + Send + Sync + 'static {
    |event| eprintln!("{}", format_event(event))
}
