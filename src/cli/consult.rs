// src/cli/consult.rs — `consult` and `project` subcommands

use std::path::Path;
use std::time::Instant;

use futures::StreamExt;

use super::input::{non_blank, ConsultationInput};
use super::progress::format_event;
use super::report::{ConsultationReport, ReportMeta};
use super::tier::ConsultationPlan;
use super::ConsultArgs;
use crate::core::registry;
use crate::core::roles::AgentRole;
use crate::core::types::{CancelHandle, RunOptions, StageEvent};
use crate::infra::config::Config;
use crate::infra::paths;
use crate::projection;
use crate::provider::roles::RoleModels;

/// Run one consultation end to end and print the report to stdout.
pub async fn run_consult(args: ConsultArgs, config: &Config) -> anyhow::Result<()> {
    let input = ConsultationInput::load(&args.input)?;
    let business = input.business()?;
    let target = args.target.or(input.target_revenue);

    // Without a tier, the configured default depth applies
    let plan = ConsultationPlan::from_subscription(args.tier.as_deref().unwrap_or_default());
    let max_rounds = match (args.rounds, &args.tier) {
        (Some(rounds), _) => rounds,
        (None, Some(_)) => plan.max_rounds(),
        (None, None) => config.workflow.default_max_rounds,
    };

    let cancel = CancelHandle::new();
    let mut options = RunOptions::new(max_rounds)
        .with_refinement_requested(config.workflow.refinement_requested)
        .with_cancel(cancel.clone());
    if let Some(id) = args.correlation_id.clone() {
        options = options.with_correlation_id(id);
    }
    for line in input.extra_context(target) {
        options = options.with_extra_context(line);
    }

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupted, cancelling after the current stage...");
            cancel.cancel();
        }
    });

    tracing::info!(
        correlation_id = %options.correlation_id,
        plan = %plan,
        max_rounds,
        "Starting consultation"
    );

    let runner = registry::shared_runner(config)?;
    let started = Instant::now();
    let mut events = runner.stream(business.clone(), options);

    let mut final_state = None;
    while let Some(event) = events.next().await {
        if !args.quiet {
            eprintln!("{}", format_event(&event));
        }
        match event {
            StageEvent::Completed { .. } => {}
            StageEvent::Finished(state) => final_state = Some(*state),
            StageEvent::Failed(e) => {
                if let Some(partial) = e.partial_state().and_then(|s| s.best_strategy()) {
                    eprintln!("\nPartial strategy before the failure:\n{partial}\n");
                }
                return Err(e.into());
            }
        }
    }
    let state =
        final_state.ok_or_else(|| anyhow::anyhow!("consultation ended without a result"))?;

    let series = projection::project(&business, target, config.projection.months);
    let report = ConsultationReport::build(
        state,
        &series,
        ReportMeta {
            plan,
            business_name: non_blank(&input.business_name).map(String::from),
            industry: non_blank(&input.industry).map(String::from),
            target_revenue: target,
            elapsed: started.elapsed(),
            model_used: RoleModels::from_config(&config.backend)
                .model_for(AgentRole::Refiner)
                .to_string(),
        },
    );

    println!("{}", report.to_json()?);
    if args.save {
        let path = report.save(&paths::reports_dir())?;
        eprintln!("Report saved to {}", path.display());
    }
    Ok(())
}

/// Print the projection and its chart groups as JSON. Needs no credentials.
pub fn run_project(
    input_path: &Path,
    target: Option<f64>,
    months: Option<usize>,
    config: &Config,
) -> anyhow::Result<()> {
    let input = ConsultationInput::load(input_path)?;
    let business = input.business()?;
    let target = target.or(input.target_revenue);
    let months = months.unwrap_or(config.projection.months);

    let series = projection::project(&business, target, months);
    let output = serde_json::json!({
        "start": series.start,
        "end": series.end,
        "target": series.target,
        "growth_factor": series.growth_factor,
        "break_even_month": series.break_even_month(),
        "points": series.points,
        "chart_data": series.chart_data(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
