// src/cli/mod.rs — CLI definition (clap derive)

pub mod consult;
pub mod input;
pub mod progress;
pub mod report;
pub mod tier;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "consultant",
    about = "Business strategy consultations with critique and refinement",
    version
)]
pub struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Log level used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a full consultation and print the report as JSON
    Consult(ConsultArgs),
    /// Print the revenue and cash-flow projection for a business profile
    Project {
        /// Business profile (.toml or .json)
        input: PathBuf,
        /// Target monthly revenue (overrides the profile)
        #[arg(long)]
        target: Option<f64>,
        /// Number of months to project
        #[arg(long)]
        months: Option<usize>,
    },
}

#[derive(clap::Args, Debug, Clone)]
pub struct ConsultArgs {
    /// Business profile (.toml or .json)
    pub input: PathBuf,

    /// Subscription tier: free, starter, pro, enterprise
    #[arg(long)]
    pub tier: Option<String>,

    /// Refinement rounds (overrides the tier and `workflow.default_max_rounds`)
    #[arg(long)]
    pub rounds: Option<u32>,

    /// Target monthly revenue (overrides the profile)
    #[arg(long)]
    pub target: Option<f64>,

    /// Correlation id for logs and checkpoints
    #[arg(long)]
    pub correlation_id: Option<String>,

    /// Suppress progress output (only emit the report)
    #[arg(long)]
    pub quiet: bool,

    /// Also write the report to the reports directory
    #[arg(long)]
    pub save: bool,
}
