// src/main.rs — consultant entry point

use std::path::Path;

use clap::Parser;

use consultant::cli::{consult, Cli, Commands};
use consultant::infra::config::Config;
use consultant::infra::logger;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG overrides --log-level
    logger::init_logging(&cli.log_level);

    if let Err(e) = run(cli).await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Falls back to defaults if no config.toml
    let config = match cli.config {
        Some(ref path) => Config::load_from(Path::new(path))?,
        None => Config::load()?,
    };

    match cli.command {
        Commands::Consult(args) => consult::run_consult(args, &config).await,
        Commands::Project {
            input,
            target,
            months,
        } => consult::run_project(&input, target, months, &config),
    }
}
