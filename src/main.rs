mod cli;
mod commands;
mod config;
mod ground_truth;
mod metrics;
mod model;
mod pages;
mod pipeline;
mod report;
mod runners;
mod util;

use std::path::Path;

use anyhow::Result;
use clap::Parser;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};

fn main() {
    init_tracing();

    if let Err(err) = util::load_env_file(Path::new(util::ENV_FILE)) {
        warn!(error = %format!("{err:#}"), "ignoring environment file");
    }

    if let Err(err) = run() {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::GroundTruth(args) => commands::ground_truth::run(args, &config),
        Commands::Benchmark(args) => commands::benchmark::run(args, &config),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
