mod agent;
mod conductor;
mod config;
mod interaction;
mod lexicon;
mod manager;
mod model;
mod population;
mod queue;
mod report;
mod simulation;
mod stats;

use crate::manager::Manager;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about)]
struct CLI {
    #[arg(long)]
    sim_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Run,

    Resume {
        #[arg(long)]
        n_runs: usize,
    },

    Report,

    Clean,
}

fn main() {
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(error) = run_cli() {
        log::error!("{error:#?}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<()> {
    let args = CLI::parse();
    log::info!("{args:#?}");

    let mgr = Manager::new(args.sim_dir).context("failed to construct mgr")?;

    match args.command {
        Command::Run => mgr.run_batch()?,
        Command::Resume { n_runs } => mgr.resume_batch(n_runs)?,
        Command::Report => mgr.write_report()?,
        Command::Clean => mgr.clean()?,
    }

    Ok(())
}
