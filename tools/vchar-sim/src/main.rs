//! Runs the fake character device inside a simulated host.
//!
//! Usage:
//!   vchar-sim run <scenario.toml>   - Play a scenario file
//!   vchar-sim demo                  - Play the built-in two-client demo
//!   vchar-sim --log-level debug ... - Show driver logs up to `debug`

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use vchar_core::log::LogLevel;
use vchar_sim::config::Scenario;
use vchar_sim::{logging, scenario};

#[derive(Parser)]
#[command(name = "vchar-sim", version)]
#[command(about = "Load the fake character device in a simulated host")]
struct Cli {
    /// Most verbose driver log level (overrides the scenario's [log] level)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a scenario file
    Run {
        /// Path to the scenario TOML
        file: PathBuf,
    },

    /// Play the built-in two-client demo
    Demo,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let scenario = match &cli.command {
        Commands::Run { file } => Scenario::load(file)?,
        Commands::Demo => Scenario::parse(scenario::DEMO).context("built-in demo")?,
    };

    let level = match cli.log_level.as_deref() {
        Some(name) => match LogLevel::parse(name) {
            Some(level) => level,
            None => bail!("unknown log level '{name}'"),
        },
        None => scenario.log.level()?,
    };
    logging::init(level);

    let report = scenario::run(scenario)?;
    for step in &report.steps {
        println!("{step}");
    }
    println!(
        "\n{} steps passed; {} region release(s), {} bad, {} leaked",
        report.steps.len(),
        report.releases,
        report.bad_releases,
        report.leaked_regions
    );
    if report.bad_releases > 0 || report.leaked_regions > 0 {
        bail!("host registry left inconsistent");
    }
    Ok(())
}
