//! rebuild: build a target defined in BUILD.lua.
//!
//! Locates the build file by walking upward from the current directory,
//! loads it into the embedded Lua runtime, and asks the scheduler for the
//! requested target. Exit codes: 0 on success, 1 on any build failure,
//! 2 on usage errors (clap's default).

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use owo_colors::OwoColorize;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use rebuild_core::Store;
use rebuild_engine::{buildfile, BuildConfig, Scheduler};

#[derive(Parser)]
#[command(name = "rebuild")]
#[command(version, about = "A build engine with suspending recipes and constructive-trace caching")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Set a configuration value (repeatable)
    #[arg(short = 'D', long = "define", value_name = "KEY=VALUE")]
    define: Vec<String>,

    /// Name of the target to build
    target: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("warning: failed to initialize logging");
    }

    let target = cli.target.clone();
    match run(cli) {
        Ok(output) => {
            println!("{} {} -> {}", "Built".green().bold(), target, output.display());
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{} {:#}", "error:".red().bold(), err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<PathBuf> {
    let config = BuildConfig::from_defines(&cli.define)?;

    let cwd = std::env::current_dir().context("cannot determine current directory")?;
    let build_file = buildfile::find_build_file(&cwd)?;
    let project_root = build_file
        .parent()
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("build file {} has no parent directory", build_file.display()))?;

    let store = Store::from_env().context("failed to open the store")?;

    let scheduler = Scheduler::new(store, config, project_root)?;
    scheduler
        .load_build_file(&build_file)
        .with_context(|| format!("while loading {}", build_file.display()))?;

    Ok(scheduler.build(&cli.target)?)
}
