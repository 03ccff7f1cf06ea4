mod archive;
mod cloud;
mod commands;
mod config;
mod context;
mod environment;
mod error;
mod executor;
mod output;
mod project;
mod runner;
mod state;
mod traits;
mod validation;

use anyhow::{Context as AnyhowContext, Result};
use clap::Parser;
use clap::error::ErrorKind;
use commands::{RunArgs, RunCommand};
use context::Context;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gtf")]
#[command(about = "Drive terraform for a GCP environment: link remote state, plan and apply stored plans", long_about = None)]
#[command(version)]
struct Cli {
    /// Target environment (sandbox, dev, staging, prod)
    environment: String,

    /// Action to run (plan, apply)
    action: String,

    /// Build id printed by a previous plan; required for apply
    build_id: Option<String>,

    /// Repository root holding one directory per environment
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Configuration file (defaults to <root>/.gtf.yaml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Remote state bucket, skipping discovery
    #[arg(long, env = "TF_BACKEND_BUCKET")]
    state_bucket: Option<String>,

    /// Submit the run to Cloud Build instead of running terraform locally
    #[arg(long)]
    cloud_build: bool,
}

/// Whether a `GTF_DEBUG` value turns on debug diagnostics
fn debug_enabled(value: Option<&str>) -> bool {
    value.is_some_and(|v| {
        matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

/// Exit code for a command line clap refused: 0 for help and version, 1 for bad arguments
fn usage_exit_code(err: &clap::Error) -> i32 {
    match err.kind() {
        ErrorKind::DisplayHelp
        | ErrorKind::DisplayVersion
        | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => 0,
        _ => 1,
    }
}

fn init_tracing() {
    let debug = debug_enabled(std::env::var("GTF_DEBUG").ok().as_deref());

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "warn" }));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(ctx: &Context, cli: Cli) -> Result<()> {
    let root = std::path::absolute(&cli.root)
        .with_context(|| format!("Invalid root directory {}", cli.root.display()))?;

    RunCommand::execute(
        ctx,
        &RunArgs {
            root,
            config: cli.config,
            environment: cli.environment,
            action: cli.action,
            build_id: cli.build_id,
            state_bucket: cli.state_bucket,
            cloud_build: cli.cloud_build,
        },
    )
}

fn main() {
    init_tracing();
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = usage_exit_code(&err);
            let _ = err.print();
            std::process::exit(code);
        }
    };
    let ctx = Context::new();

    if let Err(err) = run(&ctx, cli) {
        ctx.output.error(&format!("{:#}", err));
        std::process::exit(error::exit_code_for(&err));
    }
}
