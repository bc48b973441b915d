// src/main.rs

use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise info, or debug with --verbose
    let default_level = if cli.tree.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    match cli.command.unwrap_or(Commands::Setup) {
        Commands::Setup => {
            let request = commands::resolve_request(&cli.tree)?;
            commands::cmd_setup(&request)
        }
        Commands::Check => commands::cmd_check(cli.tree.verbose),
        Commands::Render { document } => {
            let request = commands::resolve_request(&cli.tree)?;
            commands::cmd_render(&request, document)
        }
    }
}
