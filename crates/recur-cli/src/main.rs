//! Recur CLI - Recurring transaction detector
//!
//! Usage:
//!   recur detect --file tx.csv            Detect recurring patterns
//!   recur summary --file tx.csv           Monthly costs and cancellation ideas
//!   recur normalize "NETFLIX.COM*1234"    Show merchant normalization

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    // Logs go to stderr so --json output stays machine readable
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Detect {
            file,
            format,
            min_occurrences,
            json,
        } => commands::cmd_detect(
            &config,
            &file,
            format.as_deref(),
            min_occurrences,
            json,
            cli.ai,
        ),
        Commands::Summary {
            file,
            format,
            user,
            json,
        } => commands::cmd_summary(&config, &file, format.as_deref(), &user, json, cli.ai),
        Commands::Normalize { names } => commands::cmd_normalize(&config, &names),
    }
}
