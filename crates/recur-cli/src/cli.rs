//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Recur - Find recurring charges and income in transaction history
#[derive(Parser)]
#[command(name = "recur")]
#[command(about = "Recurring transaction detector", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to the data-dir override, then built-in defaults)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Use AI collaborators from the environment
    ///
    /// Reads AI_BACKEND, OLLAMA_HOST and OLLAMA_MODEL. Merchant names the
    /// alias table misses and erratic bills are sent to the model; detection
    /// falls back to the built-in rules when it is unavailable.
    #[arg(long, global = true)]
    pub ai: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Detect recurring patterns in a transaction file
    Detect {
        /// Transactions file (CSV with id,date,merchant,amount or a JSON array)
        #[arg(short, long)]
        file: PathBuf,

        /// Input format: csv, json (inferred from the extension if not specified)
        #[arg(long)]
        format: Option<String>,

        /// Override the minimum occurrences for short cadences
        #[arg(long)]
        min_occurrences: Option<usize>,

        /// Print patterns and stats as JSON
        #[arg(long)]
        json: bool,
    },

    /// Summarize recurring costs and cancellation opportunities
    Summary {
        /// Transactions file (CSV with id,date,merchant,amount or a JSON array)
        #[arg(short, long)]
        file: PathBuf,

        /// Input format: csv, json (inferred from the extension if not specified)
        #[arg(long)]
        format: Option<String>,

        /// User the summary is built for
        #[arg(short, long, default_value = "default")]
        user: String,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show how raw merchant strings normalize
    Normalize {
        /// Raw merchant strings as they appear on statements
        #[arg(required = true)]
        names: Vec<String>,
    },
}
