//! # Session CLI Module
//!
//! This module implements the CLI interface for Session documents.
//!
//! ## Available Commands
//!
//! - `inspect` - Show counts and the hierarchy of a session file
//! - `validate` - Check lookup, entity and graph consistency
//! - `convert` - Convert between JSON documents and binary snapshots
//! - `demo` - Write a small sample session

mod commands;

use crate::config::Config;
use clap::{Parser, Subcommand};
use session_core::SessionError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Session - GUID lookup, hierarchy and relationship index
///
/// Reads and writes Session files. Files ending in `.bin` are binary
/// snapshots; everything else is a JSON document.
#[derive(Parser, Debug)]
#[command(name = "session")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to a TOML config file (default: $SESSION_CONFIG)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show counts and the hierarchy of a session file
    Inspect {
        /// Input file (JSON or .bin snapshot)
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Check that lookup, entities and graph agree
    Validate {
        /// Input file (JSON or .bin snapshot)
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Convert between JSON and binary snapshot
    Convert {
        /// Input file
        #[arg(short, long)]
        input: PathBuf,

        /// Output file; the extension picks the format
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Write a small sample session
    Demo {
        /// Output file; the extension picks the format
        #[arg(short, long)]
        output: PathBuf,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: &Cli, config: &Config) -> Result<(), SessionError> {
    let json_mode = cli.json_mode;

    match &cli.command {
        Commands::Inspect { input } => cmd_inspect(input, config, json_mode),
        Commands::Validate { input } => cmd_validate(input, config, json_mode),
        Commands::Convert { input, output } => cmd_convert(input, output, config, json_mode),
        Commands::Demo { output } => cmd_demo(output, config, json_mode),
    }
}
