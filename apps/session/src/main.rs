//! # Session - Inspect, Validate and Convert
//!
//! The main binary for Session documents.
//!
//! ## Usage
//!
//! ```bash
//! # Write a sample session, then look at it
//! session demo -o demo.json
//! session inspect -i demo.json
//!
//! # JSON <-> binary snapshot
//! session convert -i demo.json -o demo.bin
//! session validate -i demo.bin --json-mode
//! ```

use clap::Parser;
use session::cli::{self, Cli};
use session::config::{Config, LogFormat};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config.with_env_overrides(),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(config.log_format, cli.verbose);
    tracing::debug!(path = ?cli.config, ?config, "configuration loaded");

    if let Err(e) = cli::execute(&cli, &config) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing. `RUST_LOG` wins over `--verbose`.
fn init_tracing(format: LogFormat, verbose: bool) {
    let default_filter = if verbose {
        "session=debug,session_core=debug"
    } else {
        "session=info,session_core=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
