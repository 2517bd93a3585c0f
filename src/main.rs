//! ADL Diff Miner - binary entry point
//!
//! Initializes logging, parses CLI arguments, wires up the SIGINT flag,
//! and maps runtime failures to exit status 1. Invalid arguments are
//! rejected by clap with exit status 2 before the repository is opened.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use adl_diff_miner::cli;
use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    // Logs go to stderr; stdout is reserved for emitted records.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = cli::Cli::parse();

    let interrupt = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupt);
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
        .context("failed to install SIGINT handler")?;

    cli::run(cli, &interrupt)?;
    Ok(())
}
