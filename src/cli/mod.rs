//! CLI surface and run entry point
//!
//! The front-end parses flags (with environment fallbacks), normalizes
//! the ADL path and the extension set, opens the repository and the
//! sink, and hands off to the pipeline driver.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use crate::git::{normalize_rel_path, Gateway};
use crate::pipeline::{self, MineConfig, MineStats};
use crate::reporters::{self, JsonlEmitter};

const DEFAULT_ADL_FILE: &str = "adl.yaml";
const DEFAULT_CODE_EXTENSION: &str = ".py";

/// Mine ADL-touching commits and stream a diff-to-diff training corpus
/// as line-delimited JSON.
#[derive(Parser, Debug)]
#[command(name = "adl-diff-miner")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the Git repository containing the ADL file
    #[arg(long, env = "REPO_PATH", value_name = "PATH")]
    pub repo: PathBuf,

    /// ADL file path relative to the repository root
    #[arg(
        long,
        env = "ADL_FILE_PATH",
        default_value = DEFAULT_ADL_FILE,
        value_name = "RELPATH"
    )]
    pub adl_file: String,

    /// Code extensions to include (space-separated or repeated)
    #[arg(
        long = "code-exts",
        short = 'c',
        num_args = 1..,
        default_value = DEFAULT_CODE_EXTENSION,
        value_name = "EXT"
    )]
    pub code_exts: Vec<String>,

    /// Write the dataset to this file instead of stdout (truncating)
    #[arg(long, short = 'o', env = "TRAINING_DATASET_PATH", value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Days to look back from each commit's parent for context signals
    #[arg(long, default_value_t = 90, value_parser = clap::value_parser!(u32).range(1..))]
    pub context_days: u32,
}

/// Normalize extensions: guaranteed leading dot, lowercase,
/// deduplicated preserving order; empty input falls back to `.py`.
pub fn normalize_extensions(raw: &[String]) -> Vec<String> {
    let mut cleaned = Vec::new();
    for ext in raw {
        let candidate = ext.trim();
        if candidate.is_empty() {
            continue;
        }
        let with_dot = if candidate.starts_with('.') {
            candidate.to_lowercase()
        } else {
            format!(".{}", candidate.to_lowercase())
        };
        if !cleaned.contains(&with_dot) {
            cleaned.push(with_dot);
        }
    }
    if cleaned.is_empty() {
        cleaned.push(DEFAULT_CODE_EXTENSION.to_string());
    }
    cleaned
}

/// Run one mining invocation with parsed arguments.
pub fn run(cli: Cli, interrupt: &AtomicBool) -> Result<MineStats> {
    let adl_file = {
        let normalized = normalize_rel_path(&cli.adl_file);
        if normalized.is_empty() {
            DEFAULT_ADL_FILE.to_string()
        } else {
            normalized
        }
    };
    let config = MineConfig {
        repo_path: cli.repo.clone(),
        adl_file,
        code_extensions: normalize_extensions(&cli.code_exts),
        context_days: cli.context_days,
    };

    let gateway = Gateway::open(&cli.repo)?;
    let sink = reporters::open_sink(cli.output.as_deref())?;
    let mut emitter = JsonlEmitter::new(sink);

    let destination = cli
        .output
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "stdout".to_string());
    let stats = pipeline::run(&gateway, &config, &mut emitter, interrupt)?;
    info!(
        records = stats.records_emitted,
        destination = %destination,
        "dataset written"
    );
    Ok(stats)
}
