//! ADL Diff Miner - diff-to-diff training corpus extraction
//!
//! Mines a local Git repository for commits that modify a designated
//! Architecture Description Language (ADL) file and streams one
//! self-contained JSONL record per qualifying commit, combining the
//! commit identity, the author's intent, the ADL diff, co-changed code
//! diffs, and history-derived context signals.

pub mod cli;
pub mod diff;
pub mod git;
pub mod models;
pub mod pipeline;
pub mod reporters;
