//! Output sinks for mined records
//!
//! The only v1 format is newline-delimited JSON on a file or stdout.
//! Database sinks are out of scope; a new module here is the seam for
//! adding one.

pub mod jsonl;

pub use jsonl::JsonlEmitter;

use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

/// Open the output sink: a file created truncating, or stdout.
pub fn open_sink(output: Option<&Path>) -> Result<Box<dyn Write>> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            let file = File::create(path)
                .with_context(|| format!("failed to open output file {}", path.display()))?;
            Ok(Box::new(file))
        }
        None => Ok(Box::new(std::io::stdout())),
    }
}
