//! JSONL emitter
//!
//! Streams one compact JSON object per record onto a sink, flushing
//! after every write so consumers can tail the output. The newline is a
//! line separator, not a terminator: no trailing separator at EOF.

use std::io::Write;

use anyhow::{Context, Result};

use crate::models::Record;

/// Newline-separated JSON writer over any sink.
pub struct JsonlEmitter<W: Write> {
    writer: W,
    records_written: usize,
}

impl<W: Write> JsonlEmitter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            records_written: 0,
        }
    }

    /// Serialize and write one record, then flush.
    pub fn emit(&mut self, record: &Record) -> Result<()> {
        let line = serde_json::to_string(record).context("failed to serialize record")?;
        if self.records_written > 0 {
            self.writer
                .write_all(b"\n")
                .context("failed to write record separator")?;
        }
        self.writer
            .write_all(line.as_bytes())
            .context("failed to write record")?;
        self.writer.flush().context("failed to flush sink")?;
        self.records_written += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush().context("failed to flush sink")?;
        Ok(())
    }

    pub fn records_written(&self) -> usize {
        self.records_written
    }

    /// Consume the emitter and return the underlying sink.
    pub fn into_inner(self) -> W {
        self.writer
    }
}
