//! Console appender implementation

use crate::core::{Appender, ConfigError, LogRecord, Result};
use std::io::Write;

/// Writes records to standard output
pub struct ConsoleAppender {
    written: u64,
}

impl ConsoleAppender {
    pub fn new() -> Self {
        Self { written: 0 }
    }

    /// Number of records written so far
    pub fn written(&self) -> u64 {
        self.written
    }
}

impl Default for ConsoleAppender {
    fn default() -> Self {
        Self::new()
    }
}

impl Appender for ConsoleAppender {
    fn append(&mut self, record: &LogRecord) -> Result<()> {
        let mut stdout = std::io::stdout().lock();
        stdout
            .write_all(record.to_line().as_bytes())
            .map_err(|e| ConfigError::io("writing to standard output", e))?;
        self.written += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        std::io::stdout()
            .flush()
            .map_err(|e| ConfigError::io("flushing standard output", e))
    }

    fn name(&self) -> &str {
        "console"
    }
}
