//! Durable execution records, one JSON object per line.

use chrono::Utc;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use stoploss_core::types::ExecutionRecord;
use stoploss_core::{Error, Result};
use tracing::{debug, info};

/// Appends execution records to a per-run file under the records
/// directory. Each record is written and flushed independently so a
/// crash mid-run loses at most the record being written.
pub struct ExecutionRecorder {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl ExecutionRecorder {
    /// Create a recorder for a new run. The file is not created until
    /// the first record is written, so idle runs leave no empty files.
    pub fn new(records_dir: &Path) -> Self {
        let filename = format!(
            "stop_loss_executions_{}.jsonl",
            Utc::now().format("%Y%m%d_%H%M%S")
        );
        Self {
            path: records_dir.join(filename),
            writer: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record and flush it to disk.
    pub fn record(&mut self, record: &ExecutionRecord) -> Result<()> {
        if self.writer.is_none() {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent)
                    .map_err(|e| Error::Persistence(format!("create records dir: {e}")))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .map_err(|e| {
                    Error::Persistence(format!("open {}: {e}", self.path.display()))
                })?;
            info!(path = %self.path.display(), "Opened execution record file");
            self.writer = Some(BufWriter::new(file));
        }

        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| Error::Persistence("record writer missing".to_string()))?;
        let line = serde_json::to_string(record)?;
        writeln!(writer, "{line}")
            .map_err(|e| Error::Persistence(format!("write record: {e}")))?;
        writer
            .flush()
            .map_err(|e| Error::Persistence(format!("flush record: {e}")))?;
        debug!(market = %record.position.market, "Execution record persisted");
        Ok(())
    }
}
