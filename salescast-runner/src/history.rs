//! Run history: JSONL append-only persistence of run summaries.
//!
//! One JSON object per line, so a partial write damages at most the last
//! line and the file can be tailed while the service runs.

use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use crate::summary::RunSummary;

pub struct RunHistory {
    path: PathBuf,
    // Serializes appends from concurrent workers.
    write_lock: Mutex<()>,
}

impl RunHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn append(&self, summary: &RunSummary) -> io::Result<()> {
        let json = serde_json::to_string(summary)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        writeln!(file, "{json}")?;
        file.flush()
    }

    /// Read all summaries, oldest first. Malformed lines are skipped.
    pub fn read_all(&self) -> io::Result<Vec<RunSummary>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let reader = io::BufReader::new(fs::File::open(&self.path)?);
        let mut entries = Vec::new();

        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<RunSummary>(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => debug!(line = number + 1, error = %e, "skipping malformed history line"),
            }
        }

        Ok(entries)
    }

    /// The `limit` most recent summaries, newest first.
    pub fn recent(&self, limit: usize) -> io::Result<Vec<RunSummary>> {
        let mut all = self.read_all()?;
        all.reverse();
        all.truncate(limit);
        Ok(all)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
