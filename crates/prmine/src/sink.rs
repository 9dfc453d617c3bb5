//! Resumable CSV output.
//!
//! The sink appends, never rewrites: the header is written once when
//! the file is first created, and every later flush appends only the
//! rows not yet persisted. Killing a run therefore loses at most the
//! rows since the last checkpoint.

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};

use crate::harvest::types::HarvestRow;

/// CSV column order. Must stay in sync with the field order of
/// [`HarvestRow`].
pub const CSV_HEADER: [&str; 14] = [
    "repo",
    "stars",
    "repo_size_mb",
    "issue_number",
    "issue_title",
    "issue_url",
    "pr_number",
    "pr_url",
    "merged_at",
    "additions",
    "deletions",
    "changed_files",
    "base_sha",
    "clone_command",
];

#[derive(Debug, Clone)]
pub struct ResumableSink {
    path: PathBuf,
}

impl ResumableSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the header row if the output file does not exist yet.
    /// Idempotent across runs, so resuming never duplicates it.
    pub fn ensure_header(&self) -> io::Result<()> {
        if self.path.exists() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut writer = csv::Writer::from_path(&self.path)?;
        writer.write_record(CSV_HEADER)?;
        writer.flush()?;
        Ok(())
    }

    /// Append `rows[from..]` and return the new persisted count. A
    /// `from` at or past the end is a no-op.
    pub fn append_from(&self, rows: &[HarvestRow], from: usize) -> io::Result<usize> {
        if from >= rows.len() {
            return Ok(rows.len().max(from));
        }

        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        for row in &rows[from..] {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(rows.len())
    }
}
